//! Spontaneous merging and linking of neighbouring bodies.

use crate::{
    body::{Body, BodyId},
    body_set::BodySet,
    condition::Condition,
    events::{Event, EventSink},
    spring::{SpringNetwork, SpringParams},
};

/// Combines two bodies into one, conserving mass and momentum.
///
/// Position and colour are mass-weighted, the radius is volume-additive
/// (`cbrt(r1^3 + r2^3)`) and any force already accumulated this tick carries
/// over.
pub fn merge_bodies(a: &Body, b: &Body, dt: f32) -> Body {
    let mass = a.mass + b.mass;
    let (wa, wb) = if mass > 0.0 {
        (a.mass / mass, b.mass / mass)
    } else {
        (0.5, 0.5)
    };

    let pos = a.pos * wa + b.pos * wb;
    let vel = a.velocity(dt) * wa + b.velocity(dt) * wb;
    let mut color = [0u8; 3];
    for (c, (ca, cb)) in color.iter_mut().zip(a.color.into_iter().zip(b.color)) {
        *c = (f32::from(ca) * wa + f32::from(cb) * wb).round().clamp(0.0, 255.0) as u8;
    }
    let radius = (a.radius.powi(3) + b.radius.powi(3)).cbrt();

    let mut merged = Body::new(pos, mass, color)
        .with_radius(radius)
        .with_velocity(vel, dt);
    merged.force = a.force + b.force;
    merged.selected = a.selected || b.selected;
    merged
}

/// Merges neighbour pairs that satisfy `condition`.
#[derive(Clone, Debug, PartialEq)]
pub struct MergePolicy {
    pub condition: Condition,
}

impl MergePolicy {
    pub fn new(condition: Condition) -> Self {
        Self { condition }
    }

    /// Walks `pairs` in order. A body takes part in at most one merge per
    /// call: once merged its id is stale and later pairs naming it are
    /// skipped. Returns the number of merges.
    pub fn apply(
        &self,
        pairs: &[(BodyId, BodyId)],
        bodies: &mut BodySet,
        dt: f32,
        sink: &mut impl EventSink,
    ) -> usize {
        let mut merges = 0;
        for &(a, b) in pairs {
            let (Some(body_a), Some(body_b)) = (bodies.get(a), bodies.get(b)) else {
                continue;
            };
            if !self.condition.holds(body_a, body_b, dt) {
                continue;
            }

            let merged = merge_bodies(body_a, body_b, dt);
            bodies.remove(a);
            bodies.remove(b);
            match bodies.insert(merged) {
                Ok(id) => {
                    log::debug!("Merged {a} and {b} into {id} (mass {})", merged.mass);
                    sink.emit(Event::BodiesMerged {
                        absorbed: [a, b],
                        merged: id,
                    });
                    merges += 1;
                }
                Err(err) => log::warn!("Dropped merge of {a} and {b}: {err}"),
            }
        }
        merges
    }
}

/// Links close, slow neighbours with a spring at their current separation.
#[derive(Clone, Debug, PartialEq)]
pub struct SpringField {
    pub condition: Condition,
    pub params: SpringParams,
}

impl SpringField {
    /// Links pairs whose surfaces are within `gap` of each other and whose
    /// relative speed is below `speed`.
    pub fn new(gap: f32, speed: f32, params: SpringParams) -> Self {
        Self {
            condition: Condition::SurfaceGap(gap) & Condition::RelativeSpeed(speed),
            params,
        }
    }

    /// Returns the number of springs added.
    pub fn apply(
        &self,
        pairs: &[(BodyId, BodyId)],
        bodies: &BodySet,
        springs: &mut SpringNetwork,
        dt: f32,
        sink: &mut impl EventSink,
    ) -> usize {
        let mut linked = 0;
        for &(a, b) in pairs {
            if springs.connected(a, b) {
                continue;
            }
            let (Some(body_a), Some(body_b)) = (bodies.get(a), bodies.get(b)) else {
                continue;
            };
            if !self.condition.holds(body_a, body_b, dt) {
                continue;
            }
            let params = SpringParams {
                rest_length: None,
                ..self.params
            };
            if springs.link(bodies, a, b, params).is_ok() {
                sink.emit(Event::SpringLinked { a, b });
                linked += 1;
            }
        }
        if linked > 0 {
            log::trace!("Spring field linked {linked} pairs");
        }
        linked
    }
}
