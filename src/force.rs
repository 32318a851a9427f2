//! Force models.
//!
//! Far-field models ([`FieldForce`]) only see a mass and a position, so the
//! quadtree can hand them either a real body or the aggregate of a whole cell.
//! Local models ([`PairForce`]) look at two real bodies and return the force on
//! the first; the caller applies the negation to the second.

use crate::{
    body::Body,
    circle,
};
use serde::{Deserialize, Serialize};
use ultraviolet::Vec2;

/// Distances below this are treated as coincident.
pub const MIN_DISTANCE: f32 = 1e-6;

/// Source of a far-field force: a body or the aggregate of a tree cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointMass {
    pub pos: Vec2,
    pub mass: f32,
}

impl From<&Body> for PointMass {
    fn from(body: &Body) -> Self {
        Self {
            pos: body.pos,
            mass: body.mass,
        }
    }
}

pub trait FieldForce: Sync {
    /// Force exerted on `body` by `source`.
    fn force(&self, body: &Body, source: PointMass) -> Vec2;
}

pub trait PairForce {
    /// Force exerted on `a` by `b`.
    fn force(&self, a: &Body, b: &Body, dt: f32) -> Vec2;
}

/// Newtonian attraction `G m1 m2 / (d^2 + softening^2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gravity {
    pub g: f32,
    pub softening: f32,
}

impl Gravity {
    pub fn new(g: f32) -> Self {
        Self { g, softening: 0.0 }
    }
}

impl FieldForce for Gravity {
    #[inline]
    fn force(&self, body: &Body, source: PointMass) -> Vec2 {
        let d = source.pos - body.pos;
        let d_sq = d.mag_sq();
        if d_sq < MIN_DISTANCE * MIN_DISTANCE || source.mass <= 0.0 {
            return Vec2::zero();
        }
        let denom = d_sq + self.softening * self.softening;
        d * (self.g * body.mass * source.mass / (denom * d_sq.sqrt()))
    }
}

impl PairForce for Gravity {
    fn force(&self, a: &Body, b: &Body, _dt: f32) -> Vec2 {
        FieldForce::force(self, a, PointMass::from(b))
    }
}

/// How deeply two circles overlap, as fed to [`Repulsion`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMeasure {
    /// Lens area. Grows smoothly from first contact.
    #[default]
    Area,
    Chord,
    Depth,
}

impl OverlapMeasure {
    pub fn eval(self, r1: f32, r2: f32, d: f32) -> f32 {
        match self {
            OverlapMeasure::Area => circle::intersection_area(r1, r2, d),
            OverlapMeasure::Chord => circle::chord_length(r1, r2, d),
            OverlapMeasure::Depth => circle::penetration_depth(r1, r2, d),
        }
    }
}

/// Short-range push `strength * overlap^beta` along the separating normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Repulsion {
    pub strength: f32,
    pub beta: f32,
    /// Extra reach beyond touching before the force switches off.
    pub slack: f32,
    pub measure: OverlapMeasure,
}

impl PairForce for Repulsion {
    fn force(&self, a: &Body, b: &Body, _dt: f32) -> Vec2 {
        let delta = a.pos - b.pos;
        let dist = delta.mag();
        if dist > a.radius + b.radius + self.slack {
            return Vec2::zero();
        }

        let overlap = self.measure.eval(a.radius, b.radius, dist);
        if overlap <= 0.0 {
            return Vec2::zero();
        }

        // Coincident centres have no normal; push along +x.
        let normal = if dist > MIN_DISTANCE {
            delta / dist
        } else {
            Vec2::unit_x()
        };
        normal * (self.strength * overlap.powf(self.beta))
    }
}

/// Inelastic contact: opposes the approach speed along the contact normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionDamping {
    pub damping: f32,
}

impl PairForce for CollisionDamping {
    fn force(&self, a: &Body, b: &Body, dt: f32) -> Vec2 {
        let delta = b.pos - a.pos;
        let dist = delta.mag();
        if dist >= a.radius + b.radius || dist <= MIN_DISTANCE {
            return Vec2::zero();
        }

        let normal = delta / dist;
        let approach = (a.velocity(dt) - b.velocity(dt)).dot(normal);
        normal * (-self.damping * approach)
    }
}

/// O(N^2) far-field evaluation, the exact counterpart of the quadtree pass.
pub fn direct_field_forces<F: FieldForce>(bodies: &[Body], model: &F) -> Vec<Vec2> {
    bodies
        .iter()
        .enumerate()
        .map(|(i, body)| {
            bodies
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .fold(Vec2::zero(), |acc, (_, other)| {
                    acc + model.force(body, PointMass::from(other))
                })
        })
        .collect()
}
