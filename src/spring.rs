use crate::{
    body::BodyId,
    body_set::BodySet,
    composite::CompositeBody,
    error::SimError,
    events::{BreakReason, Event, EventSink},
};
use std::collections::HashSet;
use ultraviolet::Vec2;

/// Springs shorter than this have no usable direction and exert nothing.
pub const MIN_SPRING_LENGTH: f32 = 1e-5;

/// Parameters for a new spring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringParams {
    pub stiffness: f32,
    pub damping: f32,
    /// `None` rests at the current separation, so linking causes no snap.
    pub rest_length: Option<f32>,
    /// Breaks once stretched past `factor * rest_length`.
    pub break_distance_factor: f32,
    /// Breaks once the spring force exceeds this.
    pub break_force: f32,
}

impl SpringParams {
    pub fn new(stiffness: f32, damping: f32) -> Self {
        Self {
            stiffness,
            damping,
            rest_length: None,
            break_distance_factor: f32::INFINITY,
            break_force: f32::INFINITY,
        }
    }

    pub fn with_rest_length(mut self, rest_length: f32) -> Self {
        self.rest_length = Some(rest_length);
        self
    }

    pub fn with_break_distance_factor(mut self, factor: f32) -> Self {
        self.break_distance_factor = factor;
        self
    }

    pub fn with_break_force(mut self, force: f32) -> Self {
        self.break_force = force;
        self
    }
}

/// Damped elastic link between two bodies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spring {
    pub a: BodyId,
    pub b: BodyId,
    pub stiffness: f32,
    pub damping: f32,
    pub rest_length: f32,
    pub break_distance_factor: f32,
    pub break_force: f32,
}

impl Spring {
    pub fn break_distance(&self) -> f32 {
        self.break_distance_factor * self.rest_length
    }

    pub fn connects(&self, a: BodyId, b: BodyId) -> bool {
        pair_key(self.a, self.b) == pair_key(a, b)
    }
}

#[inline]
fn pair_key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Every spring in the simulation, at most one per unordered body pair.
#[derive(Clone, Debug)]
pub struct SpringNetwork {
    springs: Vec<Spring>,
    pairs: HashSet<(BodyId, BodyId)>,
    /// Hard cap on any spring's force, below the break threshold.
    max_force: f32,
}

impl Default for SpringNetwork {
    fn default() -> Self {
        Self::new(f32::INFINITY)
    }
}

impl SpringNetwork {
    pub fn new(max_force: f32) -> Self {
        Self {
            springs: Vec::new(),
            pairs: HashSet::new(),
            max_force,
        }
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, max_force: f32) {
        self.max_force = max_force;
    }

    pub fn len(&self) -> usize {
        self.springs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.springs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spring> + '_ {
        self.springs.iter()
    }

    pub fn clear(&mut self) {
        self.springs.clear();
        self.pairs.clear();
    }

    /// Order-independent.
    pub fn connected(&self, a: BodyId, b: BodyId) -> bool {
        self.pairs.contains(&pair_key(a, b))
    }

    pub fn link(
        &mut self,
        bodies: &BodySet,
        a: BodyId,
        b: BodyId,
        params: SpringParams,
    ) -> Result<(), SimError> {
        if a == b {
            return Err(SimError::SelfLink(a));
        }
        let (Some(body_a), Some(body_b)) = (bodies.get(a), bodies.get(b)) else {
            let stale = if bodies.contains(a) { b } else { a };
            return Err(SimError::StaleBody(stale));
        };
        if self.connected(a, b) {
            return Err(SimError::AlreadyLinked(a, b));
        }

        let rest_length = params
            .rest_length
            .unwrap_or_else(|| (body_b.pos - body_a.pos).mag());

        self.pairs.insert(pair_key(a, b));
        self.springs.push(Spring {
            a,
            b,
            stiffness: params.stiffness,
            damping: params.damping,
            rest_length,
            break_distance_factor: params.break_distance_factor,
            break_force: params.break_force,
        });
        Ok(())
    }

    /// Returns whether a spring was removed.
    pub fn unlink(&mut self, a: BodyId, b: BodyId) -> bool {
        if !self.pairs.remove(&pair_key(a, b)) {
            return false;
        }
        self.springs.retain(|s| !s.connects(a, b));
        true
    }

    /// Drops springs whose endpoints are gone. Returns how many were dropped.
    pub fn prune_stale(&mut self, bodies: &BodySet) -> usize {
        let before = self.springs.len();
        let pairs = &mut self.pairs;
        self.springs.retain(|s| {
            let live = bodies.contains(s.a) && bodies.contains(s.b);
            if !live {
                pairs.remove(&pair_key(s.a, s.b));
            }
            live
        });
        before - self.springs.len()
    }

    /// Applies every spring's force to its endpoints and removes springs that
    /// broke or lost an endpoint. Broken springs apply no force this tick.
    /// Returns the number of springs that broke.
    pub fn update(&mut self, bodies: &mut BodySet, dt: f32, sink: &mut impl EventSink) -> usize {
        let max_force = self.max_force;
        let pairs = &mut self.pairs;
        let mut broken = 0;

        self.springs.retain(|s| {
            let Some((a, b)) = bodies.pair_mut(s.a, s.b) else {
                pairs.remove(&pair_key(s.a, s.b));
                return false;
            };

            let delta = b.pos - a.pos;
            let len = delta.mag();
            let midpoint = (a.pos + b.pos) * 0.5;

            let snap = |reason| Event::SpringBroken {
                a: s.a,
                b: s.b,
                midpoint,
                reason,
            };

            if s.rest_length > 0.0 && len > s.break_distance() {
                sink.emit(snap(BreakReason::Stretched));
                pairs.remove(&pair_key(s.a, s.b));
                broken += 1;
                return false;
            }

            if len < MIN_SPRING_LENGTH {
                return true;
            }

            let dir = delta / len;
            let closing = (b.velocity(dt) - a.velocity(dt)).dot(dir);
            let magnitude = s.stiffness * (len - s.rest_length) + s.damping * closing;

            if magnitude.abs() > s.break_force {
                sink.emit(snap(BreakReason::Overloaded));
                pairs.remove(&pair_key(s.a, s.b));
                broken += 1;
                return false;
            }

            let force = dir * magnitude.clamp(-max_force, max_force);
            a.force += force;
            b.force -= force;
            true
        });

        if broken > 0 {
            log::debug!("{broken} springs broke");
        }
        broken
    }

    /// Groups bodies joined by springs that pass `predicate` into composites.
    /// Only components of two or more bodies are returned.
    pub fn find_composite_bodies(
        &self,
        bodies: &BodySet,
        predicate: impl Fn(&Spring) -> bool,
    ) -> Vec<CompositeBody> {
        let n = bodies.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for spring in self.springs.iter().filter(|s| predicate(s)) {
            if let (Some(i), Some(j)) = (bodies.dense_index(spring.a), bodies.dense_index(spring.b)) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }

        let mut group_of = vec![usize::MAX; n];
        let mut groups: Vec<Vec<BodyId>> = Vec::new();
        for (dense, id) in bodies.ids().iter().enumerate() {
            let root = find(&mut parent, dense);
            if group_of[root] == usize::MAX {
                group_of[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[group_of[root]].push(*id);
        }

        groups
            .into_iter()
            .filter(|members| members.len() > 1)
            .map(CompositeBody::new)
            .collect()
    }

    /// Endpoint positions of every live spring, for drawing.
    pub fn segments<'a>(&'a self, bodies: &'a BodySet) -> impl Iterator<Item = (Vec2, Vec2)> + 'a {
        self.springs
            .iter()
            .filter_map(|s| Some((bodies.get(s.a)?.pos, bodies.get(s.b)?.pos)))
    }

    /// Links each member to its `k` nearest fellow members.
    /// Pairs that are already linked are left alone. Returns how many springs
    /// were added.
    pub fn mesh_k_nearest(
        &mut self,
        bodies: &BodySet,
        members: &[BodyId],
        k: usize,
        params: SpringParams,
    ) -> usize {
        let mut linked = 0;
        for &id in members {
            let Some(origin) = bodies.get(id).map(|b| b.pos) else {
                continue;
            };

            let mut neighbours: Vec<(f32, BodyId)> = members
                .iter()
                .filter(|&&other| other != id)
                .filter_map(|&other| Some(((bodies.get(other)?.pos - origin).mag_sq(), other)))
                .collect();
            neighbours.sort_by(|x, y| x.0.total_cmp(&y.0));

            for &(_, other) in neighbours.iter().take(k) {
                if self.link(bodies, id, other, params).is_ok() {
                    linked += 1;
                }
            }
        }
        linked
    }
}
