//! Aggregate mechanics of a spring-connected cluster.
//!
//! A [`CompositeBody`] only names its members; every quantity is computed on
//! demand against the live [`BodySet`], and members that have since been
//! merged away or deleted are skipped. Positions and velocities below are
//! relative to the centre of mass unless stated otherwise.

use crate::{
    body::{Body, BodyId, Color, cross, perp},
    body_set::BodySet,
    hull::ConvexHull,
};
use ultraviolet::Vec2;

const EPSILON: f32 = 1e-9;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeBody {
    members: Vec<BodyId>,
}

impl CompositeBody {
    pub fn new(members: Vec<BodyId>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[BodyId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.members.contains(&id)
    }

    fn live<'a>(&'a self, bodies: &'a BodySet) -> impl Iterator<Item = &'a Body> + 'a {
        self.members.iter().filter_map(|id| bodies.get(*id))
    }

    pub fn mass(&self, bodies: &BodySet) -> f32 {
        self.live(bodies).map(|b| b.mass).sum()
    }

    pub fn center_of_mass(&self, bodies: &BodySet) -> Vec2 {
        let mass = self.mass(bodies);
        if mass <= 0.0 {
            return Vec2::zero();
        }
        self.live(bodies).fold(Vec2::zero(), |acc, b| acc + b.pos * b.mass) / mass
    }

    /// Velocity of the centre of mass.
    pub fn velocity(&self, bodies: &BodySet, dt: f32) -> Vec2 {
        let mass = self.mass(bodies);
        if mass <= 0.0 {
            return Vec2::zero();
        }
        self.live(bodies).fold(Vec2::zero(), |acc, b| acc + b.momentum(dt)) / mass
    }

    /// Point-mass moment of inertia about the centre of mass.
    pub fn moment_of_inertia(&self, bodies: &BodySet) -> f32 {
        let com = self.center_of_mass(bodies);
        self.live(bodies).map(|b| b.mass * (b.pos - com).mag_sq()).sum()
    }

    /// Counter-clockwise positive.
    pub fn angular_momentum(&self, bodies: &BodySet, dt: f32) -> f32 {
        let com = self.center_of_mass(bodies);
        let vel = self.velocity(bodies, dt);
        self.live(bodies)
            .map(|b| b.mass * cross(b.pos - com, b.velocity(dt) - vel))
            .sum()
    }

    pub fn angular_velocity(&self, bodies: &BodySet, dt: f32) -> f32 {
        let inertia = self.moment_of_inertia(bodies);
        if inertia < EPSILON {
            return 0.0;
        }
        self.angular_momentum(bodies, dt) / inertia
    }

    /// Kinetic energy of the bulk motion.
    pub fn kinetic_energy(&self, bodies: &BodySet, dt: f32) -> f32 {
        0.5 * self.mass(bodies) * self.velocity(bodies, dt).mag_sq()
    }

    /// Kinetic energy in the frame comoving with the centre of mass.
    /// Includes the rotational part.
    pub fn internal_energy(&self, bodies: &BodySet, dt: f32) -> f32 {
        let vel = self.velocity(bodies, dt);
        self.live(bodies)
            .map(|b| 0.5 * b.mass * (b.velocity(dt) - vel).mag_sq())
            .sum()
    }

    /// `L^2 / 2I`.
    pub fn rotational_energy(&self, bodies: &BodySet, dt: f32) -> f32 {
        let inertia = self.moment_of_inertia(bodies);
        if inertia < EPSILON {
            return 0.0;
        }
        let l = self.angular_momentum(bodies, dt);
        l * l / (2.0 * inertia)
    }

    /// Smallest circle about the centre of mass enclosing every member disc.
    pub fn bounding_radius(&self, bodies: &BodySet) -> f32 {
        let com = self.center_of_mass(bodies);
        self.live(bodies)
            .map(|b| (b.pos - com).mag() + b.radius)
            .fold(0.0, f32::max)
    }

    /// Mass-weighted.
    pub fn average_color(&self, bodies: &BodySet) -> Color {
        let mass = self.mass(bodies);
        if mass <= 0.0 {
            return [0, 0, 0];
        }
        let mut sum = [0.0f32; 3];
        for body in self.live(bodies) {
            for (acc, c) in sum.iter_mut().zip(body.color) {
                *acc += f32::from(c) * body.mass;
            }
        }
        sum.map(|c| (c / mass).round().clamp(0.0, 255.0) as u8)
    }

    pub fn convex_hull(&self, bodies: &BodySet) -> ConvexHull {
        let points: Vec<Vec2> = self.live(bodies).map(|b| b.pos).collect();
        ConvexHull::from_points(&points)
    }

    /// Applies `f(offset_from_com, body)` to every live member.
    fn for_each_member(&self, bodies: &mut BodySet, mut f: impl FnMut(Vec2, &mut Body)) {
        let com = self.center_of_mass(bodies);
        for id in &self.members {
            if let Some(body) = bodies.get_mut(*id) {
                f(body.pos - com, body);
            }
        }
    }

    pub fn add_velocity(&self, bodies: &mut BodySet, delta: Vec2, dt: f32) {
        self.for_each_member(bodies, |_, body| {
            let vel = body.velocity(dt);
            body.set_velocity(vel + delta, dt);
        });
    }

    /// Splits `force` in proportion to mass, so every member accelerates alike.
    pub fn add_force(&self, bodies: &mut BodySet, force: Vec2) {
        let mass = self.mass(bodies);
        if mass <= 0.0 {
            return;
        }
        self.for_each_member(bodies, |_, body| body.add_force(force * (body.mass / mass)));
    }

    /// Applies a pure torque: tangential member forces with zero net force.
    pub fn add_torque(&self, bodies: &mut BodySet, torque: f32) {
        let inertia = self.moment_of_inertia(bodies);
        if inertia < EPSILON {
            return;
        }
        let alpha = torque / inertia;
        self.for_each_member(bodies, |r, body| body.add_force(perp(r) * (body.mass * alpha)));
    }

    /// Adds `energy` (negative removes) to motion relative to the centre of
    /// mass, leaving the centre-of-mass velocity untouched.
    ///
    /// Existing relative motion is scaled up. A cluster with none is given a
    /// radial expansion instead.
    pub fn add_internal_energy(&self, bodies: &mut BodySet, energy: f32, dt: f32) {
        let vel = self.velocity(bodies, dt);
        let current = self.internal_energy(bodies, dt);
        let target = (current + energy).max(0.0);

        if current > EPSILON {
            let scale = (target / current).sqrt();
            self.for_each_member(bodies, |_, body| {
                let relative = body.velocity(dt) - vel;
                body.set_velocity(vel + relative * scale, dt);
            });
            return;
        }

        let inertia = self.moment_of_inertia(bodies);
        if inertia < EPSILON {
            return;
        }
        let rate = (2.0 * target / inertia).sqrt();
        self.for_each_member(bodies, |r, body| {
            let v = body.velocity(dt);
            body.set_velocity(v + r * rate, dt);
        });
    }

    /// Adds `energy` (negative removes) to the spin about the centre of mass,
    /// keeping the current sense of rotation (counter-clockwise from rest).
    pub fn add_rotational_energy(&self, bodies: &mut BodySet, energy: f32, dt: f32) {
        let inertia = self.moment_of_inertia(bodies);
        if inertia < EPSILON {
            return;
        }
        let l = self.angular_momentum(bodies, dt);
        let target = (l * l / (2.0 * inertia) + energy).max(0.0);
        let sign = if l < 0.0 { -1.0 } else { 1.0 };
        let omega = sign * (2.0 * target / inertia).sqrt();
        let delta = omega - l / inertia;

        self.for_each_member(bodies, |r, body| {
            let v = body.velocity(dt);
            body.set_velocity(v + perp(r) * delta, dt);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 0.01;

    fn cluster(bodies: &[(Vec2, f32, Vec2)]) -> (BodySet, CompositeBody) {
        let mut set = BodySet::with_capacity(16);
        let ids = bodies
            .iter()
            .map(|&(pos, mass, vel)| {
                set.insert(Body::new(pos, mass, [100, 0, 200]).with_velocity(vel, DT))
                    .unwrap()
            })
            .collect();
        (set, CompositeBody::new(ids))
    }

    fn drifting_pair() -> (BodySet, CompositeBody) {
        cluster(&[
            (Vec2::new(-1.0, 0.0), 1.0, Vec2::new(2.0, 0.5)),
            (Vec2::new(2.0, 0.0), 2.0, Vec2::new(2.0, -0.25)),
        ])
    }

    #[test]
    fn aggregates() {
        let (set, composite) = drifting_pair();
        assert_relative_eq!(composite.mass(&set), 3.0);
        assert_relative_eq!(composite.center_of_mass(&set).x, 1.0, epsilon = 1e-6);
        let vel = composite.velocity(&set, DT);
        assert_relative_eq!(vel.x, 2.0, epsilon = 1e-3);
        assert_relative_eq!(vel.y, 0.0, epsilon = 1e-3);
        // 1 * 2^2 + 2 * 1^2
        assert_relative_eq!(composite.moment_of_inertia(&set), 6.0, epsilon = 1e-5);
        assert_eq!(composite.average_color(&set), [100, 0, 200]);
        // The light body sits farther out: 2 + cbrt(1).
        assert_relative_eq!(composite.bounding_radius(&set), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn pure_spin_has_matching_energies() {
        let (set, composite) = drifting_pair();
        // Relative velocities (0, 0.5) at r = -2 and (0, -0.25) at r = 1: clockwise.
        let l = composite.angular_momentum(&set, DT);
        assert_relative_eq!(l, -1.5, epsilon = 1e-3);
        assert_relative_eq!(composite.angular_velocity(&set, DT), -0.25, epsilon = 1e-3);
        assert_relative_eq!(
            composite.rotational_energy(&set, DT),
            composite.internal_energy(&set, DT),
            epsilon = 1e-3
        );
    }

    #[test]
    fn internal_energy_keeps_bulk_velocity() {
        let (mut set, composite) = drifting_pair();
        let before = composite.velocity(&set, DT);
        let energy = composite.internal_energy(&set, DT);

        composite.add_internal_energy(&mut set, 5.0, DT);

        let after = composite.velocity(&set, DT);
        assert_relative_eq!(after.x, before.x, epsilon = 1e-3);
        assert_relative_eq!(after.y, before.y, epsilon = 1e-3);
        assert_relative_eq!(composite.internal_energy(&set, DT), energy + 5.0, epsilon = 1e-2);
    }

    #[test]
    fn internal_energy_from_rest_expands_radially() {
        let (mut set, composite) = cluster(&[
            (Vec2::new(0.0, 0.0), 1.0, Vec2::zero()),
            (Vec2::new(2.0, 0.0), 1.0, Vec2::zero()),
        ]);
        composite.add_internal_energy(&mut set, 4.0, DT);

        assert_relative_eq!(composite.internal_energy(&set, DT), 4.0, epsilon = 1e-2);
        assert_relative_eq!(composite.velocity(&set, DT).mag(), 0.0, epsilon = 1e-3);
        let left = set.get(composite.members()[0]).unwrap().velocity(DT);
        assert!(left.x < 0.0);
    }

    #[test]
    fn rotational_energy_keeps_bulk_velocity() {
        let (mut set, composite) = drifting_pair();
        let before = composite.velocity(&set, DT);
        let rot = composite.rotational_energy(&set, DT);

        composite.add_rotational_energy(&mut set, 3.0, DT);

        let after = composite.velocity(&set, DT);
        assert_relative_eq!(after.x, before.x, epsilon = 1e-3);
        assert_relative_eq!(after.y, before.y, epsilon = 1e-3);
        assert_relative_eq!(composite.rotational_energy(&set, DT), rot + 3.0, epsilon = 1e-2);
        // Sense of rotation is kept.
        assert!(composite.angular_momentum(&set, DT) < 0.0);
    }

    #[test]
    fn torque_has_no_net_force() {
        let (mut set, composite) = drifting_pair();
        composite.add_torque(&mut set, 12.0);

        let net = set.iter().fold(Vec2::zero(), |acc, (_, b)| acc + b.force);
        assert_relative_eq!(net.mag(), 0.0, epsilon = 1e-5);

        let com = composite.center_of_mass(&set);
        let torque: f32 = set.iter().map(|(_, b)| cross(b.pos - com, b.force)).sum();
        assert_relative_eq!(torque, 12.0, epsilon = 1e-4);
    }

    #[test]
    fn force_is_split_by_mass() {
        let (mut set, composite) = drifting_pair();
        composite.add_force(&mut set, Vec2::new(3.0, 0.0));
        let ids = composite.members();
        assert_relative_eq!(set.get(ids[0]).unwrap().force.x, 1.0);
        assert_relative_eq!(set.get(ids[1]).unwrap().force.x, 2.0);

        composite.add_velocity(&mut set, Vec2::new(0.0, 1.0), DT);
        assert_relative_eq!(composite.velocity(&set, DT).y, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn stale_members_are_ignored() {
        let (mut set, composite) = drifting_pair();
        set.remove(composite.members()[0]);
        assert_relative_eq!(composite.mass(&set), 2.0);
        assert_eq!(composite.moment_of_inertia(&set), 0.0);
        assert_eq!(composite.convex_hull(&set).len(), 1);
    }
}
