use ultraviolet::Vec2;

/// RGB display colour. Carried through merges, never read by the physics.
pub type Color = [u8; 3];

/// 2D cross product (z component of the 3D cross product).
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// True when both components are finite.
#[inline]
pub fn is_finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

/// Rotates `v` by 90 degrees counter-clockwise.
#[inline]
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Stable handle to a body in a [`BodySet`](crate::BodySet).
///
/// The generation is bumped whenever the slot is vacated, so a handle kept
/// past a merge or deletion never aliases the body that reuses its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId {
    index: u32,
    generation: u32,
}

impl BodyId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the id into a single integer for the C ABI.
    /// Generations start at 1, so 0 never names a live body.
    pub fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// A circular body integrated with position Verlet.
///
/// Velocity is never stored: it is `(pos - prev_pos) / dt`. Moving a body
/// through [`Body::set_position`] therefore keeps its motion intact, and
/// [`Body::set_velocity`] only rewrites the previous position.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    /// Current position.
    pub pos: Vec2,
    /// Position one step ago.
    pub prev_pos: Vec2,
    /// Force accumulated during the current tick.
    pub force: Vec2,
    pub mass: f32,
    pub radius: f32,
    pub color: Color,
    /// Set by the host's selection commands.
    pub selected: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self::new(Vec2::zero(), 1.0, [255, 255, 255])
    }
}

impl Body {
    /// Creates a body at rest. The radius follows from the mass (`cbrt(m)`).
    pub fn new(pos: Vec2, mass: f32, color: Color) -> Self {
        Self {
            pos,
            prev_pos: pos,
            force: Vec2::zero(),
            mass,
            radius: mass.cbrt(),
            color,
            selected: false,
        }
    }

    /// Overrides the mass-derived radius.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_velocity(mut self, vel: Vec2, dt: f32) -> Self {
        self.set_velocity(vel, dt);
        self
    }

    /// True when mass and radius are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.mass.is_finite() && self.mass > 0.0 && self.radius.is_finite() && self.radius > 0.0
    }

    #[inline]
    pub fn velocity(&self, dt: f32) -> Vec2 {
        (self.pos - self.prev_pos) / dt
    }

    #[inline]
    pub fn set_velocity(&mut self, vel: Vec2, dt: f32) {
        self.prev_pos = self.pos - vel * dt;
    }

    /// Moves the body without changing its implicit velocity.
    pub fn set_position(&mut self, pos: Vec2) {
        let delta = self.pos - self.prev_pos;
        self.pos = pos;
        self.prev_pos = pos - delta;
    }

    #[inline]
    pub fn add_force(&mut self, force: Vec2) {
        self.force += force;
    }

    #[inline]
    pub fn reset_force(&mut self) {
        self.force = Vec2::zero();
    }

    /// Advances one step of position Verlet: `x' = 2x - x_prev + F/m dt^2`.
    #[inline]
    pub fn integrate(&mut self, dt: f32) {
        let current = self.pos;
        self.pos += (self.pos - self.prev_pos) + self.force * (dt * dt / self.mass);
        self.prev_pos = current;
    }

    pub fn area(&self) -> f32 {
        std::f32::consts::PI * self.radius * self.radius
    }

    pub fn density(&self) -> f32 {
        self.mass / self.area()
    }

    pub fn momentum(&self, dt: f32) -> Vec2 {
        self.velocity(dt) * self.mass
    }

    pub fn kinetic_energy(&self, dt: f32) -> f32 {
        0.5 * self.mass * self.velocity(dt).mag_sq()
    }

    /// Speed needed to escape from the surface of this body.
    pub fn escape_velocity(&self, g: f32) -> f32 {
        (2.0 * g * self.mass / self.radius).sqrt()
    }

    /// Adds (or removes, when negative) kinetic energy along the current
    /// direction of motion. Removing more than the body has brings it to rest.
    pub fn add_kinetic_energy(&mut self, energy: f32, dt: f32) {
        let vel = self.velocity(dt);
        let speed = vel.mag();
        let target = (self.kinetic_energy(dt) + energy).max(0.0);
        let new_speed = (2.0 * target / self.mass).sqrt();
        let dir = if speed > f32::EPSILON {
            vel / speed
        } else {
            Vec2::unit_x()
        };
        self.set_velocity(dir * new_speed, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 0.01;

    #[test]
    fn radius_defaults_to_cube_root_of_mass() {
        let body = Body::new(Vec2::zero(), 27.0, [0, 0, 0]);
        assert_relative_eq!(body.radius, 3.0, epsilon = 1e-5);
        assert_relative_eq!(body.with_radius(0.5).radius, 0.5);
    }

    #[test]
    fn velocity_is_derived_from_previous_position() {
        let mut body = Body::new(Vec2::new(1.0, 1.0), 1.0, [0, 0, 0]);
        assert_eq!(body.velocity(DT), Vec2::zero());

        body.set_velocity(Vec2::new(2.0, -1.0), DT);
        let vel = body.velocity(DT);
        assert_relative_eq!(vel.x, 2.0, epsilon = 1e-3);
        assert_relative_eq!(vel.y, -1.0, epsilon = 1e-3);
    }

    #[test]
    fn dragging_keeps_velocity() {
        let mut body = Body::new(Vec2::zero(), 1.0, [0, 0, 0]).with_velocity(Vec2::new(3.0, 0.0), DT);
        body.set_position(Vec2::new(10.0, 5.0));
        assert_eq!(body.pos, Vec2::new(10.0, 5.0));
        assert_relative_eq!(body.velocity(DT).x, 3.0, epsilon = 1e-3);
        assert_relative_eq!(body.velocity(DT).y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn verlet_step_under_constant_force() {
        let mut body = Body::new(Vec2::zero(), 2.0, [0, 0, 0]);
        body.add_force(Vec2::new(4.0, 0.0));
        body.integrate(0.5);
        // a = 2, x = a dt^2
        assert_relative_eq!(body.pos.x, 0.5, epsilon = 1e-6);
        assert_eq!(body.prev_pos, Vec2::zero());

        body.integrate(0.5);
        assert_relative_eq!(body.pos.x, 1.5, epsilon = 1e-6);
    }

    #[test]
    fn adding_kinetic_energy_keeps_direction() {
        let mut body = Body::new(Vec2::zero(), 2.0, [0, 0, 0]).with_velocity(Vec2::new(0.0, 1.0), 0.1);
        let before = body.kinetic_energy(0.1);
        body.add_kinetic_energy(3.0, 0.1);
        assert_relative_eq!(body.kinetic_energy(0.1), before + 3.0, epsilon = 1e-3);
        assert!(body.velocity(0.1).x.abs() < 1e-4);

        body.add_kinetic_energy(-100.0, 0.1);
        assert!(body.velocity(0.1).mag() < 1e-4);
    }

    #[test]
    fn id_bits_round_trip() {
        let id = BodyId::new(12, 9);
        assert_eq!(BodyId::from_bits(id.to_bits()), id);
        assert_ne!(id.to_bits(), 0);
    }

    #[test]
    fn validity_rejects_degenerate_geometry() {
        assert!(Body::new(Vec2::zero(), 1.0, [0, 0, 0]).is_valid());
        assert!(!Body::new(Vec2::zero(), 0.0, [0, 0, 0]).is_valid());
        assert!(!Body::new(Vec2::zero(), 1.0, [0, 0, 0]).with_radius(-1.0).is_valid());
        assert!(!Body::new(Vec2::zero(), f32::NAN, [0, 0, 0]).is_valid());
    }
}
