//! Body generators: orbiting satellites and a galaxy-like disc.

use crate::body::{Body, Color};
use serde::{Deserialize, Serialize};
use ultraviolet::Vec2;

const PALETTE: [Color; 6] = [
    [255, 179, 71],
    [119, 221, 119],
    [174, 198, 207],
    [255, 105, 97],
    [203, 153, 201],
    [253, 253, 150],
];

/// Distribution of bodies to place in orbit around a reference body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitSpec {
    pub count: usize,
    pub distance_mean: f32,
    pub distance_std: f32,
    /// Satellite mass as a fraction of the reference mass.
    pub mass_ratio_mean: f32,
    pub mass_ratio_std: f32,
    /// 0 is circular. Clamped below 1 so every orbit stays bound.
    pub eccentricity: f32,
}

impl Default for OrbitSpec {
    fn default() -> Self {
        Self {
            count: 1,
            distance_mean: 200.0,
            distance_std: 20.0,
            mass_ratio_mean: 1e-3,
            mass_ratio_std: 2e-4,
            eccentricity: 0.0,
        }
    }
}

/// Box-Muller normal sample.
fn gauss(rng: &mut fastrand::Rng, mean: f32, std: f32) -> f32 {
    let u1 = 1.0 - rng.f32();
    let u2 = rng.f32();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
    mean + z * std
}

/// Speed at distance `r` on an orbit whose closest approach is `r`
/// (vis-viva with `a = r / (1 - e)`).
pub fn orbital_speed(g: f32, central_mass: f32, r: f32, eccentricity: f32) -> f32 {
    let e = eccentricity.clamp(0.0, 1.0 - 1e-6);
    let semi_major = r / (1.0 - e);
    (g * central_mass * (2.0 / r - 1.0 / semi_major)).max(0.0).sqrt()
}

/// Generates `spec.count` satellites of `reference`, moving counter-clockwise
/// relative to it. Sampled distances never put a satellite inside the
/// reference body.
pub fn orbital_bodies(
    reference: &Body,
    spec: &OrbitSpec,
    g: f32,
    dt: f32,
    rng: &mut fastrand::Rng,
) -> Vec<Body> {
    let reference_vel = reference.velocity(dt);

    (0..spec.count)
        .map(|_| {
            let ratio = gauss(rng, spec.mass_ratio_mean, spec.mass_ratio_std).max(1e-9);
            let mass = ratio * reference.mass;
            let radius = mass.cbrt();
            let distance = gauss(rng, spec.distance_mean, spec.distance_std)
                .max(reference.radius + radius);

            let angle = rng.f32() * std::f32::consts::TAU;
            let (sin, cos) = angle.sin_cos();
            let pos = reference.pos + Vec2::new(cos, sin) * distance;

            let speed = orbital_speed(g, reference.mass, distance, spec.eccentricity);
            let vel = reference_vel + Vec2::new(-sin, cos) * speed;
            let color = PALETTE[rng.usize(..PALETTE.len())];

            Body::new(pos, mass, color).with_velocity(vel, dt)
        })
        .collect()
}

/// Generates `n` bodies in a uniform disc around a heavy centre, each on a
/// circular orbit about the mass enclosed by its radius.
pub fn uniform_disc(n: usize, g: f32, dt: f32, rng: &mut fastrand::Rng) -> Vec<Body> {
    if n == 0 {
        return Vec::new();
    }

    let inner_radius = 25.0;
    let outer_radius = (n as f32).sqrt() * 5.0 + inner_radius;

    let mut bodies: Vec<Body> = Vec::with_capacity(n);
    bodies.push(Body::new(Vec2::zero(), 1e6, [255, 255, 255]).with_radius(inner_radius));

    while bodies.len() < n {
        let a = rng.f32() * std::f32::consts::TAU;
        let (sin, cos) = a.sin_cos();

        // Uniform in area between the two radii.
        let t = inner_radius / outer_radius;
        let r = rng.f32() * (1.0 - t * t) + t * t;
        let pos = Vec2::new(cos, sin) * outer_radius * r.sqrt();

        bodies.push(Body::new(pos, 1.0, PALETTE[rng.usize(..PALETTE.len())]));
    }

    bodies.sort_by(|a, b| a.pos.mag_sq().total_cmp(&b.pos.mag_sq()));

    let mut enclosed = 0.0;
    for body in &mut bodies {
        enclosed += body.mass;
        let r = body.pos.mag();
        if r == 0.0 {
            continue;
        }
        let dir = Vec2::new(-body.pos.y, body.pos.x) / r;
        body.set_velocity(dir * (g * enclosed / r).sqrt(), dt);
    }

    bodies
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 0.01;

    #[test]
    fn circular_orbit_speed() {
        assert_relative_eq!(orbital_speed(1.0, 100.0, 4.0, 0.0), 5.0, epsilon = 1e-5);
        // Faster at periapsis of an eccentric orbit.
        assert!(orbital_speed(1.0, 100.0, 4.0, 0.5) > 5.0);
        // Parabolic input is clamped to a bound orbit.
        assert!(orbital_speed(1.0, 100.0, 4.0, 2.0).is_finite());
    }

    #[test]
    fn satellites_circle_the_reference() {
        let reference = Body::new(Vec2::new(10.0, -5.0), 1e4, [0, 0, 0]).with_velocity(Vec2::new(1.0, 0.0), DT);
        let spec = OrbitSpec {
            count: 32,
            distance_mean: 100.0,
            distance_std: 10.0,
            ..OrbitSpec::default()
        };
        let mut rng = fastrand::Rng::with_seed(7);

        let bodies = orbital_bodies(&reference, &spec, 1.0, DT, &mut rng);
        assert_eq!(bodies.len(), 32);

        for body in &bodies {
            let offset = body.pos - reference.pos;
            let r = offset.mag();
            assert!(r > reference.radius);
            assert!(body.mass > 0.0);

            let relative = body.velocity(DT) - reference.velocity(DT);
            // Tangential, counter-clockwise, at the circular speed.
            assert!(relative.dot(offset).abs() / (relative.mag() * r) < 1e-2);
            assert!(crate::body::cross(offset, relative) > 0.0);
            assert_relative_eq!(relative.mag(), (1e4 / r).sqrt(), max_relative = 1e-2);
        }
    }

    #[test]
    fn disc_is_sorted_and_seeded() {
        let a = uniform_disc(200, 1.0, DT, &mut fastrand::Rng::with_seed(1));
        let b = uniform_disc(200, 1.0, DT, &mut fastrand::Rng::with_seed(1));
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
        assert_eq!(a[0].pos, Vec2::zero());
        assert!(a.windows(2).all(|w| w[0].pos.mag_sq() <= w[1].pos.mag_sq()));
        assert!(uniform_disc(0, 1.0, DT, &mut fastrand::Rng::with_seed(1)).is_empty());
    }
}
