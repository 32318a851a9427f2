//! Tunable constants, loadable from YAML.
//!
//! Every field has a default, so a file only needs the values it changes:
//!
//! ```yaml
//! g: 1.0
//! theta: 0.7
//! max_bodies: 2000
//! parallel: true
//! spring:
//!   stiffness: 5000.0
//!   break_distance_factor: 2.0
//! ```

use crate::{error::SimError, force::OverlapMeasure, spring::SpringParams};
use serde::{Deserialize, Serialize};

/// Spring defaults used by linking commands and the spring field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    pub stiffness: f32,
    pub damping: f32,
    pub break_distance_factor: f32,
    pub break_force: f32,
    /// Global cap on any spring's force.
    pub max_force: f32,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 1e4,
            damping: 1e1,
            break_distance_factor: 1.5,
            break_force: f32::INFINITY,
            max_force: 1e7,
        }
    }
}

impl SpringConfig {
    pub fn params(&self) -> SpringParams {
        SpringParams::new(self.stiffness, self.damping)
            .with_break_distance_factor(self.break_distance_factor)
            .with_break_force(self.break_force)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Gravitational constant.
    pub g: f32,
    pub softening: f32,

    pub repulsion_strength: f32,
    pub repulsion_beta: f32,
    pub repulsion_slack: f32,
    pub overlap_measure: OverlapMeasure,
    pub collision_damping: f32,

    pub spring: SpringConfig,

    /// Barnes-Hut opening angle.
    pub theta: f32,
    /// Extra reach added to radii when collecting neighbour pairs.
    pub neighborhood_margin: f32,

    pub enable_merging: bool,
    /// Lens area over the smaller body's area needed to merge.
    pub merge_area_ratio: f32,
    /// Pairs approaching faster than this bounce instead of merging.
    pub merge_speed_threshold: f32,

    pub enable_spring_field: bool,
    pub spring_link_gap: f32,
    pub spring_link_speed: f32,

    pub max_bodies: usize,
    /// Fixed simulation step in seconds.
    pub dt: f32,
    /// Most fixed steps run per `update`.
    pub max_substeps: u32,
    /// Evaluate gravity on the rayon pool.
    pub parallel: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            g: 6.674e-4,
            softening: 0.0,
            repulsion_strength: 1e3,
            repulsion_beta: 1.5,
            repulsion_slack: 1e-3,
            overlap_measure: OverlapMeasure::Area,
            collision_damping: 1e2,
            spring: SpringConfig::default(),
            theta: 0.5,
            neighborhood_margin: 0.0,
            enable_merging: true,
            merge_area_ratio: 0.75,
            merge_speed_threshold: 100.0,
            enable_spring_field: true,
            spring_link_gap: 5.0,
            spring_link_speed: 100.0,
            max_bodies: 10_000,
            dt: 1.0 / 60.0,
            max_substeps: 4,
            parallel: false,
        }
    }
}

impl SimConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, SimError> {
        let config: SimConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, SimError> {
        let config: SimConfig = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the tick loop cannot run with.
    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |msg: String| Err(SimError::InvalidConfig(msg));

        if !(self.dt.is_finite() && self.dt > 0.0) {
            return invalid(format!("dt must be positive, got {}", self.dt));
        }
        if self.max_bodies == 0 {
            return invalid("max_bodies must be at least 1".into());
        }
        if self.max_substeps == 0 {
            return invalid("max_substeps must be at least 1".into());
        }
        if self.theta.is_nan() || self.theta < 0.0 {
            return invalid(format!("theta must be non-negative, got {}", self.theta));
        }
        if !self.g.is_finite() {
            return invalid(format!("g must be finite, got {}", self.g));
        }
        for (name, value) in [
            ("softening", self.softening),
            ("repulsion_strength", self.repulsion_strength),
            ("repulsion_slack", self.repulsion_slack),
            ("collision_damping", self.collision_damping),
            ("neighborhood_margin", self.neighborhood_margin),
            ("spring.stiffness", self.spring.stiffness),
            ("spring.damping", self.spring.damping),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{name} must be finite and non-negative, got {value}"));
            }
        }
        if self.spring.break_distance_factor.is_nan() || self.spring.break_distance_factor <= 1.0 {
            return invalid(format!(
                "spring.break_distance_factor must exceed 1, got {}",
                self.spring.break_distance_factor
            ));
        }
        if self.spring.max_force.is_nan() || self.spring.max_force <= 0.0 {
            return invalid(format!("spring.max_force must be positive, got {}", self.spring.max_force));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = SimConfig::from_yaml_str(
            "g: 1.0\ntheta: 0.7\nparallel: true\noverlap_measure: depth\nspring:\n  stiffness: 5000.0\n",
        )
        .unwrap();

        assert_eq!(config.g, 1.0);
        assert_eq!(config.theta, 0.7);
        assert!(config.parallel);
        assert_eq!(config.overlap_measure, OverlapMeasure::Depth);
        assert_eq!(config.spring.stiffness, 5000.0);
        assert_eq!(config.spring.damping, SpringConfig::default().damping);
        assert_eq!(config.max_bodies, SimConfig::default().max_bodies);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            SimConfig::from_yaml_str("dt: 0.0"),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(matches!(
            SimConfig::from_yaml_str("max_bodies: 0"),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(matches!(
            SimConfig::from_yaml_str("theta: [1, 2]"),
            Err(SimError::ConfigParse(_))
        ));
    }
}
