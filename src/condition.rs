//! Composable predicates over a pair of bodies.
//!
//! Used to decide which overlapping pairs merge and which neighbours get a
//! spring. Build them from the leaf constructors and combine with `&`, `|`
//! and `!`:
//!
//! ```
//! use nbody_sandbox::Condition;
//!
//! // Close and slow: fast grazing passes do not merge.
//! let merge = Condition::IntersectionArea(0.75) & Condition::RelativeSpeed(100.0);
//! let spring = !Condition::MassRatio(0.01) & Condition::SurfaceGap(5.0);
//! # let _ = (merge, spring);
//! ```

use crate::{body::Body, circle};
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, Not};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Lens area exceeds this fraction of the smaller body's area.
    IntersectionArea(f32),
    /// Common chord exceeds this fraction of the smaller radius.
    ChordLength(f32),
    /// Penetration depth exceeds this fraction of the smaller radius.
    PenetrationDepth(f32),
    /// Relative speed is below this.
    RelativeSpeed(f32),
    /// Centres are closer than this.
    PointDistance(f32),
    /// Surfaces are at most this far apart (negative when overlapping).
    SurfaceGap(f32),
    /// Lighter mass over heavier mass is below this.
    MassRatio(f32),
    Always,
    Never,
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluates the predicate. `dt` is only used to derive velocities.
    pub fn holds(&self, a: &Body, b: &Body, dt: f32) -> bool {
        let distance = || (a.pos - b.pos).mag();
        let min_radius = || a.radius.min(b.radius);

        match self {
            Condition::IntersectionArea(ratio) => {
                circle::intersection_area(a.radius, b.radius, distance())
                    > ratio * a.area().min(b.area())
            }
            Condition::ChordLength(ratio) => {
                circle::chord_length(a.radius, b.radius, distance()) > ratio * min_radius()
            }
            Condition::PenetrationDepth(ratio) => {
                circle::penetration_depth(a.radius, b.radius, distance()) > ratio * min_radius()
            }
            Condition::RelativeSpeed(threshold) => (a.velocity(dt) - b.velocity(dt)).mag() < *threshold,
            Condition::PointDistance(threshold) => distance() < *threshold,
            Condition::SurfaceGap(threshold) => distance() - a.radius - b.radius <= *threshold,
            Condition::MassRatio(ratio) => {
                let heavier = a.mass.max(b.mass);
                heavier > 0.0 && a.mass.min(b.mass) / heavier < *ratio
            }
            Condition::Always => true,
            Condition::Never => false,
            Condition::And(lhs, rhs) => lhs.holds(a, b, dt) && rhs.holds(a, b, dt),
            Condition::Or(lhs, rhs) => lhs.holds(a, b, dt) || rhs.holds(a, b, dt),
            Condition::Not(inner) => !inner.holds(a, b, dt),
        }
    }

    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Condition {
        Condition::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}
