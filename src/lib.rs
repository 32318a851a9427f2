//! 2D gravitational and elastic N-body sandbox.
//!
//! Bodies attract each other through a Barnes-Hut [`Quadtree`], push apart
//! and lose energy when they overlap, merge or stick together through
//! [`SpringNetwork`] links, and form [`CompositeBody`] clusters that can be
//! spun up or heated without moving their centre of mass. [`Simulation`] owns
//! all of it and runs the fixed-step tick loop; [`c_api`] exposes it over the
//! C ABI.

pub mod body;
pub mod body_set;
pub mod c_api;
pub mod circle;
pub mod clock;
pub mod composite;
pub mod condition;
pub mod config;
pub mod error;
pub mod events;
pub mod force;
pub mod hull;
pub mod merge;
pub mod orbit;
pub mod quadtree;
pub mod simulation;
pub mod spring;

pub use body::{Body, BodyId, Color};
pub use body_set::BodySet;
pub use clock::{ClockState, SimulationClock};
pub use composite::CompositeBody;
pub use condition::Condition;
pub use config::{SimConfig, SpringConfig};
pub use error::SimError;
pub use events::{BreakReason, Event, EventQueue, EventSink, FnSink, NullSink};
pub use force::{CollisionDamping, FieldForce, Gravity, OverlapMeasure, PairForce, PointMass, Repulsion};
pub use hull::ConvexHull;
pub use merge::{MergePolicy, SpringField, merge_bodies};
pub use orbit::OrbitSpec;
pub use quadtree::{Node, Quad, Quadtree};
pub use simulation::Simulation;
pub use spring::{Spring, SpringNetwork, SpringParams};
pub use ultraviolet::Vec2;
