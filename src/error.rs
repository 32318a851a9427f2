use crate::body::BodyId;

/// Errors returned by simulation commands.
///
/// Nothing inside a tick produces these: stale springs are pruned, degenerate
/// geometry is skipped and forces are clamped. They only surface when an
/// external command cannot be honoured.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// The body set is full.
    CapacityExceeded { capacity: usize },
    /// The id refers to a body that was merged, deleted or cleared.
    StaleBody(BodyId),
    /// A spring already joins this pair.
    AlreadyLinked(BodyId, BodyId),
    /// A spring needs two distinct endpoints.
    SelfLink(BodyId),
    /// A position or velocity command carried NaN or infinity.
    NonFinite(BodyId),
    /// Mass or radius is zero, negative or not finite.
    InvalidGeometry { mass: f32, radius: f32 },
    /// A configuration value is out of range.
    InvalidConfig(String),
    /// A configuration document could not be parsed.
    ConfigParse(String),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::CapacityExceeded { capacity } => {
                write!(f, "Body capacity exceeded (max {capacity})")
            }
            SimError::StaleBody(id) => write!(f, "Body {id} no longer exists"),
            SimError::AlreadyLinked(a, b) => write!(f, "Bodies {a} and {b} are already linked"),
            SimError::SelfLink(id) => write!(f, "Cannot link body {id} to itself"),
            SimError::NonFinite(id) => write!(f, "Non-finite position or velocity for body {id}"),
            SimError::InvalidGeometry { mass, radius } => {
                write!(f, "Invalid body geometry: mass {mass}, radius {radius}")
            }
            SimError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            SimError::ConfigParse(msg) => write!(f, "Failed to parse configuration: {msg}"),
        }
    }
}

impl std::error::Error for SimError {}

impl From<serde_yaml::Error> for SimError {
    fn from(err: serde_yaml::Error) -> Self {
        SimError::ConfigParse(err.to_string())
    }
}
