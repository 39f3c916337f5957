//! Error types for the world simulation.

use realm_shared::Point;

/// Errors raised while building or mutating the world
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A creature template violates an invariant the simulation depends on
    #[error("invalid template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: &'static str },

    /// The requested spawn cell does not exist or is not walkable
    #[error("invalid spawn point {0}")]
    InvalidSpawnPoint(Point),

    /// No creature template with this name is loaded
    #[error("unknown monster template: {0}")]
    UnknownMonster(String),

    /// No walkable, item-free cell was found around a drop position
    #[error("no space to drop item within {radius} cells of {point}")]
    NoDropSpace { point: Point, radius: i32 },

    /// A drop file line could not be parsed
    #[error("invalid drop line '{line}': {reason}")]
    DropParse { line: String, reason: &'static str },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
