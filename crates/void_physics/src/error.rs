//! Error types for the physics system

use thiserror::Error;

/// Physics system errors
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// Rigid body not found
    #[error("Rigid body not found: {0:?}")]
    BodyNotFound(crate::body::BodyId),

    /// Constraint not found
    #[error("Constraint not found: {0:?}")]
    ConstraintNotFound(crate::constraint::ConstraintId),

    /// Material carries an id from a different world
    #[error("Material '{0}' is registered with another world")]
    ForeignMaterial(String),

    /// Invalid configuration
    #[error("Invalid physics configuration: {0}")]
    InvalidConfig(String),

    /// Timestep is not a positive finite number
    #[error("Invalid timestep: {0}")]
    InvalidTimestep(f32),

    /// Broadphase produced pair lists of different lengths
    #[error("Broadphase returned mismatched pair lists ({left} vs {right})")]
    BroadphaseMismatch { left: usize, right: usize },

    /// Broadphase produced an index outside the body list
    #[error("Broadphase pair index {index} out of range for {bodies} bodies")]
    PairOutOfRange { index: usize, bodies: usize },
}

/// Result type for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
