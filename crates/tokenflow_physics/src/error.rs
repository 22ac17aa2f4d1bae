//! Error types for tokenflow_physics

use thiserror::Error;
use tokenflow_core::TokenId;

/// Errors raised by the physics world
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Time step was negative or not finite
    #[error("invalid time step: {0}")]
    InvalidTimeStep(f32),

    /// A token is registered but absent from the token store
    #[error("participating token {0} is missing from the token store")]
    MissingBody(TokenId),

    /// Constraint endpoint is not registered with the world
    #[error("{0} is not registered with the physics world")]
    UnknownToken(TokenId),

    /// A constraint must connect two distinct tokens
    #[error("cannot constrain {0} to itself")]
    SelfConstraint(TokenId),

    /// A constraint references a token that left the world
    #[error("spring constraint references unregistered token {0}")]
    DanglingConstraint(TokenId),

    /// Integration produced NaN or infinity
    #[error("non-finite state for {0} after integration")]
    NonFinite(TokenId),
}

/// Result type for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
