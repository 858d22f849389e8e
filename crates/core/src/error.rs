//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, local failures that are detected before
/// anything is sent to the remote authority. Transport concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty or over-long role name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant would be violated (e.g. deleting the admin role).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was missing or malformed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The value collides with an existing entity (e.g. duplicate role name).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
