//! # DomainError
//!
//! Centralized error handling for the Nestboard core.
//! Every port and service returns this type; adapters translate their own
//! failures into it at the boundary.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed, missing or out-of-range input (content length, bad vote type, bad id)
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced resource does not exist
    #[error("{entity} not found with ID {id}")]
    NotFound { entity: &'static str, id: String },

    /// Requester exists but does not own the resource
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Persistence failure; the detail is for logs, never for callers
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn message_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "message",
            id: id.to_string(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

/// A specialized Result type for Nestboard logic.
pub type Result<T> = std::result::Result<T, DomainError>;
