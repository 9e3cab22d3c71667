//! Typed error hierarchy for the Kanban service.
//!
//! Two enums cover the board domain:
//! - `BoardError`: service, store, and client failures
//! - `AuthError`: bearer-token failures at the API boundary

use thiserror::Error;

/// Errors raised while authenticating a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,
}

/// Errors from board operations on either side of the wire.
///
/// `NotFoundOrForbidden` carries no detail. A resource that does not exist
/// and one owned by someone else look the same to the caller.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Resource not found or permission denied")]
    NotFoundOrForbidden,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Storage error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("Request failed: {0}")]
    Network(String),
}

impl From<anyhow::Error> for BoardError {
    fn from(err: anyhow::Error) -> Self {
        BoardError::Persistence(err)
    }
}

impl BoardError {
    /// Shorthand for a missing or blank field.
    pub fn missing(field: &str) -> Self {
        BoardError::Validation(format!("{} is required", field))
    }
}
