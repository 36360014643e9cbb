use thiserror::Error;

use crate::api::ApiError;

/// Failures surfaced by the setup flow, the resolvers and the command layer.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Not logged in. Please run 'world login' first.")]
    NotLoggedIn,

    #[error("Your login token has expired. Please run 'world login' again.")]
    TokenExpired,

    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Selection cancelled")]
    SelectionCancelled,

    #[error("Creation cancelled")]
    CreationCancelled,

    #[error("{0}")]
    PreconditionViolated(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

impl ForgeError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ForgeError::NotFound(what.into())
    }

    /// Backend rejected the payload (bad slug, duplicate slug, malformed field).
    pub fn is_validation(&self) -> bool {
        match self {
            ForgeError::ValidationFailed(_) => true,
            ForgeError::Api(err) => err.is_validation(),
            _ => false,
        }
    }
}

pub type ForgeResult<T> = std::result::Result<T, ForgeError>;
