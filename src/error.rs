//! Error types for the workspace tree engine.
//!
//! `TreeError` covers pure tree transforms, `BackendError` is the only failure
//! that crosses the backend boundary, and `ApiError` is what the engine and the
//! CLI hand back to callers.

use thiserror::Error;

/// Failures of the pure TreeModel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Failures reported by a backend implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the workspace engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Fixture error: {0}")]
    FixtureError(String),
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(msg) => ApiError::NotFound(msg),
            BackendError::Conflict(msg) => ApiError::Conflict(msg),
            BackendError::Unavailable(msg) => ApiError::BackendUnavailable(msg),
        }
    }
}

impl From<TreeError> for ApiError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NotFound(path) => ApiError::NotFound(path),
            TreeError::AlreadyExists(path) => ApiError::AlreadyExists(path),
            TreeError::InvalidPath(path) => ApiError::InvalidInput(path),
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
