//! Error types for envdock-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] envdock_api::ApiError),

    #[error(transparent)]
    Config(#[from] envdock_config::ConfigError),

    /// Client-side validation failure; no request was made
    #[error("{0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
