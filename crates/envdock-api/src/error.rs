//! Error types for backend API access

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response; `detail` is the server's message when the body
    /// carried one, otherwise a fallback built from the status
    #[error("{detail}")]
    Server { status: u16, detail: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from server: {0}")]
    InvalidResponse(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid server URL: {0}")]
    BadUrl(String),
}

impl ApiError {
    /// HTTP status for server-rejected requests, if applicable
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
