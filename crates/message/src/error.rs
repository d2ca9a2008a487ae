//! Text generation errors

use thiserror::Error;

/// Failure of an AI backend
///
/// Never fatal: the generator answers every variant with a fallback message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Provider is missing a key or endpoint
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Connection failed, DNS, timeout
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Body did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Backend answered with nothing usable
    #[error("empty response")]
    Empty,
}

impl GenerationError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GenerationError::InvalidResponse(err.to_string())
        } else {
            GenerationError::Network(err.to_string())
        }
    }
}
