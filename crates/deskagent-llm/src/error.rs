//! Error types for model providers.

use thiserror::Error;

/// Errors raised by chat model providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure (connection, timeout, TLS)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned a non-success status
    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// A required API key was not configured
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    /// The provider response could not be interpreted
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider returned no usable candidates
    #[error("Provider returned an empty response")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, LlmError>;
