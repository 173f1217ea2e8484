//! Error types for dnsbatch
//!
//! This module defines all error types used throughout the crate.
//!
//! Rate limiting is deliberately absent: a 429 response is a normal result
//! that the scheduler absorbs into its delay decision.

use thiserror::Error;

/// Result type alias for dnsbatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dnsbatch
#[derive(Error, Debug)]
pub enum Error {
    /// Network-level failure: no HTTP response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A response arrived but its body did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an unexpected response error
    pub fn unexpected_response(msg: impl Into<String>) -> Self {
        Self::UnexpectedResponse(msg.into())
    }

    /// Whether this error means the request never got a response
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
