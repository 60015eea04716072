//! Error types for the engine.

use thiserror::Error;

/// Errors reported by a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or was rejected.
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// No response within the transport's deadline.
    #[error("Request timed out")]
    Timeout,

    /// Any other transport-specific failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by the coordinator and probe manager.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request is missing its keys or range, or names unknown probes.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl EngineError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        EngineError::MalformedRequest(message.into())
    }
}
