//! Error types for adapters.

use probewatch_engine::TransportError;
use thiserror::Error;

/// Errors that can occur when fetching probe data through an adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Reading a fixture failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}

impl From<AdapterError> for TransportError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Timeout => TransportError::Timeout,
            AdapterError::Parse(message) => TransportError::Decode(message),
            AdapterError::Io(e) => TransportError::Other(Box::new(e)),
            other => TransportError::Request(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_transport_error() {
        let err: TransportError = AdapterError::Timeout.into();
        assert!(matches!(err, TransportError::Timeout));

        let err: TransportError = AdapterError::Parse("bad json".to_string()).into();
        assert!(matches!(err, TransportError::Decode(ref m) if m == "bad json"));

        let err: TransportError = AdapterError::Auth("expired session".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Request failed: Authentication failed: expired session"
        );
    }

    #[test]
    fn test_io_error_is_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: TransportError = AdapterError::from(io).into();
        assert!(matches!(err, TransportError::Other(_)));
        assert_eq!(err.to_string(), "missing.json");
    }
}
