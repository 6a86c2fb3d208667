//! Error types for the gallery client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching, decoding or rendering gallery data
#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be sent or completed
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("Request to {endpoint} failed with status {status}")]
    Fetch { status: u16, endpoint: String },

    /// The response body was not valid JSON or not decodable base64
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Request timed out
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// The request was abandoned because the page navigated away
    #[error("Request to {0} was cancelled")]
    Cancelled(String),

    /// Invalid configuration or missing page parameter
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Token storage could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transport-level failures, timeouts included
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_))
    }

    /// HTTP status carried by a `Fetch` error
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Fetch { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(format!("invalid base64: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_reports_status_and_endpoint() {
        let err = Error::Fetch { status: 401, endpoint: "/api/images/".into() };
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("/api/images/"));
        assert!(!err.is_network());
    }

    #[test]
    fn timeout_counts_as_network_failure() {
        assert!(Error::Timeout(500).is_network());
        assert!(Error::Network("refused".into()).is_network());
        assert_eq!(Error::Decode("x".into()).status(), None);
    }
}
