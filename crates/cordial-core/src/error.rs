//! Error types for the cordial core library
//!
//! Local failures (configuration, transport, retry exhaustion) live here;
//! normalized remote failures are [`ApiError`](crate::rest::ApiError) and are
//! wrapped by [`Error::Api`].

use reqwest::Method;
use thiserror::Error;

use crate::rest::ApiError;

/// Main error type for dispatcher operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local validation and configuration errors, raised before any network
    /// call is made
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Terminal remote failure, normalized from the response body
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The attempt cap was reached before the next send could execute
    #[error("max retry attempts reached: {method} {path} after {attempts} sends")]
    RetryExhausted {
        method: Method,
        path: String,
        attempts: u8,
    },

    /// Transport-level errors from the underlying HTTP client
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// JSON serialization errors while encoding a request
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors that never touched the network
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Configuration { .. } | Error::RetryExhausted { .. } | Error::Json { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Configuration {
            message: "Forbidden dataType".to_string(),
            source: None,
        };
        assert_eq!(err.to_string(), "Configuration error: Forbidden dataType");
    }

    #[test]
    fn test_retry_exhausted_display() {
        let err = Error::RetryExhausted {
            method: Method::POST,
            path: "/channels/1/messages".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "max retry attempts reached: POST /channels/1/messages after 3 sends"
        );
    }

    #[test]
    fn test_local_classification() {
        let local = Error::RetryExhausted {
            method: Method::GET,
            path: "/gateway".to_string(),
            attempts: 3,
        };
        assert!(local.is_local());

        let remote = Error::Http {
            message: "connection reset".to_string(),
            source: None,
        };
        assert!(!remote.is_local());
    }
}
