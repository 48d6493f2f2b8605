//! Cordial core - REST request dispatcher for Discord-compatible chat APIs
//!
//! This crate turns abstract "call this endpoint with this method and
//! payload" requests into outbound HTTP calls, centralizing the
//! cross-cutting concerns: transient-failure retry, error normalization,
//! multipart vs. JSON encoding, and lifecycle events.
//!
//! Per-resource method wrappers stay declarative; they format a path and
//! forward to [`Dispatcher::dispatch`]. All control flow lives here.
//!
//! # Example
//!
//! ```no_run
//! use cordial_core::{Dispatcher, Method, RequestData, RestConfig};
//! use serde_json::json;
//!
//! # async fn example() -> cordial_core::Result<()> {
//! let dispatcher = Dispatcher::new(
//!     RestConfig::new("https://discord.com").with_token("my-token"),
//! )?;
//!
//! let message = dispatcher
//!     .dispatch(
//!         "/channels/1/messages",
//!         Method::POST,
//!         RequestData::json(json!({"content": "hi"})),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod rest;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use rest::{
    ApiError, AttachedFile, DataKind, Dispatcher, Method, MultipartData, RateLimited,
    RequestCompleted, RequestData, RequestFailed, RequestIssued, RestConfig, StatusCode,
    MAX_ATTEMPTS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_error_creation() {
        let err = Error::Configuration {
            message: "Test error".to_string(),
            source: None,
        };
        assert!(err.to_string().contains("Test error"));
    }
}
