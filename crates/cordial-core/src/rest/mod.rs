//! REST dispatch for Discord-compatible APIs
//!
//! This module provides the request dispatcher with:
//! - Encoding strategy selection (JSON query/body vs. multipart)
//! - Transient-failure retry bounded by an attempt cap
//! - Error classification and normalization
//! - Lifecycle events observable per dispatcher instance

pub mod config;
pub mod data;
pub mod dispatcher;
pub mod encode;
pub mod error;
pub mod events;

pub use config::{RestConfig, DEFAULT_BASE_PATH};
pub use data::{AttachedFile, DataKind, MultipartData, RequestData};
pub use dispatcher::{Dispatcher, MAX_ATTEMPTS};
pub use error::{flatten_error_tree, ApiError};
pub use events::{RateLimited, RequestCompleted, RequestFailed, RequestIssued};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
