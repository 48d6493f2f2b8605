//! Request payload shapes
//!
//! Payloads have no fixed type per endpoint; they are dynamic JSON values
//! tagged by the encoding they travel with. The tag decides the strategy in
//! the dispatcher: plain JSON (query or body) versus a multipart form with
//! attached files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Encoding declared by the caller for a request payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Json,
    Multipart,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Json => write!(f, "json"),
            DataKind::Multipart => write!(f, "multipart"),
        }
    }
}

impl FromStr for DataKind {
    type Err = Error;

    /// Anything outside `json`/`multipart` is a local validation failure;
    /// no network call is made for it.
    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "json" => Ok(DataKind::Json),
            "multipart" => Ok(DataKind::Multipart),
            _ => Err(Error::Configuration {
                message: "Forbidden dataType".to_string(),
                source: None,
            }),
        }
    }
}

/// A binary file attached to a multipart request
#[derive(Debug, Clone)]
pub struct AttachedFile {
    /// Filename reported to the remote service
    pub name: String,
    /// Raw file bytes
    pub data: Vec<u8>,
}

impl AttachedFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Payload for the multipart encoding strategy
///
/// Files are kept out of the JSON payload entirely, so the `payload_json`
/// sidecar never re-serializes file bytes.
#[derive(Debug, Clone)]
pub struct MultipartData {
    /// Structured fields accompanying the upload
    pub payload: Value,
    /// Ordered files, appended as `files[0]`, `files[1]`, ...
    pub files: Vec<AttachedFile>,
}

/// Tagged request payload consumed by the dispatcher
#[derive(Debug, Clone)]
pub enum RequestData {
    /// JSON payload, sent as query parameters or a request body (§ JSON
    /// strategy). A bare numeric value is coerced to its decimal string and
    /// sent as the raw body; this is a documented rule, not an accident.
    Json(Value),
    /// Multipart form with attached files and a `payload_json` sidecar
    Multipart(MultipartData),
}

impl RequestData {
    /// Plain JSON payload with no files
    pub fn json(payload: Value) -> Self {
        RequestData::Json(payload)
    }

    /// Multipart payload with attached files
    pub fn multipart(payload: Value, files: Vec<AttachedFile>) -> Self {
        RequestData::Multipart(MultipartData { payload, files })
    }

    pub fn kind(&self) -> DataKind {
        match self {
            RequestData::Json(_) => DataKind::Json,
            RequestData::Multipart(_) => DataKind::Multipart,
        }
    }

    /// The structured payload, without any file bytes
    pub fn payload(&self) -> &Value {
        match self {
            RequestData::Json(payload) => payload,
            RequestData::Multipart(data) => &data.payload,
        }
    }
}
