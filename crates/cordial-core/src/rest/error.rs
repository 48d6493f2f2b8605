//! Remote error normalization
//!
//! Non-success, non-recoverable responses are normalized into [`ApiError`]:
//! remote code, HTTP status, path, method, and a human-readable message
//! built by flattening the body's nested validation-error tree.

use std::fmt;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response};
use serde_json::Value;

/// Normalized terminal failure returned by the remote service
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Endpoint path of the failed request
    pub path: String,
    /// HTTP method of the failed request
    pub method: Method,
    /// Remote error code from the body, 0 when absent
    pub code: i64,
    /// HTTP status of the response
    pub status: u16,
    /// Flattened human-readable message
    pub message: String,
}

impl ApiError {
    /// Build from a non-success response, consuming its body.
    ///
    /// JSON bodies are flattened into `field: reason` lines; anything else
    /// is carried verbatim as the message.
    pub(crate) async fn from_response(path: &str, method: &Method, response: Response) -> Self {
        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let body = response.text().await.unwrap_or_default();

        if is_json {
            if let Ok(tree) = serde_json::from_str::<Value>(&body) {
                return Self {
                    path: path.to_owned(),
                    method: method.clone(),
                    code: tree.get("code").and_then(Value::as_i64).unwrap_or(0),
                    status,
                    message: flatten_error_tree(&tree),
                };
            }
        }

        Self {
            path: path.to_owned(),
            method: method.clone(),
            code: 0,
            status,
            message: body,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} returned {} (code {}): {}",
            self.method, self.path, self.status, self.code, self.message
        )
    }
}

impl std::error::Error for ApiError {}

/// Flatten a structured validation-error body into a single message.
///
/// Walks the `errors` subtree (or the whole body when absent) and joins the
/// resulting `field: reason` lines with newlines, appended to the body's
/// top-level `message`.
pub fn flatten_error_tree(tree: &Value) -> String {
    let mut lines = Vec::new();
    flatten_into(tree.get("errors").unwrap_or(tree), "", &mut lines);

    let top = tree.get("message").and_then(Value::as_str);
    match (top, lines.is_empty()) {
        (Some(message), true) => message.to_owned(),
        (Some(message), false) => format!("{message}\n{}", lines.join("\n")),
        (None, _) => lines.join("\n"),
    }
}

fn flatten_into(value: &Value, path: &str, lines: &mut Vec<String>) {
    let Some(map) = value.as_object() else {
        return;
    };
    for (key, child) in map {
        if key == "message" {
            continue;
        }
        // numeric keys render as parent[index], others as parent.key
        let child_path = if path.is_empty() {
            key.clone()
        } else if key.bytes().all(|b| b.is_ascii_digit()) {
            format!("{path}[{key}]")
        } else {
            format!("{path}.{key}")
        };

        if let Some(errors) = child.get("_errors").and_then(Value::as_array) {
            let joined = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(format!("{child_path}: {joined}"));
        } else if child.get("code").is_some() || child.get("message").is_some() {
            let code = child
                .get("code")
                .filter(|c| !c.is_null())
                .map(render_scalar);
            let message = child
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned);
            let rendered: Vec<String> = [code, message].into_iter().flatten().collect();
            lines.push(rendered.join(": "));
        } else if let Some(text) = child.as_str() {
            lines.push(text.to_owned());
        } else {
            flatten_into(child, &child_path, lines);
        }
    }
}

/// Strings verbatim, any other scalar as its JSON text
fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
