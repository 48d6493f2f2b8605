//! Pure encoding helpers for the JSON strategy
//!
//! These functions never mutate caller-supplied payloads; they return new
//! values. Retries re-encode from the original data, so hidden aliasing
//! across attempts cannot occur.

use reqwest::Method;
use serde_json::Value;

/// Whether payload data travels as query parameters instead of a body.
///
/// GET requests always do; ban-list and prune endpoints do regardless of
/// verb, because the remote API expects their filters in the query string.
pub(crate) fn is_query_driven(method: &Method, endpoint: &str) -> bool {
    *method == Method::GET || endpoint.contains("/bans") || endpoint.contains("/prune")
}

/// Split an audit-log reason out of a JSON payload object.
///
/// Returns the payload without its `reason` field plus the percent-encoded
/// reason destined for the audit-log header. Payloads without a `reason`
/// (or that are not objects) come back unchanged.
pub(crate) fn split_audit_reason(payload: &Value) -> (Value, Option<String>) {
    let Some(map) = payload.as_object() else {
        return (payload.clone(), None);
    };
    if !map.contains_key("reason") {
        return (payload.clone(), None);
    }

    let mut remaining = map.clone();
    let reason = remaining.remove("reason");
    let encoded = reason.map(|value| {
        let text = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        urlencoding::encode(&text).into_owned()
    });
    (Value::Object(remaining), encoded)
}

/// Convert a JSON object into query pairs.
///
/// Strings are taken verbatim, other scalars render as their JSON text,
/// nulls are dropped. Non-object payloads produce no pairs.
pub(crate) fn to_query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Some(map) = payload.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}
