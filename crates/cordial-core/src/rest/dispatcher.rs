//! The request dispatcher
//!
//! Turns `(endpoint, method, data)` descriptors into outbound HTTP calls:
//! selects an encoding strategy, issues the request, classifies the outcome,
//! retries recoverable failures, emits lifecycle events, and resolves with a
//! decoded body or a normalized error.
//!
//! Every descriptor entering [`Dispatcher::dispatch`] terminates in exactly
//! one of: decoded body, no body (`None`), normalized remote error, or a
//! local retry-exhaustion error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};

use super::config::RestConfig;
use super::data::{DataKind, MultipartData, RequestData};
use super::encode::{is_query_driven, split_audit_reason, to_query_pairs};
use super::error::ApiError;
use super::events::{
    correlation_id, EventBus, RateLimited, RequestCompleted, RequestFailed, RequestIssued,
};

/// Total send attempts allowed per logical request
pub const MAX_ATTEMPTS: u8 = 3;

/// Default transport timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extended timeout for multipart uploads
const MULTIPART_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on an honored `Retry-After` delay; a misbehaving server
/// must not stall a dispatch indefinitely
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Header the remote API expects human-readable audit reasons in
const AUDIT_LOG_HEADER: &str = "X-Audit-Log-Reason";

/// Request dispatcher for a Discord-compatible REST API
///
/// One instance serves many concurrent dispatches; the default header set is
/// read-shared and cloned per request, never mutated in flight.
pub struct Dispatcher {
    http: Client,
    config: RestConfig,
    default_headers: HeaderMap,
    events: EventBus,
    last_latency_ms: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher for the configured remote host
    pub fn new(config: RestConfig) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(anyhow::anyhow!(e)),
            })?;
        let default_headers = build_default_headers(&config)?;
        Ok(Self {
            http,
            config,
            default_headers,
            events: EventBus::default(),
            last_latency_ms: AtomicU64::new(0),
        })
    }

    /// Latency of the most recent completed send, in milliseconds
    pub fn last_latency_ms(&self) -> u64 {
        self.last_latency_ms.load(Ordering::Relaxed)
    }

    /// Register a handler for request-issued events
    pub fn on_request(&self, handler: impl Fn(&RequestIssued) + Send + Sync + 'static) {
        self.events.on_request(handler);
    }

    /// Register a handler for request-completed events
    pub fn on_done(&self, handler: impl Fn(&RequestCompleted) + Send + Sync + 'static) {
        self.events.on_done(handler);
    }

    /// Register a handler for request-error events
    pub fn on_request_error(&self, handler: impl Fn(&RequestFailed) + Send + Sync + 'static) {
        self.events.on_request_error(handler);
    }

    /// Register a handler for rate-limit events
    pub fn on_rate_limit(&self, handler: impl Fn(&RateLimited) + Send + Sync + 'static) {
        self.events.on_rate_limit(handler);
    }

    /// String-kinded entry point used by endpoint method wrappers.
    ///
    /// A data kind outside `json`/`multipart` fails locally with
    /// `Forbidden dataType` before any network call; the failure still
    /// emits the request-issued and request-error events.
    pub async fn dispatch_raw(
        &self,
        endpoint: &str,
        method: Method,
        data_kind: &str,
        payload: Value,
    ) -> Result<Option<Value>> {
        let data = match data_kind.parse::<DataKind>() {
            Ok(DataKind::Json) => RequestData::json(payload),
            Ok(DataKind::Multipart) => RequestData::multipart(payload, Vec::new()),
            Err(err) => {
                let correlation = correlation_id();
                self.events.emit_request(&RequestIssued {
                    correlation_id: correlation.clone(),
                    endpoint: endpoint.to_owned(),
                    method: method.clone(),
                    data_kind: data_kind.to_owned(),
                    data: payload,
                });
                self.events.emit_request_error(&RequestFailed {
                    correlation_id: correlation,
                    endpoint: endpoint.to_owned(),
                    method,
                    message: err.to_string(),
                });
                return Err(err);
            }
        };
        self.dispatch(endpoint, method, data).await
    }

    /// Dispatch a request and resolve with its decoded body.
    ///
    /// Resolves `Ok(None)` when the success response carries no body or a
    /// body that is not JSON (soft success).
    pub async fn dispatch(
        &self,
        endpoint: &str,
        method: Method,
        data: RequestData,
    ) -> Result<Option<Value>> {
        let correlation = correlation_id();
        self.events.emit_request(&RequestIssued {
            correlation_id: correlation.clone(),
            endpoint: endpoint.to_owned(),
            method: method.clone(),
            data_kind: data.kind().to_string(),
            data: data.payload().clone(),
        });

        match self.run(&correlation, endpoint, &method, &data).await {
            Ok(body) => Ok(body),
            Err(err) => {
                self.events.emit_request_error(&RequestFailed {
                    correlation_id: correlation,
                    endpoint: endpoint.to_owned(),
                    method,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Dispatch loop.
    ///
    /// Invariant: `attempt` advances by exactly one per recoverable (429/502)
    /// outcome, and `send` refuses to touch the network once it reaches
    /// [`MAX_ATTEMPTS`].
    async fn run(
        &self,
        correlation: &str,
        endpoint: &str,
        method: &Method,
        data: &RequestData,
    ) -> Result<Option<Value>> {
        let mut attempt: u8 = 0;
        loop {
            let started = Instant::now();
            let response = self.send(endpoint, method, data, attempt).await?;
            let latency = started.elapsed();
            self.last_latency_ms.store(
                u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                Ordering::Relaxed,
            );

            let status = response.status();
            if status.is_success() {
                debug!(%method, endpoint, status = status.as_u16(), attempt, "request completed");
                self.events.emit_done(&RequestCompleted {
                    correlation_id: correlation.to_owned(),
                    status: status.as_u16(),
                    latency,
                });
                return Ok(decode_body(response).await);
            }

            if is_recoverable(status) {
                let delay = self.note_recoverable(correlation, endpoint, method, &response);
                attempt += 1;
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                continue;
            }

            let api_error = ApiError::from_response(endpoint, method, response).await;
            error!(
                %method,
                endpoint,
                status = api_error.status,
                code = api_error.code,
                "terminal API error"
            );
            return Err(Error::Api(api_error));
        }
    }

    /// Issue one network attempt.
    ///
    /// The attempt cap is enforced here, at the point of sending: once the
    /// cap is reached this fails locally instead of calling the network.
    async fn send(
        &self,
        endpoint: &str,
        method: &Method,
        data: &RequestData,
        attempt: u8,
    ) -> Result<Response> {
        if attempt >= MAX_ATTEMPTS {
            return Err(Error::RetryExhausted {
                method: method.clone(),
                path: endpoint.to_owned(),
                attempts: attempt,
            });
        }

        let url = self.config.request_url(endpoint)?;
        debug!(%method, endpoint, attempt, kind = %data.kind(), "sending request");

        let builder = match data {
            RequestData::Json(payload) => self.build_json(endpoint, method, url, payload),
            RequestData::Multipart(multipart) => self.build_multipart(method, url, multipart)?,
        };

        builder.send().await.map_err(|e| Error::Http {
            message: format!("request to {endpoint} failed: {e}"),
            source: Some(anyhow::anyhow!(e)),
        })
    }

    /// JSON encoding strategy: query parameters for query-driven requests,
    /// a JSON body otherwise. A bare numeric payload is coerced to its
    /// decimal string and sent as the raw body.
    fn build_json(
        &self,
        endpoint: &str,
        method: &Method,
        url: Url,
        payload: &Value,
    ) -> RequestBuilder {
        let (payload, reason) = split_audit_reason(payload);

        let mut headers = self.default_headers.clone();
        if let Some(reason) = reason {
            if let Ok(value) = HeaderValue::from_str(&reason) {
                headers.insert(AUDIT_LOG_HEADER, value);
            }
        }

        let mut builder = self.http.request(method.clone(), url).headers(headers);
        if is_query_driven(method, endpoint) {
            let pairs = to_query_pairs(&payload);
            if !pairs.is_empty() {
                builder = builder.query(&pairs);
            }
        } else if let Value::Number(n) = &payload {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(n.to_string());
        } else if !payload.is_null() {
            builder = builder.json(&payload);
        }
        builder
    }

    /// Multipart encoding strategy: files as positionally-indexed parts, the
    /// remaining payload serialized into a `payload_json` part. Sent with an
    /// extended timeout and a fresh copy of the default headers.
    fn build_multipart(
        &self,
        method: &Method,
        url: Url,
        data: &MultipartData,
    ) -> Result<RequestBuilder> {
        let mut form = Form::new();
        for (index, file) in data.files.iter().enumerate() {
            let part = Part::bytes(file.data.clone()).file_name(file.name.clone());
            form = form.part(format!("files[{index}]"), part);
        }
        form = form.text("payload_json", serde_json::to_string(&data.payload)?);

        Ok(self
            .http
            .request(method.clone(), url)
            .headers(self.default_headers.clone())
            .multipart(form)
            .timeout(MULTIPART_TIMEOUT))
    }

    /// Log a recoverable outcome and, for 429, emit the rate-limit event.
    /// Returns the clamped server-supplied delay to honor before the next
    /// attempt; the event carries the raw header value.
    fn note_recoverable(
        &self,
        correlation: &str,
        endpoint: &str,
        method: &Method,
        response: &Response,
    ) -> Option<Duration> {
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            warn!(%method, endpoint, status = response.status().as_u16(), "upstream unavailable, retrying");
            return None;
        }

        let timeout = header_u64(response, "Retry-After").map(Duration::from_secs);
        let limit = header_u64(response, "X-RateLimit-Limit");
        warn!(%method, endpoint, ?timeout, "rate limited, retrying");
        self.events.emit_rate_limit(&RateLimited {
            correlation_id: correlation.to_owned(),
            timeout,
            limit,
            method: method.clone(),
            path: endpoint.to_owned(),
            route: self.config.route(endpoint),
        });
        timeout.map(clamp_retry_delay)
    }
}

/// Honored rate-limit delays are bounded by [`MAX_RETRY_DELAY`]
fn clamp_retry_delay(delay: Duration) -> Duration {
    delay.min(MAX_RETRY_DELAY)
}

/// Statuses treated as transient and auto-retried, regardless of data kind
fn is_recoverable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::BAD_GATEWAY
}

/// Decode a success body. Empty or non-JSON bodies resolve to `None`
/// rather than propagating a parse error.
async fn decode_body(response: Response) -> Option<Value> {
    let text = response.text().await.ok()?;
    if text.is_empty() {
        return None;
    }
    serde_json::from_str(&text).ok()
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response.headers().get(name)?.to_str().ok()?.parse().ok()
}

fn build_default_headers(config: &RestConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let user_agent =
        HeaderValue::from_str(&config.user_agent).map_err(|e| Error::Configuration {
            message: format!("invalid user agent: {}", config.user_agent),
            source: Some(anyhow::anyhow!(e)),
        })?;
    headers.insert(USER_AGENT, user_agent);

    if let Some(token) = &config.token {
        let mut value =
            HeaderValue::from_str(&format!("Bot {token}")).map_err(|e| Error::Configuration {
                message: "token is not a valid header value".to_string(),
                source: Some(anyhow::anyhow!(e)),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}
