//! Lifecycle events and the per-instance observer registry
//!
//! Events are ephemeral value objects emitted at well-defined points of a
//! dispatch. Callers register typed handlers per event kind on the
//! dispatcher instance; there is no global channel and no metrics sink.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

/// Emitted when a request descriptor enters the dispatch loop
#[derive(Debug, Clone)]
pub struct RequestIssued {
    pub correlation_id: String,
    pub endpoint: String,
    pub method: Method,
    /// Declared data kind as given by the caller; carries the raw string so
    /// rejected kinds are observable too
    pub data_kind: String,
    /// Structured payload, without file bytes
    pub data: Value,
}

/// Emitted once a send returns a success status, before body decoding
#[derive(Debug, Clone)]
pub struct RequestCompleted {
    pub correlation_id: String,
    pub status: u16,
    pub latency: Duration,
}

/// Emitted when any error reaches the top of the dispatch loop
#[derive(Debug, Clone)]
pub struct RequestFailed {
    pub correlation_id: String,
    pub endpoint: String,
    pub method: Method,
    pub message: String,
}

/// Emitted on every 429 before the retry is scheduled
#[derive(Debug, Clone)]
pub struct RateLimited {
    pub correlation_id: String,
    /// Server-supplied `Retry-After`, when present
    pub timeout: Option<Duration>,
    /// `X-RateLimit-Limit` header value, when present
    pub limit: Option<u64>,
    pub method: Method,
    pub path: String,
    /// Base path + endpoint, as sent on the wire
    pub route: String,
}

type Handlers<E> = Mutex<Vec<Arc<dyn Fn(&E) + Send + Sync>>>;

/// One handler list per event kind, owned by a dispatcher instance
#[derive(Default)]
pub(crate) struct EventBus {
    request: Handlers<RequestIssued>,
    done: Handlers<RequestCompleted>,
    request_error: Handlers<RequestFailed>,
    rate_limit: Handlers<RateLimited>,
}

impl EventBus {
    pub fn on_request(&self, handler: impl Fn(&RequestIssued) + Send + Sync + 'static) {
        subscribe(&self.request, handler);
    }

    pub fn on_done(&self, handler: impl Fn(&RequestCompleted) + Send + Sync + 'static) {
        subscribe(&self.done, handler);
    }

    pub fn on_request_error(&self, handler: impl Fn(&RequestFailed) + Send + Sync + 'static) {
        subscribe(&self.request_error, handler);
    }

    pub fn on_rate_limit(&self, handler: impl Fn(&RateLimited) + Send + Sync + 'static) {
        subscribe(&self.rate_limit, handler);
    }

    pub fn emit_request(&self, event: &RequestIssued) {
        emit(&self.request, event);
    }

    pub fn emit_done(&self, event: &RequestCompleted) {
        emit(&self.done, event);
    }

    pub fn emit_request_error(&self, event: &RequestFailed) {
        emit(&self.request_error, event);
    }

    pub fn emit_rate_limit(&self, event: &RateLimited) {
        emit(&self.rate_limit, event);
    }
}

fn subscribe<E>(handlers: &Handlers<E>, handler: impl Fn(&E) + Send + Sync + 'static) {
    lock(handlers).push(Arc::new(handler));
}

// Handlers run on a snapshot taken outside the lock, so a handler may
// subscribe further handlers on the same bus without deadlocking.
fn emit<E>(handlers: &Handlers<E>, event: &E) {
    let snapshot = lock(handlers).clone();
    for handler in snapshot {
        handler(event);
    }
}

fn lock<E>(handlers: &Handlers<E>) -> MutexGuard<'_, Vec<Arc<dyn Fn(&E) + Send + Sync>>> {
    handlers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Random per-call token associating emitted events with one logical request
pub(crate) fn correlation_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn issued(correlation_id: &str) -> RequestIssued {
        RequestIssued {
            correlation_id: correlation_id.to_string(),
            endpoint: "/gateway".to_string(),
            method: Method::GET,
            data_kind: "json".to_string(),
            data: json!({}),
        }
    }

    #[test]
    fn test_handlers_fire_per_kind() {
        let bus = EventBus::default();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        bus.on_request(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit_request(&issued("abc"));
        bus.emit_request(&issued("def"));
        // other kinds do not cross over
        bus.emit_done(&RequestCompleted {
            correlation_id: "abc".to_string(),
            status: 200,
            latency: Duration::from_millis(1),
        });

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_multiple_subscribers() {
        let bus = EventBus::default();
        let seen = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = seen.clone();
            bus.on_request(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.emit_request(&issued("abc"));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_handler_may_subscribe_during_emit() {
        let bus = Arc::new(EventBus::default());
        let seen = Arc::new(AtomicUsize::new(0));

        let inner_bus = bus.clone();
        let counter = seen.clone();
        bus.on_request(move |_| {
            let counter = counter.clone();
            inner_bus.on_request(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        // must not deadlock; the newly added handler fires on the next emit
        bus.emit_request(&issued("abc"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        bus.emit_request(&issued("def"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_correlation_ids_are_distinct() {
        let a = correlation_id();
        let b = correlation_id();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
