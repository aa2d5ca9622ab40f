//! Ambient per-request state.
//!
//! The request middleware opens a context for the lifetime of each request.
//! Anything instrumented inside that task (views, job enqueues, custom
//! blocks) picks up the request id, the resolved location, and any tags or
//! values a handler attached. Outside a request every accessor returns
//! `None` and every setter is a no-op.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::metric::{FieldValue, Fields, Tags};

tokio::task_local! {
    static CURRENT: Arc<Mutex<RequestContext>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub request_id: Option<String>,
    /// e.g. "MetricsController#index"
    pub location: Option<String>,
    /// Merged into the tags of every metric emitted within the request.
    pub tags: Tags,
    /// Merged into the fields of every metric emitted within the request.
    pub values: Fields,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..Self::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Runs `fut` with `ctx` as the current request context.
pub async fn scope<F: Future>(ctx: RequestContext, fut: F) -> F::Output {
    CURRENT.scope(Arc::new(Mutex::new(ctx)), fut).await
}

/// Copy of the current context, if inside a request.
pub fn snapshot() -> Option<RequestContext> {
    CURRENT.try_with(|c| c.lock().clone()).ok()
}

pub fn request_id() -> Option<String> {
    CURRENT
        .try_with(|c| c.lock().request_id.clone())
        .ok()
        .flatten()
}

/// Returns `false` when called outside a request.
pub fn set_location(location: impl Into<String>) -> bool {
    let location = location.into();
    update(|c| c.location = Some(location))
}

pub fn add_tag(key: impl Into<String>, value: impl Into<String>) -> bool {
    let (key, value) = (key.into(), value.into());
    update(|c| {
        c.tags.insert(key, value);
    })
}

pub fn add_value(key: impl Into<String>, value: impl Into<FieldValue>) -> bool {
    let (key, value) = (key.into(), value.into());
    update(|c| {
        c.values.insert(key, value);
    })
}

fn update(f: impl FnOnce(&mut RequestContext)) -> bool {
    CURRENT.try_with(|c| f(&mut c.lock())).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accessors_are_empty_outside_a_request() {
        assert!(snapshot().is_none());
        assert!(request_id().is_none());
        assert!(!set_location("Nowhere#index"));
        assert!(!add_tag("a", "b"));
    }

    #[tokio::test]
    async fn setters_update_the_scoped_context() {
        let ctx = RequestContext::new("req-1").with_location("GET /metrics");
        let seen = scope(ctx, async {
            assert!(set_location("MetricsController#index"));
            assert!(add_tag("additional_tag", "value"));
            assert!(add_value("additional_value", "value"));
            snapshot()
        })
        .await
        .expect("inside scope");

        assert_eq!(seen.request_id.as_deref(), Some("req-1"));
        assert_eq!(seen.location.as_deref(), Some("MetricsController#index"));
        assert_eq!(seen.tags.get("additional_tag").map(String::as_str), Some("value"));
        assert_eq!(
            seen.values.get("additional_value"),
            Some(&FieldValue::String("value".into()))
        );
        assert!(snapshot().is_none());
    }

    #[tokio::test]
    async fn spawned_tasks_do_not_inherit_the_context() {
        let inner = scope(RequestContext::new("req-2"), async {
            tokio::spawn(async { request_id() }).await.ok().flatten()
        })
        .await;
        assert!(inner.is_none());
    }
}
