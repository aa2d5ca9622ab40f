pub mod jobs;
pub mod metrics;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use influxdb_axum::context;

// ─── Demo error type ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    /// The worker has shut down and no longer accepts jobs.
    #[error("job queue for {job} is closed")]
    QueueClosed { job: &'static str },
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::QueueClosed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// JSON error body carrying the request id, so a failed call can be matched
/// to its `process_action` point.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error":      self.to_string(),
            "request_id": context::request_id(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use influxdb_axum::context::RequestContext;

    #[tokio::test]
    async fn closed_queue_is_service_unavailable_with_request_id() {
        let ctx = RequestContext::new("req-7");
        let res = context::scope(ctx, async {
            AppError::QueueClosed { job: "MetricJob" }.into_response()
        })
        .await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "job queue for MetricJob is closed");
        assert_eq!(body["request_id"], "req-7");
    }
}
