use axum::{
    extract::{MatchedPath, Request, State},
    http::header::CONTENT_TYPE,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

use crate::context::{self, RequestContext};
use crate::event::{self, Payload};
use crate::subscriber::Instrumenter;

/// Header carrying the request id, as set by tower-http's `SetRequestIdLayer`.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// axum middleware (use with `from_fn_with_state`) that:
///
///   - opens the request context with the request id and a default
///     location of `"{METHOD} {matched path}"`
///   - runs the handler inside it
///   - publishes `process_action` with method, path, status and format
///
/// Handlers may override the location with [`context::set_location`].
pub async fn instrument_requests(
    State(instrumenter): State<Instrumenter>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let ctx = RequestContext::new(request_id).with_location(format!("{method} {path}"));

    let mut payload = Payload::new();
    payload.insert("method".into(), Value::String(method.to_string()));
    payload.insert("path".into(), Value::String(path.clone()));

    let start = Instant::now();
    let response = context::scope(
        ctx,
        instrumenter.instrument_with(event::PROCESS_ACTION, payload, next.run(req), annotate),
    )
    .await;

    debug!(
        status = response.status().as_u16(),
        %method,
        %path,
        us = start.elapsed().as_micros() as u64,
        "request instrumented"
    );

    response
}

fn annotate(response: &Response, payload: &mut Payload) {
    payload.insert("status".into(), Value::from(response.status().as_u16()));
    if let Some(format) = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        payload.insert("format".into(), Value::String(format.to_owned()));
    }
}
