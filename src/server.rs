use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use influxdb_axum::middleware::instrument_requests;

use crate::handlers;
use crate::AppState;

/// Builds the demo `Router`: routes, request instrumentation, request ids.
pub fn create_router(state: Arc<AppState>) -> Router {
    let instrumenter = state.instrumenter.clone();

    Router::new()
        // ── Instrumented pages ──────────────────────────────────
        .route("/metrics", get(handlers::metrics::index))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(instrumenter, instrument_requests))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}
