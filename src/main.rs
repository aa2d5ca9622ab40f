use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use influxdb_axum::{
    Configuration, HttpClient, Instrumenter, MetricSubscriber, MetricWriter,
};

mod handlers;
mod server;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Publishes instrumentation events to the metrics pipeline.
    pub instrumenter: Instrumenter,

    /// Queue feeding the background job worker.
    pub jobs: mpsc::Sender<handlers::jobs::MetricJob>,
}

/// Depth of the in-process job queue.
const JOB_QUEUE_DEPTH: usize = 256;

#[tokio::main]
async fn main() {
    // ── 1. Logging ───────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // ── 2. Instrumentation pipeline ──────────────────────────────
    let config = Arc::new(Configuration::from_env());
    tracing::info!(
        url = %config.client.url,
        env = %config.environment,
        write_type = ?config.client.write_type(),
        "metrics pipeline starting"
    );

    let client = HttpClient::new(&config.client).expect("invalid InfluxDB client settings");
    let writer = Arc::new(MetricWriter::new(
        Arc::new(client),
        config.client.write_options(),
        config.client.precision,
    ));
    let instrumenter = Instrumenter::new()
        .subscribe(Arc::new(MetricSubscriber::new(config.clone(), writer.clone())));

    // ── 3. Background jobs ───────────────────────────────────────
    let (jobs_tx, jobs_rx) = mpsc::channel(JOB_QUEUE_DEPTH);
    let worker = handlers::jobs::spawn_worker(instrumenter.clone(), jobs_rx);

    // ── 4. Build Axum router ─────────────────────────────────────
    let state = Arc::new(AppState {
        instrumenter,
        jobs: jobs_tx,
    });
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener (is the port already in use?)");

    tracing::info!(%addr, "listening; try GET /metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("Server exited with error");

    // ── 6. Drain jobs and flush queued points ────────────────────
    let _ = tokio::time::timeout(Duration::from_secs(5), worker).await;
    writer.close().await;
}
