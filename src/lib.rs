//! Automatic InfluxDB metrics for axum applications.
//!
//! Request timing, background job lifecycle, view rendering and any other
//! instrumented block are turned into timestamped points and handed to a
//! time-series client:
//!
//! ```text
//! event ─▶ Subscriber ─▶ Filter ─▶ MetricBuilder ─▶ tags middleware ─▶ MetricWriter ─▶ client
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod filter;
pub mod hooks;
pub mod jobs;
pub mod metric;
pub mod middleware;
pub mod subscriber;
pub mod views;
pub mod writer;

pub use builder::MetricBuilder;
pub use client::{HttpClient, InMemoryClient, Point, TimeSeriesClient};
pub use config::{
    configure, current, ClientConfig, Configuration, TagsMiddleware, WriteOptions,
    WritePrecision, WriteType,
};
pub use error::{Error, Result};
pub use event::{Event, Payload};
pub use filter::Filter;
pub use metric::{FieldValue, Fields, Metric, Tags};
pub use subscriber::{Clock, FixedClock, Instrumenter, MetricSubscriber, Subscriber, SystemClock};
pub use writer::MetricWriter;

#[doc(hidden)]
pub mod __private {
    pub use serde_json::json;
}

/// Builds the standard pipeline from a configuration: an HTTP client
/// pointed at the configured InfluxDB, a writer honouring the configured
/// write mode, and an instrumenter with a single [`MetricSubscriber`].
///
/// Must be called from within a tokio runtime when batching is enabled.
pub fn init(config: std::sync::Arc<Configuration>) -> Result<Instrumenter> {
    let client = HttpClient::new(&config.client)?;
    Ok(with_client(config, std::sync::Arc::new(client)))
}

/// Same as [`init`] but with a caller-supplied client.
pub fn with_client(
    config: std::sync::Arc<Configuration>,
    client: std::sync::Arc<dyn TimeSeriesClient>,
) -> Instrumenter {
    let writer = MetricWriter::new(
        client,
        config.client.write_options(),
        config.client.precision,
    );
    let subscriber = MetricSubscriber::new(config, std::sync::Arc::new(writer));
    Instrumenter::new().subscribe(std::sync::Arc::new(subscriber))
}
