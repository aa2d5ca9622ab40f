//! Event dispatch.
//!
//! [`Instrumenter`] times futures and publishes the resulting [`Event`]s to
//! its [`Subscriber`]s in registration order, inside the instrumented task.
//! [`MetricSubscriber`] is the subscriber that filters, builds and writes
//! metrics.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::builder::MetricBuilder;
use crate::config::Configuration;
use crate::context;
use crate::event::{self, Event, Payload};
use crate::filter::Filter;
use crate::hooks;
use crate::metric::{Fields, Tags};
use crate::writer::MetricWriter;

// ─── Subscriber ──────────────────────────────────────────────────

#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle(&self, event: &Event);
}

/// Filter → build → tags middleware → write, for every instrumented event.
pub struct MetricSubscriber {
    config: Arc<Configuration>,
    builder: MetricBuilder,
    writer: Arc<MetricWriter>,
}

impl MetricSubscriber {
    pub fn new(config: Arc<Configuration>, writer: Arc<MetricWriter>) -> Self {
        let builder = MetricBuilder::new(config.clone());
        Self::with_builder(config, builder, writer)
    }

    pub fn with_builder(
        config: Arc<Configuration>,
        builder: MetricBuilder,
        writer: Arc<MetricWriter>,
    ) -> Self {
        Self {
            config,
            builder,
            writer,
        }
    }

    pub fn writer(&self) -> &Arc<MetricWriter> {
        &self.writer
    }
}

#[async_trait]
impl Subscriber for MetricSubscriber {
    async fn handle(&self, event: &Event) {
        if hooks::lookup(&event.name).is_none() {
            return;
        }
        if !Filter::new(&self.config).keep_event(&event.name) {
            debug!(event = %event.name, env = %self.config.environment, "event filtered");
            return;
        }

        let ctx = context::snapshot();
        if let Some(metric) = self.builder.build(event, ctx.as_ref()) {
            self.writer.write(metric).await;
        }
    }
}

// ─── Clock ───────────────────────────────────────────────────────

/// Source of event start/finish times.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Frozen clock that only moves when told to.
pub struct FixedClock {
    at: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.at.lock() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut at = self.at.lock();
        *at += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.lock()
    }
}

// ─── Instrumenter ────────────────────────────────────────────────

/// Cheaply cloneable event publisher.
#[derive(Clone)]
pub struct Instrumenter {
    subscribers: Arc<Vec<Arc<dyn Subscriber>>>,
    clock: Arc<dyn Clock>,
}

impl Default for Instrumenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Instrumenter {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Vec::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn subscribe(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        Arc::make_mut(&mut self.subscribers).push(subscriber);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn publish(&self, event: Event) {
        for sub in self.subscribers.iter() {
            sub.handle(&event).await;
        }
    }

    /// Runs `fut`, then publishes `name` spanning its execution.
    pub async fn instrument<F, T>(&self, name: &str, payload: Payload, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        self.instrument_with(name, payload, fut, |_, _| {}).await
    }

    /// Like [`instrument`](Self::instrument), letting `annotate` add
    /// outcome-dependent keys (status codes, exceptions) to the payload.
    pub async fn instrument_with<F, T, A>(
        &self,
        name: &str,
        mut payload: Payload,
        fut: F,
        annotate: A,
    ) -> T
    where
        F: Future<Output = T>,
        A: FnOnce(&T, &mut Payload),
    {
        let start = self.clock.now();
        let out = fut.await;
        let finish = self.clock.now();
        annotate(&out, &mut payload);
        self.publish(Event::new(name, start, finish, payload)).await;
        out
    }

    /// Times an arbitrary block under the `block_instrumentation` hook.
    pub async fn measure<F, T>(&self, name: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        self.measure_with(name, Tags::new(), Fields::new(), fut).await
    }

    /// [`measure`](Self::measure) with extra tags and values.
    pub async fn measure_with<F, T>(&self, name: &str, tags: Tags, values: Fields, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut payload = Payload::new();
        payload.insert("name".into(), Value::String(name.to_owned()));
        if let Ok(tags) = serde_json::to_value(&tags) {
            payload.insert("tags".into(), tags);
        }
        if let Ok(values) = serde_json::to_value(&values) {
            payload.insert("values".into(), values);
        }
        self.instrument(event::BLOCK_INSTRUMENTATION, payload, fut).await
    }
}
