use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{Configuration, WritePrecision};
use crate::context::RequestContext;
use crate::event::Event;
use crate::hooks::{self, HookDescriptor, LocationStrategy, UNKNOWN_LOCATION};
use crate::metric::{FieldValue, Fields, Metric, Tags};

/// Turns raw events into finished [`Metric`]s: built-in tags and fields,
/// request context extras, static tags, timestamp, then the configured
/// tags middleware.
pub struct MetricBuilder {
    config: Arc<Configuration>,
    server: String,
}

impl MetricBuilder {
    pub fn new(config: Arc<Configuration>) -> Self {
        Self::with_server(config, hostname())
    }

    /// Same as [`new`](Self::new) with an explicit `server` tag value.
    pub fn with_server(config: Arc<Configuration>, server: impl Into<String>) -> Self {
        Self {
            config,
            server: server.into(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Returns `None` for events nobody instruments, and for metrics whose
    /// tags lost `location` or `hook` in the tags middleware.
    pub fn build(&self, event: &Event, context: Option<&RequestContext>) -> Option<Metric> {
        let descriptor = hooks::lookup(&event.name)?;

        // ── Tags ────────────────────────────────────────────────
        let mut tags = Tags::new();
        (descriptor.tags)(event, &mut tags);
        if let Some(ctx) = context {
            for (k, v) in &ctx.tags {
                tags.insert(k.clone(), v.clone());
            }
        }
        tags.insert("location".into(), resolve_location(descriptor, event, context));
        tags.insert("hook".into(), descriptor.hook.into());
        tags.insert("server".into(), self.server.clone());
        if let Some(app) = self.config.app_name() {
            tags.insert("app_name".into(), app.to_owned());
        }

        // ── Fields ──────────────────────────────────────────────
        let mut fields = Fields::new();
        (descriptor.fields)(event, &mut fields);
        if let Some(ctx) = context {
            for (k, v) in &ctx.values {
                fields.insert(k.clone(), v.clone());
            }
            if let Some(id) = &ctx.request_id {
                fields.insert("request_id".into(), FieldValue::String(id.clone()));
            }
        }

        // ── Middleware ──────────────────────────────────────────
        let tags = (self.config.tags_middleware)(tags);
        if !tags.contains_key("location") || !tags.contains_key("hook") {
            debug!(event = %event.name, "tags middleware removed location/hook, dropping metric");
            return None;
        }

        Some(Metric {
            name: self.config.measurement_name.clone(),
            tags,
            fields,
            timestamp: epoch(event.finish, self.config.client.precision),
        })
    }
}

fn resolve_location(
    descriptor: &HookDescriptor,
    event: &Event,
    context: Option<&RequestContext>,
) -> String {
    let request = context.and_then(|c| c.location.clone());
    let payload = |key: &str| event.str(key).map(str::to_owned);
    let location = match descriptor.location {
        LocationStrategy::Request => request,
        LocationStrategy::Job => request.or_else(|| payload("job")),
        LocationStrategy::Template => request.or_else(|| payload("identifier")),
        LocationStrategy::Name => payload("name").or(request),
    };
    location.unwrap_or_else(|| UNKNOWN_LOCATION.into())
}

/// `time` as an integer count of `precision` units since the Unix epoch.
pub fn epoch(time: DateTime<Utc>, precision: WritePrecision) -> i64 {
    match precision {
        WritePrecision::Second => time.timestamp(),
        WritePrecision::Millisecond => time.timestamp_millis(),
        WritePrecision::Microsecond => time.timestamp_micros(),
        WritePrecision::Nanosecond => time
            .timestamp_nanos_opt()
            .unwrap_or_else(|| time.timestamp_micros().saturating_mul(1_000)),
    }
}

/// Host name for the `server` tag.
pub fn hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".into())
}
