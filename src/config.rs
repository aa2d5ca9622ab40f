//! Instrumentation settings.
//!
//! A [`Configuration`] is built once at startup and shared as an
//! `Arc<Configuration>`. A process-wide copy lives behind [`configure`] /
//! [`current`] for applications that prefer a single global.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::metric::Tags;

// ─── Defaults ────────────────────────────────────────────────────

const DEFAULT_URL: &str = "http://localhost:8086";
const DEFAULT_MEASUREMENT: &str = "axum";
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_IGNORED_ENVIRONMENTS: &[&str] = &["test"];

const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 10_000;
const DEFAULT_BATCH_SIZE: usize = 1_000;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1_000);
const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;

// ─── Public types ────────────────────────────────────────────────

/// User-supplied hook that rewrites the tag set of every metric right
/// before it is written. Its output wins on key collisions.
pub type TagsMiddleware = Arc<dyn Fn(Tags) -> Tags + Send + Sync>;

/// Unit of the timestamp attached to each point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WritePrecision {
    #[serde(rename = "s")]
    Second,
    #[default]
    #[serde(rename = "ms")]
    Millisecond,
    #[serde(rename = "us")]
    Microsecond,
    #[serde(rename = "ns")]
    Nanosecond,
}

impl WritePrecision {
    /// Value of the `precision` query parameter of the write API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Second => "s",
            Self::Millisecond => "ms",
            Self::Microsecond => "us",
            Self::Nanosecond => "ns",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "second" | "seconds" => Some(Self::Second),
            "ms" | "millisecond" | "milliseconds" => Some(Self::Millisecond),
            "us" | "microsecond" | "microseconds" => Some(Self::Microsecond),
            "ns" | "nanosecond" | "nanoseconds" => Some(Self::Nanosecond),
            _ => None,
        }
    }
}

/// How points travel from the writer to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WriteType {
    /// One client call per metric, awaited by the caller.
    Synchronous,
    /// Points are queued and flushed in groups by a background task.
    Batching,
}

/// Options handed to the writer, derived from [`ClientConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub write_type: WriteType,
    pub max_retries: u32,
    pub max_retry_delay_ms: u64,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_queue_size: usize,
}

/// Connection and delivery settings for the time-series client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub token: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
    pub retries: u32,
    pub open_timeout: Duration,
    pub write_timeout: Duration,
    pub read_timeout: Duration,
    pub max_retry_delay_ms: u64,
    pub precision: WritePrecision,
    /// `true` selects [`WriteType::Batching`].
    pub async_writes: bool,
    pub batch_size: usize,
    pub flush_interval: Duration,
    /// Points the batching queue holds before new ones are dropped.
    pub max_queue_size: usize,
}

/// Everything the instrumentation pipeline reads at runtime.
#[derive(Clone)]
pub struct Configuration {
    /// Full event names (e.g. `render_partial.view`) that are never written.
    pub ignored_hooks: HashSet<String>,
    pub ignored_environments: HashSet<String>,
    pub environment: String,
    /// Value of the `app_name` tag. Omitted when `None`.
    pub application_name: Option<String>,
    pub measurement_name: String,
    pub instrumentation_enabled: bool,
    pub tags_middleware: TagsMiddleware,
    pub client: ClientConfig,
}

// ─── ClientConfig impl ───────────────────────────────────────────

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            token: None,
            org: None,
            bucket: None,
            retries: 0,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            precision: WritePrecision::default(),
            async_writes: true,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn write_type(&self) -> WriteType {
        if self.async_writes {
            WriteType::Batching
        } else {
            WriteType::Synchronous
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            write_type: self.write_type(),
            max_retries: self.retries,
            max_retry_delay_ms: self.max_retry_delay_ms,
            batch_size: self.batch_size.max(1),
            flush_interval: self.flush_interval,
            max_queue_size: self.max_queue_size.max(1),
        }
    }
}

// ─── Configuration impl ──────────────────────────────────────────

impl Default for Configuration {
    fn default() -> Self {
        Self {
            ignored_hooks: HashSet::new(),
            ignored_environments: DEFAULT_IGNORED_ENVIRONMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            environment: DEFAULT_ENVIRONMENT.into(),
            application_name: None,
            measurement_name: DEFAULT_MEASUREMENT.into(),
            instrumentation_enabled: true,
            tags_middleware: identity_middleware(),
            client: ClientConfig::default(),
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("ignored_hooks", &self.ignored_hooks)
            .field("ignored_environments", &self.ignored_environments)
            .field("environment", &self.environment)
            .field("application_name", &self.application_name)
            .field("measurement_name", &self.measurement_name)
            .field("instrumentation_enabled", &self.instrumentation_enabled)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Configuration {
    /// Defaults overlaid with environment variables.
    ///
    /// - `APP_ENV`: environment name
    /// - `INFLUXDB_URL`, `INFLUXDB_TOKEN`, `INFLUXDB_ORG`, `INFLUXDB_BUCKET`
    /// - `INFLUXDB_APP_NAME`: value of the `app_name` tag
    /// - `INFLUXDB_PRECISION`: `s`, `ms`, `us` or `ns`
    /// - `INFLUXDB_ASYNC`: `false` selects synchronous writes
    ///
    /// Unparsable values keep the default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("APP_ENV") {
            if !s.trim().is_empty() {
                cfg.environment = s;
            }
        }
        if let Ok(s) = std::env::var("INFLUXDB_URL") {
            cfg.client.url = s;
        }
        cfg.client.token = std::env::var("INFLUXDB_TOKEN").ok().or(cfg.client.token);
        cfg.client.org = std::env::var("INFLUXDB_ORG").ok().or(cfg.client.org);
        cfg.client.bucket = std::env::var("INFLUXDB_BUCKET").ok().or(cfg.client.bucket);
        cfg.application_name = std::env::var("INFLUXDB_APP_NAME")
            .ok()
            .or(cfg.application_name);

        if let Some(p) = std::env::var("INFLUXDB_PRECISION")
            .ok()
            .and_then(|s| WritePrecision::parse(&s))
        {
            cfg.client.precision = p;
        }
        if let Some(v) = std::env::var("INFLUXDB_ASYNC")
            .ok()
            .and_then(|s| s.trim().parse::<bool>().ok())
        {
            cfg.client.async_writes = v;
        }

        cfg
    }

    /// Builder-style mutation for callers that pass the configuration
    /// around explicitly.
    pub fn configure(mut self, mutator: impl FnOnce(&mut Configuration)) -> Self {
        mutator(&mut self);
        self
    }

    /// Alias of `application_name`.
    pub fn app_name(&self) -> Option<&str> {
        self.application_name.as_deref()
    }

    pub fn set_app_name(&mut self, name: impl Into<String>) {
        self.application_name = Some(name.into());
    }

    pub fn set_tags_middleware<F>(&mut self, middleware: F)
    where
        F: Fn(Tags) -> Tags + Send + Sync + 'static,
    {
        self.tags_middleware = Arc::new(middleware);
    }

    pub fn ignore_hook(&mut self, event_name: impl Into<String>) {
        self.ignored_hooks.insert(event_name.into());
    }

    pub fn ignore_environment(&mut self, environment: impl Into<String>) {
        self.ignored_environments.insert(environment.into());
    }
}

fn identity_middleware() -> TagsMiddleware {
    Arc::new(|tags| tags)
}

// ─── Process-wide configuration ──────────────────────────────────

fn global() -> &'static RwLock<Arc<Configuration>> {
    static GLOBAL: OnceLock<RwLock<Arc<Configuration>>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(Arc::new(Configuration::from_env())))
}

/// Applies `mutator` to the process-wide configuration.
///
/// Meant to run once at boot, before any traffic is served.
pub fn configure(mutator: impl FnOnce(&mut Configuration)) {
    let mut guard = global().write();
    let mut next = Configuration::clone(&guard);
    mutator(&mut next);
    *guard = Arc::new(next);
}

/// The active process-wide configuration.
pub fn current() -> Arc<Configuration> {
    global().read().clone()
}
