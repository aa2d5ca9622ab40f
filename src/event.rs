use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Hook-specific attributes attached to an event.
pub type Payload = Map<String, Value>;

// ─── Event names ─────────────────────────────────────────────────

pub const PROCESS_ACTION: &str = "process_action.axum";
pub const RENDER_TEMPLATE: &str = "render_template.view";
pub const RENDER_PARTIAL: &str = "render_partial.view";
pub const RENDER_COLLECTION: &str = "render_collection.view";
pub const SQL: &str = "sql.db";
pub const INSTANTIATION: &str = "instantiation.db";
pub const ENQUEUE: &str = "enqueue.job";
pub const PERFORM_START: &str = "perform_start.job";
pub const PERFORM: &str = "perform.job";
pub const DELIVER: &str = "deliver.mailer";
pub const BLOCK_INSTRUMENTATION: &str = "block_instrumentation.app";

/// One completed, instrumented operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
    pub payload: Payload,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
        payload: Payload,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            finish,
            payload,
        }
    }

    /// Whole milliseconds between start and finish; never negative.
    pub fn duration_ms(&self) -> i64 {
        (self.finish - self.start).num_milliseconds().max(0)
    }

    /// Hook part of the event name: `render_partial.view` → `render_partial`.
    pub fn hook(&self) -> &str {
        hook_name(&self.name)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

pub fn hook_name(event_name: &str) -> &str {
    event_name.split('.').next().unwrap_or(event_name)
}

/// Builds a [`Payload`] from `key => value` pairs.
#[macro_export]
macro_rules! payload {
    () => { $crate::event::Payload::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut p = $crate::event::Payload::new();
        $( p.insert(($key).to_string(), $crate::__private::json!($value)); )+
        p
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_truncates_to_whole_milliseconds() {
        let start = Utc.timestamp_opt(100, 0).unwrap();
        let finish = Utc.timestamp_opt(100, 12_900_000).unwrap();
        let ev = Event::new(RENDER_PARTIAL, start, finish, Payload::new());
        assert_eq!(ev.duration_ms(), 12);
        assert_eq!(ev.hook(), "render_partial");
    }

    #[test]
    fn clock_skew_never_yields_negative_durations() {
        let start = Utc.timestamp_opt(200, 0).unwrap();
        let finish = Utc.timestamp_opt(100, 0).unwrap();
        let ev = Event::new(SQL, start, finish, Payload::new());
        assert_eq!(ev.duration_ms(), 0);
    }

    #[test]
    fn payload_macro_builds_json_map() {
        let p = payload! { "job" => "MetricJob", "attempt" => 2 };
        assert_eq!(p.get("job").and_then(Value::as_str), Some("MetricJob"));
        assert_eq!(p.get("attempt").and_then(Value::as_i64), Some(2));
    }
}
