//! Static description of every instrumented event: which hook tag it gets,
//! how its location is resolved, and which payload keys become tags and
//! fields.

use serde_json::Value;

use crate::event::{self, Event};
use crate::metric::{tag_value, FieldValue, Fields, Tags};

/// Location used when nothing better is known.
pub const UNKNOWN_LOCATION: &str = "raw";

/// Where the `location` tag comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStrategy {
    /// The request context's location (e.g. "MetricsController#index").
    Request,
    /// Request location, falling back to the job class.
    Job,
    /// Request location, falling back to the rendered file.
    Template,
    /// Payload `name`, falling back to the request location.
    Name,
}

pub struct HookDescriptor {
    pub event: &'static str,
    pub hook: &'static str,
    pub location: LocationStrategy,
    pub tags: fn(&Event, &mut Tags),
    pub fields: fn(&Event, &mut Fields),
}

impl std::fmt::Debug for HookDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("event", &self.event)
            .field("hook", &self.hook)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

static HOOKS: &[HookDescriptor] = &[
    HookDescriptor {
        event: event::PROCESS_ACTION,
        hook: "process_action",
        location: LocationStrategy::Request,
        tags: request_tags,
        fields: request_fields,
    },
    HookDescriptor {
        event: event::RENDER_TEMPLATE,
        hook: "render_template",
        location: LocationStrategy::Template,
        tags: render_tags,
        fields: duration_fields,
    },
    HookDescriptor {
        event: event::RENDER_PARTIAL,
        hook: "render_partial",
        location: LocationStrategy::Template,
        tags: render_tags,
        fields: duration_fields,
    },
    HookDescriptor {
        event: event::RENDER_COLLECTION,
        hook: "render_collection",
        location: LocationStrategy::Template,
        tags: render_tags,
        fields: collection_fields,
    },
    HookDescriptor {
        event: event::SQL,
        hook: "sql",
        location: LocationStrategy::Request,
        tags: sql_tags,
        fields: sql_fields,
    },
    HookDescriptor {
        event: event::INSTANTIATION,
        hook: "instantiation",
        location: LocationStrategy::Request,
        tags: instantiation_tags,
        fields: instantiation_fields,
    },
    HookDescriptor {
        event: event::ENQUEUE,
        hook: "enqueue",
        location: LocationStrategy::Job,
        tags: enqueue_tags,
        fields: count_fields,
    },
    HookDescriptor {
        event: event::PERFORM_START,
        hook: "perform_start",
        location: LocationStrategy::Job,
        tags: perform_start_tags,
        fields: count_fields,
    },
    HookDescriptor {
        event: event::PERFORM,
        hook: "perform",
        location: LocationStrategy::Job,
        tags: perform_tags,
        fields: duration_fields,
    },
    HookDescriptor {
        event: event::DELIVER,
        hook: "deliver",
        location: LocationStrategy::Request,
        tags: mailer_tags,
        fields: count_fields,
    },
    HookDescriptor {
        event: event::BLOCK_INSTRUMENTATION,
        hook: "block_instrumentation",
        location: LocationStrategy::Name,
        tags: block_tags,
        fields: block_fields,
    },
];

/// Descriptor for `event_name`, if it is instrumented.
pub fn lookup(event_name: &str) -> Option<&'static HookDescriptor> {
    HOOKS.iter().find(|h| h.event == event_name)
}

pub fn all() -> &'static [HookDescriptor] {
    HOOKS
}

// ─── Tags ────────────────────────────────────────────────────────

fn copy_tag(ev: &Event, tags: &mut Tags, payload_key: &str, tag_key: &str) {
    if let Some(v) = ev.payload.get(payload_key).and_then(tag_value) {
        tags.insert(tag_key.to_owned(), v);
    }
}

fn request_tags(ev: &Event, tags: &mut Tags) {
    copy_tag(ev, tags, "method", "http_method");
    copy_tag(ev, tags, "status", "status");
    copy_tag(ev, tags, "path", "path");
    copy_tag(ev, tags, "format", "format");
}

fn render_tags(ev: &Event, tags: &mut Tags) {
    copy_tag(ev, tags, "identifier", "filename");
}

fn sql_tags(ev: &Event, tags: &mut Tags) {
    if let Some(op) = ev.str("sql").and_then(sql_operation) {
        tags.insert("operation".into(), op);
    }
    copy_tag(ev, tags, "name", "class_name");
}

fn instantiation_tags(ev: &Event, tags: &mut Tags) {
    copy_tag(ev, tags, "class_name", "class_name");
}

fn job_tags(ev: &Event, tags: &mut Tags, state: &str) {
    copy_tag(ev, tags, "job", "job");
    copy_tag(ev, tags, "queue", "queue");
    tags.insert("state".into(), state.into());
}

fn enqueue_tags(ev: &Event, tags: &mut Tags) {
    job_tags(ev, tags, "queued");
}

fn perform_start_tags(ev: &Event, tags: &mut Tags) {
    job_tags(ev, tags, "running");
}

fn perform_tags(ev: &Event, tags: &mut Tags) {
    let state = if ev.payload.contains_key("exception") {
        "failed"
    } else {
        "succeeded"
    };
    job_tags(ev, tags, state);
}

fn mailer_tags(ev: &Event, tags: &mut Tags) {
    copy_tag(ev, tags, "mailer", "mailer");
}

fn block_tags(ev: &Event, tags: &mut Tags) {
    copy_tag(ev, tags, "name", "name");
    if let Some(Value::Object(extra)) = ev.payload.get("tags") {
        for (k, v) in extra {
            if let Some(v) = tag_value(v) {
                tags.insert(k.clone(), v);
            }
        }
    }
}

/// First keyword of a statement, upper-cased: "select * …" → "SELECT".
fn sql_operation(sql: &str) -> Option<String> {
    sql.split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphabetic()))
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_uppercase)
}

// ─── Fields ──────────────────────────────────────────────────────

fn copy_field(ev: &Event, fields: &mut Fields, payload_key: &str, field_key: &str) {
    if let Some(v) = ev.payload.get(payload_key).and_then(FieldValue::from_json) {
        fields.insert(field_key.to_owned(), v);
    }
}

fn duration_fields(ev: &Event, fields: &mut Fields) {
    fields.insert("value".into(), FieldValue::Integer(ev.duration_ms()));
}

fn count_fields(_ev: &Event, fields: &mut Fields) {
    fields.insert("value".into(), FieldValue::Integer(1));
}

fn request_fields(ev: &Event, fields: &mut Fields) {
    duration_fields(ev, fields);
    copy_field(ev, fields, "view_runtime", "view");
    copy_field(ev, fields, "db_runtime", "db");
}

fn collection_fields(ev: &Event, fields: &mut Fields) {
    duration_fields(ev, fields);
    copy_field(ev, fields, "count", "count");
    copy_field(ev, fields, "cache_hits", "cache_hits");
}

fn sql_fields(ev: &Event, fields: &mut Fields) {
    duration_fields(ev, fields);
    copy_field(ev, fields, "sql", "sql");
}

fn instantiation_fields(ev: &Event, fields: &mut Fields) {
    duration_fields(ev, fields);
    copy_field(ev, fields, "record_count", "record_count");
}

fn block_fields(ev: &Event, fields: &mut Fields) {
    duration_fields(ev, fields);
    if let Some(Value::Object(extra)) = ev.payload.get("values") {
        for (k, v) in extra {
            if let Some(v) = FieldValue::from_json(v) {
                fields.insert(k.clone(), v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload;
    use chrono::{TimeZone, Utc};

    fn event(name: &str, payload: crate::event::Payload) -> Event {
        let start = Utc.timestamp_opt(1_000, 0).unwrap();
        let finish = Utc.timestamp_opt(1_000, 25_000_000).unwrap();
        Event::new(name, start, finish, payload)
    }

    #[test]
    fn every_descriptor_hook_matches_its_event_prefix() {
        for h in all() {
            assert_eq!(event::hook_name(h.event), h.hook);
        }
        assert!(lookup("unknown.thing").is_none());
    }

    #[test]
    fn sql_operation_is_first_keyword() {
        assert_eq!(sql_operation("  select * from t").as_deref(), Some("SELECT"));
        assert_eq!(sql_operation("(INSERT INTO t)").as_deref(), Some("INSERT"));
        assert_eq!(sql_operation(""), None);
    }

    #[test]
    fn perform_state_follows_exception() {
        let h = lookup(event::PERFORM).unwrap();
        let mut tags = Tags::new();
        (h.tags)(&event(event::PERFORM, payload! { "job" => "MetricJob" }), &mut tags);
        assert_eq!(tags.get("state").map(String::as_str), Some("succeeded"));

        let mut tags = Tags::new();
        let failed = payload! { "job" => "MetricJob", "exception" => "boom" };
        (h.tags)(&event(event::PERFORM, failed), &mut tags);
        assert_eq!(tags.get("state").map(String::as_str), Some("failed"));
    }

    #[test]
    fn collection_fields_include_counts() {
        let h = lookup(event::RENDER_COLLECTION).unwrap();
        let mut fields = Fields::new();
        let ev = event(
            event::RENDER_COLLECTION,
            payload! { "identifier" => "views/_row.html", "count" => 3, "cache_hits" => 1 },
        );
        (h.fields)(&ev, &mut fields);
        assert_eq!(fields.get("value"), Some(&FieldValue::Integer(25)));
        assert_eq!(fields.get("count"), Some(&FieldValue::Integer(3)));
        assert_eq!(fields.get("cache_hits"), Some(&FieldValue::Integer(1)));
    }

    #[test]
    fn block_merges_payload_tags_and_values() {
        let h = lookup(event::BLOCK_INSTRUMENTATION).unwrap();
        let ev = event(
            event::BLOCK_INSTRUMENTATION,
            payload! {
                "name" => "expensive_operation",
                "tags" => serde_json::json!({ "shard": "eu" }),
                "values" => serde_json::json!({ "rows": 10 }),
            },
        );
        let (mut tags, mut fields) = (Tags::new(), Fields::new());
        (h.tags)(&ev, &mut tags);
        (h.fields)(&ev, &mut fields);
        assert_eq!(tags.get("name").map(String::as_str), Some("expensive_operation"));
        assert_eq!(tags.get("shard").map(String::as_str), Some("eu"));
        assert_eq!(fields.get("rows"), Some(&FieldValue::Integer(10)));
    }
}
