//! View rendering instrumentation. `identifier` is the template path and
//! ends up in the `filename` tag.

use std::future::Future;

use serde_json::Value;

use crate::event::{self, Payload};
use crate::subscriber::Instrumenter;

fn render_payload(identifier: &str) -> Payload {
    let mut p = Payload::new();
    p.insert("identifier".into(), Value::String(identifier.to_owned()));
    p
}

pub async fn render_template<F, T>(instrumenter: &Instrumenter, identifier: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    instrumenter
        .instrument(event::RENDER_TEMPLATE, render_payload(identifier), fut)
        .await
}

pub async fn render_partial<F, T>(instrumenter: &Instrumenter, identifier: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    instrumenter
        .instrument(event::RENDER_PARTIAL, render_payload(identifier), fut)
        .await
}

/// `count` items rendered through one partial, `cache_hits` of them
/// served from cache.
pub async fn render_collection<F, T>(
    instrumenter: &Instrumenter,
    identifier: &str,
    count: usize,
    cache_hits: usize,
    fut: F,
) -> T
where
    F: Future<Output = T>,
{
    let mut payload = render_payload(identifier);
    payload.insert("count".into(), Value::from(count));
    payload.insert("cache_hits".into(), Value::from(cache_hits));
    instrumenter
        .instrument(event::RENDER_COLLECTION, payload, fut)
        .await
}
