//! Background job and mail delivery instrumentation.
//!
//! Wrap the enqueue call and the job body; the job runner itself is the
//! application's.

use std::fmt::Display;
use std::future::Future;

use serde_json::Value;

use crate::event::{self, Event, Payload};
use crate::subscriber::Instrumenter;

fn job_payload(job: &str, queue: &str) -> Payload {
    let mut p = Payload::new();
    p.insert("job".into(), Value::String(job.to_owned()));
    p.insert("queue".into(), Value::String(queue.to_owned()));
    p
}

/// Publishes `enqueue` (tagged `state=queued`, `value=1`) around `fut`.
pub async fn enqueue<F, T>(instrumenter: &Instrumenter, job: &str, queue: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    instrumenter
        .instrument(event::ENQUEUE, job_payload(job, queue), fut)
        .await
}

/// Publishes `perform_start` right away and `perform` once `fut` resolves.
/// An `Err` outcome marks the job `failed` and records the error text.
pub async fn perform<F, T, E>(
    instrumenter: &Instrumenter,
    job: &str,
    queue: &str,
    fut: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let now = instrumenter.now();
    instrumenter
        .publish(Event::new(event::PERFORM_START, now, now, job_payload(job, queue)))
        .await;

    instrumenter
        .instrument_with(event::PERFORM, job_payload(job, queue), fut, |out, payload| {
            if let Err(e) = out {
                payload.insert("exception".into(), Value::String(e.to_string()));
            }
        })
        .await
}

/// Publishes `deliver` (one count per delivered message) around `fut`.
pub async fn deliver<F, T>(instrumenter: &Instrumenter, mailer: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let mut payload = Payload::new();
    payload.insert("mailer".into(), Value::String(mailer.to_owned()));
    instrumenter.instrument(event::DELIVER, payload, fut).await
}
