use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use influxdb_axum::{jobs, Instrumenter};

use super::AppError;
use crate::AppState;

/// Demo background job: pretends to crunch a few items.
#[derive(Debug, Clone)]
pub struct MetricJob {
    pub items: usize,
}

impl MetricJob {
    pub const NAME: &'static str = "MetricJob";
    pub const QUEUE: &'static str = "default";

    async fn run(&self) -> Result<usize, String> {
        if self.items == 0 {
            return Err("nothing to process".into());
        }
        tokio::time::sleep(Duration::from_millis(self.items as u64)).await;
        Ok(self.items)
    }
}

// ─── Enqueue ─────────────────────────────────────────────────────

/// Queues `job` for the worker, instrumented as an `enqueue`.
pub async fn perform_later(state: &AppState, job: MetricJob) -> Result<(), AppError> {
    jobs::enqueue(
        &state.instrumenter,
        MetricJob::NAME,
        MetricJob::QUEUE,
        state.jobs.send(job),
    )
    .await
    .map_err(|_| AppError::QueueClosed {
        job: MetricJob::NAME,
    })
}

// ─── Worker loop ─────────────────────────────────────────────────

/// Runs queued jobs one at a time until every sender is dropped.
pub fn spawn_worker(
    instrumenter: Instrumenter,
    mut rx: mpsc::Receiver<MetricJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let outcome =
                jobs::perform(&instrumenter, MetricJob::NAME, MetricJob::QUEUE, job.run()).await;
            if let Err(e) = outcome {
                tracing::warn!(job = MetricJob::NAME, error = %e, "job failed");
            }
        }
    })
}
