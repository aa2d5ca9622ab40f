use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Point, TimeSeriesClient};
use crate::config::WritePrecision;
use crate::error::{Error, Result};

/// Client that keeps every written point in memory.
/// Handy for tests and for running without a database.
#[derive(Default)]
pub struct InMemoryClient {
    points: Mutex<Vec<(Point, WritePrecision)>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every point written so far, oldest first.
    pub fn points(&self) -> Vec<Point> {
        self.points.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    /// Points whose `hook` tag equals `hook`.
    pub fn points_for_hook(&self, hook: &str) -> Vec<Point> {
        self.points
            .lock()
            .iter()
            .filter(|(p, _)| p.tags.get("hook").map(String::as_str) == Some(hook))
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn precisions(&self) -> Vec<WritePrecision> {
        self.points.lock().iter().map(|(_, p)| *p).collect()
    }

    /// Number of `write` calls, successful or not.
    pub fn write_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// While set, every write fails and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.points.lock().clear();
    }
}

#[async_trait]
impl TimeSeriesClient for InMemoryClient {
    async fn write(&self, points: &[Point], precision: WritePrecision) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Status {
                status: 503,
                body: "in-memory client set to fail".into(),
            });
        }
        self.points
            .lock()
            .extend(points.iter().cloned().map(|p| (p, precision)));
        Ok(())
    }
}
