use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::client::{Point, TimeSeriesClient};
use crate::config::{WriteOptions, WritePrecision, WriteType};
use crate::metric::Metric;

/// Hands finished metrics to a [`TimeSeriesClient`].
///
/// Synchronous mode awaits the client for every metric. Batching mode
/// queues points for a background task that flushes every `batch_size`
/// points or every `flush_interval`, whichever comes first. The queue holds
/// at most `max_queue_size` points; overflow is dropped. Either way,
/// delivery errors are logged and dropped.
pub struct MetricWriter {
    client: Arc<dyn TimeSeriesClient>,
    options: WriteOptions,
    precision: WritePrecision,
    batch: Option<Batcher>,
}

/// Sending half of the batching queue plus its drain task.
struct Batcher {
    tx: Mutex<Option<mpsc::Sender<Point>>>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MetricWriter {
    /// Batching needs a tokio runtime; without one the writer falls back to
    /// synchronous writes.
    pub fn new(
        client: Arc<dyn TimeSeriesClient>,
        options: WriteOptions,
        precision: WritePrecision,
    ) -> Self {
        let mut options = options;
        let batch = match options.write_type {
            WriteType::Synchronous => None,
            WriteType::Batching => match tokio::runtime::Handle::try_current() {
                Ok(rt) => Some(Batcher::spawn(&rt, client.clone(), &options, precision)),
                Err(_) => {
                    warn!("no tokio runtime available, falling back to synchronous writes");
                    options.write_type = WriteType::Synchronous;
                    None
                }
            },
        };

        Self {
            client,
            options,
            precision,
            batch,
        }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    pub fn precision(&self) -> WritePrecision {
        self.precision
    }

    /// Never fails: errors are the client's to report, here they are logged.
    pub async fn write(&self, metric: Metric) {
        let point = Point::from_metric(&metric);

        match &self.batch {
            None => {
                if let Err(e) = self.client.write(&[point], self.precision).await {
                    warn!(error = %e, measurement = %metric.name, "metric write failed");
                }
            }
            Some(batch) => {
                let sent = match batch.tx.lock().as_ref() {
                    Some(tx) => tx.try_send(point),
                    None => Err(TrySendError::Closed(point)),
                };
                match sent {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            measurement = %metric.name,
                            capacity = self.options.max_queue_size,
                            "metric queue full, dropping point"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        warn!(measurement = %metric.name, "metric writer closed, dropping point");
                    }
                }
            }
        }
    }

    /// Flushes queued points and stops the background task. Later writes
    /// are dropped in batching mode.
    pub async fn close(&self) {
        let Some(batch) = &self.batch else {
            return;
        };
        // Dropping the sender ends the stream after the last chunk.
        batch.tx.lock().take();
        let handle = batch.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "metric flush task ended abnormally");
            }
        }
    }
}

impl Batcher {
    fn spawn(
        rt: &tokio::runtime::Handle,
        client: Arc<dyn TimeSeriesClient>,
        options: &WriteOptions,
        precision: WritePrecision,
    ) -> Self {
        let (tx, rx) = mpsc::channel(options.max_queue_size.max(1));
        let chunks = ReceiverStream::new(rx)
            .chunks_timeout(options.batch_size.max(1), options.flush_interval);

        let handle = rt.spawn(async move {
            tokio::pin!(chunks);
            while let Some(points) = chunks.next().await {
                debug!(points = points.len(), "flushing metric batch");
                if let Err(e) = client.write(&points, precision).await {
                    warn!(error = %e, points = points.len(), "metric batch write failed");
                }
            }
        });

        Self {
            tx: Mutex::new(Some(tx)),
            handle: tokio::sync::Mutex::new(Some(handle)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryClient;
    use crate::config::ClientConfig;
    use crate::error::Result;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;
    use crate::metric::{FieldValue, Fields, Tags};
    use std::time::Duration;

    fn metric(i: i64) -> Metric {
        let mut tags = Tags::new();
        tags.insert("hook".into(), "enqueue".into());
        tags.insert("location".into(), "MetricJob".into());
        let mut fields = Fields::new();
        fields.insert("value".into(), FieldValue::Integer(i));
        Metric {
            name: "axum".into(),
            tags,
            fields,
            timestamp: 1_514_797_200_000 + i,
        }
    }

    fn options(async_writes: bool) -> WriteOptions {
        ClientConfig {
            async_writes,
            batch_size: 2,
            flush_interval: Duration::from_millis(20),
            ..ClientConfig::default()
        }
        .write_options()
    }

    #[tokio::test]
    async fn synchronous_mode_writes_each_metric_immediately() {
        let client = Arc::new(InMemoryClient::new());
        let writer = MetricWriter::new(client.clone(), options(false), WritePrecision::Millisecond);

        writer.write(metric(1)).await;
        writer.write(metric(2)).await;

        assert_eq!(client.write_calls(), 2);
        assert_eq!(client.points().len(), 2);
        assert_eq!(client.precisions(), vec![WritePrecision::Millisecond; 2]);
    }

    #[tokio::test]
    async fn synchronous_mode_swallows_client_failures() {
        let client = Arc::new(InMemoryClient::new());
        client.set_failing(true);
        let writer = MetricWriter::new(client.clone(), options(false), WritePrecision::Second);

        writer.write(metric(1)).await;

        assert_eq!(client.write_calls(), 1);
        assert!(client.points().is_empty());
    }

    #[tokio::test]
    async fn batching_mode_delivers_everything_on_close() {
        let client = Arc::new(InMemoryClient::new());
        let writer = MetricWriter::new(client.clone(), options(true), WritePrecision::Millisecond);
        assert_eq!(writer.options().write_type, WriteType::Batching);

        for i in 0..5 {
            writer.write(metric(i)).await;
        }
        writer.close().await;

        let values: Vec<_> = client
            .points()
            .iter()
            .map(|p| p.fields["value"].clone())
            .collect();
        assert_eq!(values, (0..5).map(FieldValue::Integer).collect::<Vec<_>>());
        // batch_size = 2 → at least three flushes
        assert!(client.write_calls() >= 3);
    }

    #[tokio::test]
    async fn batching_mode_flushes_on_interval() {
        let client = Arc::new(InMemoryClient::new());
        let writer = MetricWriter::new(client.clone(), options(true), WritePrecision::Millisecond);

        writer.write(metric(1)).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(client.points().len(), 1);
        writer.close().await;
    }

    #[tokio::test]
    async fn writes_after_close_are_dropped() {
        let client = Arc::new(InMemoryClient::new());
        let writer = MetricWriter::new(client.clone(), options(true), WritePrecision::Millisecond);
        writer.close().await;
        writer.write(metric(1)).await;
        assert!(client.points().is_empty());
    }

    /// Holds every write until the test opens the gate.
    struct GatedClient {
        gate: Semaphore,
        inner: InMemoryClient,
    }

    #[async_trait]
    impl TimeSeriesClient for GatedClient {
        async fn write(&self, points: &[Point], precision: WritePrecision) -> Result<()> {
            let _permit = self.gate.acquire().await;
            self.inner.write(points, precision).await
        }
    }

    #[tokio::test]
    async fn full_queue_drops_overflow_while_client_stalls() {
        let client = Arc::new(GatedClient {
            gate: Semaphore::new(0),
            inner: InMemoryClient::new(),
        });
        let options = ClientConfig {
            batch_size: 1,
            max_queue_size: 2,
            flush_interval: Duration::from_millis(20),
            ..ClientConfig::default()
        }
        .write_options();
        let writer = MetricWriter::new(client.clone(), options, WritePrecision::Millisecond);

        for i in 0..10 {
            writer.write(metric(i)).await;
        }
        client.gate.add_permits(100);
        writer.close().await;

        // Two queued, plus at most one chunk already taken by the flush task.
        let delivered = client.inner.points().len();
        assert!(delivered >= 2, "delivered {delivered}");
        assert!(delivered <= 3, "delivered {delivered}");
    }

    struct PanickingClient;

    #[async_trait]
    impl TimeSeriesClient for PanickingClient {
        async fn write(&self, _points: &[Point], _precision: WritePrecision) -> Result<()> {
            panic!("client exploded");
        }
    }

    #[tokio::test]
    async fn close_survives_a_panicked_flush_task() {
        let writer = MetricWriter::new(
            Arc::new(PanickingClient),
            options(true),
            WritePrecision::Millisecond,
        );
        writer.write(metric(1)).await;
        writer.close().await;
        // The queue is gone either way; later writes are dropped.
        writer.write(metric(2)).await;
    }

    #[test]
    fn batching_without_runtime_falls_back_to_synchronous() {
        let client = Arc::new(InMemoryClient::new());
        let writer = MetricWriter::new(client, options(true), WritePrecision::Millisecond);
        assert_eq!(writer.options().write_type, WriteType::Synchronous);
    }
}
