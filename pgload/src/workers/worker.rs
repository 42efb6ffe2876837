use metrics::{counter, histogram};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bail;
use crate::concurrency::counter::SharedCounter;
use crate::concurrency::queue::QueueReceiver;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, LoadResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{WORKER__BEFORE_SINK_APPLY, load_fail_point};
use crate::metrics::{
    COUNTER_DISCIPLINE_LABEL, ERROR_KIND_LABEL, PGLOAD_SINK_CALL_DURATION_SECONDS,
    PGLOAD_UNITS_FAILED_TOTAL, PGLOAD_UNITS_SUCCEEDED_TOTAL, SINK_LABEL,
};
use crate::sink::Sink;

/// Per-worker tally returned when a worker terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// 1-based id of the worker within its pool.
    pub worker_id: usize,
    pub succeeded: u64,
    pub failed: u64,
    /// Units taken from the queue after shutdown was requested and dropped unapplied.
    pub abandoned: u64,
}

/// A worker applying units from the queue until it is closed and drained.
///
/// Sink failures are logged and tallied but never stop the worker. Only successful units
/// increment the shared counter.
#[derive(Debug)]
pub struct LoadWorker<K: Sink> {
    worker_id: usize,
    receiver: QueueReceiver<K::Unit>,
    sink: K,
    counter: SharedCounter,
    shutdown_rx: ShutdownRx,
    sink_timeout: Option<Duration>,
}

impl<K: Sink> LoadWorker<K> {
    pub fn new(
        worker_id: usize,
        receiver: QueueReceiver<K::Unit>,
        sink: K,
        counter: SharedCounter,
        shutdown_rx: ShutdownRx,
        sink_timeout: Option<Duration>,
    ) -> Self {
        Self {
            worker_id,
            receiver,
            sink,
            counter,
            shutdown_rx,
            sink_timeout,
        }
    }

    pub async fn run(mut self) -> WorkerStats {
        let worker_id = self.worker_id;
        let mut stats = WorkerStats {
            worker_id,
            ..Default::default()
        };

        debug!(worker_id, "worker started");

        loop {
            let unit = tokio::select! {
                biased;

                _ = self.shutdown_rx.wait() => {
                    info!(worker_id, "shutdown requested, worker stops dequeuing");
                    break;
                }

                unit = self.receiver.recv() => unit,
            };

            let Some(unit) = unit else {
                debug!(worker_id, "queue closed and drained");
                break;
            };

            if self.shutdown_rx.is_shutdown() {
                warn!(worker_id, ?unit, "shutdown requested, dropping dequeued unit");
                stats.abandoned += 1;
                break;
            }

            if self.process(&unit).await {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }
        }

        debug!(
            worker_id,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "worker finished"
        );

        stats
    }

    /// Applies a single unit, returning whether it succeeded.
    async fn process(&self, unit: &K::Unit) -> bool {
        let worker_id = self.worker_id;
        let started = Instant::now();
        debug!(worker_id, ?unit, "processing unit");

        let result = self.apply(unit).await;

        let elapsed = started.elapsed();
        histogram!(PGLOAD_SINK_CALL_DURATION_SECONDS, SINK_LABEL => K::name())
            .record(elapsed.as_secs_f64());

        match result {
            Ok(()) => {
                self.counter.increment();
                counter!(
                    PGLOAD_UNITS_SUCCEEDED_TOTAL,
                    SINK_LABEL => K::name(),
                    COUNTER_DISCIPLINE_LABEL => self.counter.discipline().to_string(),
                )
                .increment(1);

                debug!(worker_id, ?unit, ?elapsed, "finished unit");

                true
            }
            Err(err) => {
                counter!(
                    PGLOAD_UNITS_FAILED_TOTAL,
                    SINK_LABEL => K::name(),
                    ERROR_KIND_LABEL => format!("{:?}", err.kind()),
                )
                .increment(1);

                warn!(worker_id, ?unit, ?elapsed, error = %err, "sink failed to apply unit");

                false
            }
        }
    }

    async fn apply(&self, unit: &K::Unit) -> LoadResult<()> {
        #[cfg(feature = "failpoints")]
        load_fail_point(WORKER__BEFORE_SINK_APPLY)?;

        let Some(limit) = self.sink_timeout else {
            return self.sink.apply(unit).await;
        };

        match tokio::time::timeout(limit, self.sink.apply(unit)).await {
            Ok(result) => result,
            Err(_) => bail!(
                ErrorKind::SinkTimeout,
                "The sink call timed out",
                format!("No result from the {} sink within {limit:?}", K::name())
            ),
        }
    }
}
