use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::concurrency::counter::SharedCounter;
use crate::concurrency::queue::QueueReceiver;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, LoadResult};
use crate::load_error;
use crate::sink::Sink;
use crate::workers::worker::{LoadWorker, WorkerStats};

/// Totals over every worker of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: Vec<WorkerStats>,
}

impl PoolStats {
    pub fn succeeded(&self) -> u64 {
        self.workers.iter().map(|stats| stats.succeeded).sum()
    }

    pub fn failed(&self) -> u64 {
        self.workers.iter().map(|stats| stats.failed).sum()
    }

    pub fn abandoned(&self) -> u64 {
        self.workers.iter().map(|stats| stats.abandoned).sum()
    }
}

/// A fixed-size set of [`LoadWorker`]s sharing one queue, sink and counter.
///
/// Workers are spawned at construction and the pool is joined exactly once with
/// [`WorkerPool::wait_all`]. Dropping the pool without joining aborts the workers.
#[derive(Debug)]
pub struct WorkerPool {
    join_set: JoinSet<WorkerStats>,
}

impl WorkerPool {
    /// Spawns `size` workers, numbered from 1.
    pub fn spawn<K: Sink>(
        size: NonZeroUsize,
        receiver: QueueReceiver<K::Unit>,
        sink: K,
        counter: SharedCounter,
        shutdown_rx: ShutdownRx,
        sink_timeout: Option<Duration>,
    ) -> Self {
        let mut join_set = JoinSet::new();

        for worker_id in 1..=size.get() {
            let worker = LoadWorker::new(
                worker_id,
                receiver.clone(),
                sink.clone(),
                counter.clone(),
                shutdown_rx.clone(),
                sink_timeout,
            );
            join_set.spawn(worker.run());
        }

        debug!(workers = size.get(), sink = K::name(), "spawned worker pool");

        Self { join_set }
    }

    /// Waits for every worker to terminate.
    ///
    /// Workers that panicked are reported together as [`ErrorKind::WorkerPanic`] errors once
    /// all the others have finished.
    pub async fn wait_all(mut self) -> LoadResult<PoolStats> {
        let mut stats = PoolStats::default();
        let mut errors = Vec::new();

        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok(worker_stats) => stats.workers.push(worker_stats),
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        debug!("worker task was cancelled");
                    } else {
                        error!(error = %join_err, "worker panicked");
                        errors.push(load_error!(
                            ErrorKind::WorkerPanic,
                            "Worker panicked",
                            join_err
                        ));
                    }
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        stats.workers.sort_by_key(|worker| worker.worker_id);

        Ok(stats)
    }
}
