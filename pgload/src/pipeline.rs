//! The pipeline driver.
//!
//! A run resolves the worker count, creates the queue and the counter, spawns the worker pool,
//! enqueues every unit, closes the queue and joins the workers. The [`CompletionReport`] it
//! returns carries the final counter value, the failures and the elapsed time.

use metrics::{counter, histogram};
use pgload_config::shared::{CounterDiscipline, PipelineConfig, QueueCapacity};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::concurrency::counter::new_counter;
use crate::concurrency::queue::create_work_queue;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::error::LoadResult;
#[cfg(feature = "failpoints")]
use crate::failpoints::{PIPELINE__BEFORE_ENQUEUE, load_fail_point};
use crate::mapping::{ParameterList, Row, RowMapper};
use crate::metrics::{
    COUNTER_DISCIPLINE_LABEL, PGLOAD_ROWS_SKIPPED_TOTAL, PGLOAD_RUN_DURATION_SECONDS,
    PGLOAD_UNITS_ENQUEUED_TOTAL, QUEUE_CAPACITY_LABEL, SINK_LABEL,
};
use crate::sink::Sink;
use crate::workers::WorkerPool;

/// Summary of a single pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub workers: usize,
    pub capacity: QueueCapacity,
    pub discipline: CounterDiscipline,
    /// Units handed to the queue.
    pub enqueued: u64,
    /// Final value of the shared counter, the number of units the sink applied successfully.
    pub succeeded: u64,
    pub failed: u64,
    /// Input rows that were never enqueued.
    pub skipped: u64,
    /// Mapped columns that had no value in their row.
    pub mapping_gaps: u64,
    pub elapsed: Duration,
    /// Whether a shutdown request left units unenqueued or unprocessed.
    pub cancelled: bool,
}

impl CompletionReport {
    /// Units that were enqueued but neither succeeded nor failed, because of cancellation.
    pub fn unprocessed(&self) -> u64 {
        self.enqueued
            .saturating_sub(self.succeeded)
            .saturating_sub(self.failed)
    }
}

impl fmt::Display for CompletionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} units succeeded, {} failed",
            self.succeeded, self.enqueued, self.failed
        )?;

        if self.skipped > 0 || self.mapping_gaps > 0 {
            write!(
                f,
                ", {} rows skipped, {} missing values",
                self.skipped, self.mapping_gaps
            )?;
        }

        write!(
            f,
            " in {:?} ({} workers, {} queue, {} counter)",
            self.elapsed, self.workers, self.capacity, self.discipline
        )?;

        if self.cancelled {
            write!(f, ", cancelled with {} units unprocessed", self.unprocessed())?;
        }

        Ok(())
    }
}

/// Drives units of work through a pool of workers into a sink.
///
/// A run creates a fresh queue, counter and worker pool, enqueues every unit, closes the queue
/// and joins the workers. Runs with a single worker are the sequential case of the same code.
///
/// Requesting shutdown through [`Pipeline::shutdown_tx`] stops enqueueing, and workers stop at
/// their next dequeue. Shutdown is permanent, later runs end immediately.
#[derive(Debug)]
pub struct Pipeline<K> {
    config: PipelineConfig,
    sink: K,
    shutdown_tx: ShutdownTx,
}

impl<K: Sink> Pipeline<K> {
    pub fn new(config: PipelineConfig, sink: K) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();

        Self::with_shutdown(config, sink, shutdown_tx)
    }

    /// Creates a pipeline reacting to an existing shutdown channel.
    pub fn with_shutdown(config: PipelineConfig, sink: K, shutdown_tx: ShutdownTx) -> Self {
        Self {
            config,
            sink,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Runs every unit of `units` through the sink.
    ///
    /// Sink failures are counted in the report and do not fail the run. An error is returned
    /// only when workers panicked or the queue was closed while units were still being enqueued.
    pub async fn run<I>(&self, units: I) -> LoadResult<CompletionReport>
    where
        I: IntoIterator<Item = K::Unit>,
    {
        let started = Instant::now();
        let workers = self.config.effective_workers();
        let capacity = self.config.queue;
        let discipline = self.config.counter;

        info!(
            workers = workers.get(),
            %capacity,
            %discipline,
            sink = K::name(),
            "starting pipeline run"
        );

        let counter = new_counter(discipline);
        let (queue_tx, queue_rx) = create_work_queue(capacity);
        let pool = WorkerPool::spawn(
            workers,
            queue_rx,
            self.sink.clone(),
            counter.clone(),
            self.shutdown_tx.subscribe(),
            self.config.sink_timeout(),
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut enqueued = 0u64;
        let mut interrupted = false;
        let mut errors = Vec::new();

        for unit in units {
            if shutdown_rx.is_shutdown() {
                interrupted = true;
                break;
            }

            #[cfg(feature = "failpoints")]
            if let Err(err) = load_fail_point(PIPELINE__BEFORE_ENQUEUE) {
                errors.push(err);
                break;
            }

            let result = tokio::select! {
                biased;

                _ = shutdown_rx.wait() => {
                    interrupted = true;
                    break;
                }

                result = queue_tx.send(unit) => result,
            };

            if let Err(err) = result {
                error!(error = %err, enqueued, "stopped enqueueing, no worker is left");
                errors.push(err);
                break;
            }

            enqueued += 1;
        }

        queue_tx.close();

        let pool_stats = match pool.wait_all().await {
            Ok(pool_stats) => pool_stats,
            Err(err) => {
                errors.insert(0, err);
                return Err(errors.into());
            }
        };

        if !errors.is_empty() {
            return Err(errors.into());
        }

        let mut report = CompletionReport {
            workers: workers.get(),
            capacity,
            discipline,
            enqueued,
            succeeded: counter.value(),
            failed: pool_stats.failed(),
            skipped: 0,
            mapping_gaps: 0,
            elapsed: started.elapsed(),
            cancelled: false,
        };
        // A shutdown arriving after the last unit was applied leaves the run complete.
        report.cancelled = interrupted || pool_stats.abandoned() > 0 || report.unprocessed() > 0;

        counter!(
            PGLOAD_UNITS_ENQUEUED_TOTAL,
            SINK_LABEL => K::name(),
            QUEUE_CAPACITY_LABEL => capacity.to_string(),
        )
        .increment(enqueued);
        histogram!(
            PGLOAD_RUN_DURATION_SECONDS,
            SINK_LABEL => K::name(),
            QUEUE_CAPACITY_LABEL => capacity.to_string(),
            COUNTER_DISCIPLINE_LABEL => discipline.to_string(),
        )
        .record(report.elapsed.as_secs_f64());

        if report.cancelled {
            warn!(%report, "pipeline run cancelled");
        } else {
            info!(%report, "pipeline run completed");
        }

        Ok(report)
    }
}

impl<K> Pipeline<K>
where
    K: Sink<Unit = ParameterList>,
{
    /// Maps `rows` and runs the resulting parameter lists through the sink.
    ///
    /// Rows are numbered from 1 in diagnostics. Skipped rows and mapping gaps are added to the
    /// report.
    pub async fn load_rows(
        &self,
        rows: &[Row],
        mapper: &RowMapper,
    ) -> LoadResult<CompletionReport> {
        let mut mapped_rows = mapper.map_rows(rows);
        let mut report = self.run(&mut mapped_rows).await?;

        let stats = mapped_rows.stats();
        report.skipped = stats.rows_skipped;
        report.mapping_gaps = stats.gaps;

        counter!(PGLOAD_ROWS_SKIPPED_TOTAL, SINK_LABEL => K::name()).increment(stats.rows_skipped);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mapping::Parameter;
    use crate::test_utils::memory_sink::MemorySink;
    use pgload_config::shared::{MappingConfig, MissingColumnPolicy};
    use std::collections::BTreeMap;

    fn config(workers: i64, queue: QueueCapacity, counter: CounterDiscipline) -> PipelineConfig {
        PipelineConfig {
            no_of_workers: workers,
            queue,
            counter,
            sink_timeout_ms: None,
        }
    }

    #[derive(Debug, Clone)]
    struct PanickingSink;

    impl Sink for PanickingSink {
        type Unit = u32;

        fn name() -> &'static str {
            "panicking"
        }

        async fn apply(&self, unit: &u32) -> LoadResult<()> {
            if *unit == 2 {
                panic!("unit {unit} cannot be applied");
            }

            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn zero_workers_resolve_to_default_and_process_everything() {
        let sink = MemorySink::<u32>::new();
        let pipeline = Pipeline::new(
            config(0, QueueCapacity::default(), CounterDiscipline::Locked),
            sink.clone(),
        );

        let report = pipeline.run(1..=10).await.unwrap();

        assert_eq!(report.workers, 5);
        assert_eq!(report.enqueued, 10);
        assert_eq!(report.succeeded, 10);
        assert!(!report.cancelled);

        let mut applied = sink.applied().await;
        applied.sort_unstable();
        assert_eq!(applied, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_capacity_and_discipline_yields_the_same_count() {
        for discipline in [CounterDiscipline::Locked, CounterDiscipline::Atomic] {
            for queue in [
                QueueCapacity::Rendezvous,
                QueueCapacity::Bounded { capacity: 10 },
            ] {
                let pipeline = Pipeline::new(config(10, queue, discipline), MemorySink::new());

                let report = pipeline.run(1..=10u32).await.unwrap();

                assert_eq!(report.succeeded, 10, "{discipline} with {queue}");
                assert_eq!(report.discipline, discipline);
                assert_eq!(report.capacity, queue);
            }
        }
    }

    #[tokio::test]
    async fn single_worker_is_sequential() {
        let sink = MemorySink::<u32>::new();
        let pipeline = Pipeline::new(
            config(1, QueueCapacity::Rendezvous, CounterDiscipline::Atomic),
            sink.clone(),
        );

        let report = pipeline.run(1..=5).await.unwrap();

        assert_eq!(report.succeeded, 5);
        assert_eq!(sink.applied().await, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sink_failures_are_not_counted() {
        let sink = MemorySink::<u32>::new().failing_when(|unit| unit % 3 == 0);
        let pipeline = Pipeline::new(
            config(4, QueueCapacity::default(), CounterDiscipline::Atomic),
            sink.clone(),
        );

        let report = pipeline.run(1..=10).await.unwrap();

        assert_eq!(report.succeeded, 7);
        assert_eq!(report.failed, 3);
        assert_eq!(sink.attempts().await, 10);
        assert_eq!(sink.applied().await.len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sink_calls_time_out_as_failures() {
        let sink = MemorySink::<u32>::new().with_latency(Duration::from_secs(5));
        let pipeline = Pipeline::new(
            PipelineConfig {
                sink_timeout_ms: Some(100),
                ..config(2, QueueCapacity::default(), CounterDiscipline::Locked)
            },
            sink.clone(),
        );

        let report = pipeline.run(1..=4).await.unwrap();

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 4);
        assert!(sink.applied().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_run_early() {
        let sink = MemorySink::<u32>::new().with_latency(Duration::from_secs(1));
        let pipeline = Pipeline::new(
            config(1, QueueCapacity::default(), CounterDiscipline::Locked),
            sink.clone(),
        );
        let shutdown_tx = pipeline.shutdown_tx();

        let (report, _) = tokio::join!(pipeline.run(1..=10), async move {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            shutdown_tx.shutdown();
        });
        let report = report.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.enqueued, 10);
        assert!(report.succeeded < 10);
        assert_eq!(report.succeeded, sink.applied().await.len() as u64);
        assert_eq!(report.unprocessed(), 10 - report.succeeded);
    }

    #[tokio::test]
    async fn shutdown_before_the_run_enqueues_nothing() {
        let sink = MemorySink::<u32>::new();
        let pipeline = Pipeline::new(
            config(2, QueueCapacity::Rendezvous, CounterDiscipline::Atomic),
            sink.clone(),
        );
        pipeline.shutdown_tx().shutdown();

        let report = pipeline.run(1..=10).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.enqueued, 0);
        assert_eq!(report.succeeded, 0);
    }

    /// Requests shutdown while applying `last`, after every other unit was applied.
    #[derive(Debug, Clone)]
    struct ShutdownOnLastSink {
        last: u32,
        shutdown_tx: ShutdownTx,
    }

    impl Sink for ShutdownOnLastSink {
        type Unit = u32;

        fn name() -> &'static str {
            "shutdown_on_last"
        }

        async fn apply(&self, unit: &u32) -> LoadResult<()> {
            if *unit == self.last {
                self.shutdown_tx.shutdown();
            }

            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_after_the_last_unit_does_not_cancel_the_run() {
        let (shutdown_tx, _) = create_shutdown_channel();
        let sink = ShutdownOnLastSink {
            last: 5,
            shutdown_tx: shutdown_tx.clone(),
        };
        let pipeline = Pipeline::with_shutdown(
            config(1, QueueCapacity::default(), CounterDiscipline::Locked),
            sink,
            shutdown_tx.clone(),
        );

        let report = pipeline.run(1..=5).await.unwrap();

        assert!(shutdown_tx.is_shutdown());
        assert_eq!(report.enqueued, 5);
        assert_eq!(report.succeeded, 5);
        assert_eq!(report.unprocessed(), 0);
        assert!(!report.cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_panics_fail_the_run() {
        let pipeline = Pipeline::new(
            config(2, QueueCapacity::default(), CounterDiscipline::Locked),
            PanickingSink,
        );

        let err = pipeline.run(1..=4).await.unwrap_err();

        assert_eq!(err.kinds(), vec![ErrorKind::WorkerPanic]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_rows_maps_rows_and_reports_gaps() {
        let mapping = MappingConfig {
            column_mapping: BTreeMap::from([("id".to_string(), 0), ("name".to_string(), 1)]),
            custom_mapping: BTreeMap::from([("source".to_string(), "csv".to_string())]),
            missing_column_policy: MissingColumnPolicy::BindNull,
        };
        let mapper = RowMapper::new(&mapping);
        let rows: Vec<Row> = vec![
            ["1", "Ada"].into_iter().collect(),
            ["2"].into_iter().collect(),
            ["3", "Grace"].into_iter().collect(),
        ];
        let sink = MemorySink::<ParameterList>::new();
        let pipeline = Pipeline::new(
            config(3, QueueCapacity::default(), CounterDiscipline::Atomic),
            sink.clone(),
        );

        let report = pipeline.load_rows(&rows, &mapper).await.unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.mapping_gaps, 1);

        let applied = sink.applied().await;
        let short = applied
            .iter()
            .find(|parameters| parameters.get(0) == Some(&Parameter::Value("2".to_string())))
            .unwrap();
        assert_eq!(short.get(1), Some(&Parameter::Absent));
        assert_eq!(short.get(2), Some(&Parameter::Value("csv".to_string())));
    }

    #[tokio::test]
    async fn load_rows_skips_rows_with_gaps_under_skip_policy() {
        let mapping = MappingConfig {
            column_mapping: BTreeMap::from([("id".to_string(), 0), ("name".to_string(), 1)]),
            custom_mapping: BTreeMap::new(),
            missing_column_policy: MissingColumnPolicy::SkipRow,
        };
        let mapper = RowMapper::new(&mapping);
        let rows: Vec<Row> = vec![
            ["1", "Ada"].into_iter().collect(),
            ["2"].into_iter().collect(),
            Row::default(),
        ];
        let pipeline = Pipeline::new(
            config(2, QueueCapacity::Rendezvous, CounterDiscipline::Locked),
            MemorySink::new(),
        );

        let report = pipeline.load_rows(&rows, &mapper).await.unwrap();

        assert_eq!(report.enqueued, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 2);
    }
}
