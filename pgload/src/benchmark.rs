//! Comparison of counter disciplines and queue capacities under a latency bound workload.
//!
//! The benchmark pushes the same number of [`Job`]s through the pipeline four times, once per
//! combination of [`CounterDiscipline`] and [`QueueCapacity`], and reports the elapsed time and
//! final count of each run.

use pgload_config::shared::{CounterDiscipline, PipelineConfig, QueueCapacity};
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::bail;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, LoadResult};
use crate::pipeline::{CompletionReport, Pipeline};
use crate::sink::Sink;

pub const DEFAULT_BENCHMARK_WORKERS: i64 = 10;
pub const DEFAULT_BENCHMARK_JOBS: u64 = 10;
pub const DEFAULT_BENCHMARK_BUFFER: usize = 10;
pub const DEFAULT_BENCHMARK_PAUSE: Duration = Duration::from_secs(3);

/// A labeled token standing for one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: u64,
    pub label: String,
}

impl Job {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            label: format!("API Call {id}"),
        }
    }
}

/// Creates `count` jobs numbered from 1.
pub fn jobs(count: u64) -> impl Iterator<Item = Job> {
    (1..=count).map(Job::new)
}

#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Workers per run. Values `<= 0` resolve to the pipeline default.
    pub workers: i64,
    pub jobs: u64,
    /// Capacity of the queue in the buffered runs.
    pub buffer: usize,
    /// Idle time between two runs.
    pub pause: Duration,
    pub sink_timeout_ms: Option<u64>,
}

impl BenchmarkConfig {
    pub fn validate(&self) -> LoadResult<()> {
        if self.buffer == 0 {
            bail!(
                ErrorKind::ConfigError,
                "The benchmark buffer must be greater than zero",
                "A zero buffer would run the unbuffered case twice"
            );
        }

        Ok(())
    }

    /// The four combinations in the order they are run.
    pub fn combinations(&self) -> [(CounterDiscipline, QueueCapacity); 4] {
        let buffered = QueueCapacity::Bounded {
            capacity: self.buffer,
        };

        [
            (CounterDiscipline::Locked, QueueCapacity::Rendezvous),
            (CounterDiscipline::Locked, buffered),
            (CounterDiscipline::Atomic, QueueCapacity::Rendezvous),
            (CounterDiscipline::Atomic, buffered),
        ]
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_BENCHMARK_WORKERS,
            jobs: DEFAULT_BENCHMARK_JOBS,
            buffer: DEFAULT_BENCHMARK_BUFFER,
            pause: DEFAULT_BENCHMARK_PAUSE,
            sink_timeout_ms: None,
        }
    }
}

/// Outcome of the benchmark, one report per combination that ran.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub runs: Vec<CompletionReport>,
    pub cancelled: bool,
}

impl BenchmarkReport {
    /// Sum of the final counts of every run using `discipline`.
    pub fn total_for(&self, discipline: CounterDiscipline) -> u64 {
        self.runs
            .iter()
            .filter(|run| run.discipline == discipline)
            .map(|run| run.succeeded)
            .sum()
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Benchmark results:")?;
        for run in &self.runs {
            writeln!(
                f,
                "  {} + {}: {:?} ({} of {} succeeded)",
                run.discipline, run.capacity, run.elapsed, run.succeeded, run.enqueued
            )?;
        }

        for discipline in [CounterDiscipline::Locked, CounterDiscipline::Atomic] {
            writeln!(
                f,
                "  total processed ({discipline}): {}",
                self.total_for(discipline)
            )?;
        }

        if self.cancelled {
            writeln!(f, "  cancelled after {} of 4 runs", self.runs.len())?;
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Benchmark<K> {
    config: BenchmarkConfig,
    sink: K,
    shutdown_tx: ShutdownTx,
}

impl<K> Benchmark<K>
where
    K: Sink<Unit = Job>,
{
    pub fn new(config: BenchmarkConfig, sink: K) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();

        Self::with_shutdown(config, sink, shutdown_tx)
    }

    pub fn with_shutdown(config: BenchmarkConfig, sink: K, shutdown_tx: ShutdownTx) -> Self {
        Self {
            config,
            sink,
            shutdown_tx,
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Runs every combination in order, each with a fresh counter and queue.
    pub async fn run(&self) -> LoadResult<BenchmarkReport> {
        self.config.validate()?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut report = BenchmarkReport {
            runs: Vec::with_capacity(4),
            cancelled: false,
        };

        for (index, (discipline, capacity)) in self.config.combinations().into_iter().enumerate() {
            if index > 0 {
                info!(pause = ?self.config.pause, "pausing before next run");
                tokio::select! {
                    biased;

                    _ = shutdown_rx.wait() => {}

                    _ = tokio::time::sleep(self.config.pause) => {}
                }
            }

            if shutdown_rx.is_shutdown() {
                report.cancelled = true;
                break;
            }

            info!(%discipline, %capacity, jobs = self.config.jobs, "running benchmark case");

            let pipeline = Pipeline::with_shutdown(
                PipelineConfig {
                    no_of_workers: self.config.workers,
                    queue: capacity,
                    counter: discipline,
                    sink_timeout_ms: self.config.sink_timeout_ms,
                },
                self.sink.clone(),
                self.shutdown_tx.clone(),
            );

            let run = pipeline.run(jobs(self.config.jobs)).await?;
            report.cancelled = run.cancelled;
            report.runs.push(run);

            if report.cancelled {
                break;
            }
        }

        Ok(report)
    }
}
