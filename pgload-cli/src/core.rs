use pgload::benchmark::{Benchmark, BenchmarkConfig, Job};
use pgload::concurrency::shutdown::ShutdownTx;
use pgload::input::read_csv_file;
use pgload::mapping::RowMapper;
use pgload::pipeline::Pipeline;
use pgload::sink::Sink;
use pgload::sink::http::HttpSink;
use pgload::sink::postgres::PostgresSink;
use pgload::sink::simulated::{LatencyProfile, SimulatedSink};
use pgload_config::shared::LoaderConfig;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cli::{BenchArgs, BenchSink};
use crate::error::CliResult;

/// Loads the configured CSV file into Postgres and prints the completion report.
pub async fn start_load_with_config(config: LoaderConfig) -> CliResult<()> {
    let rows = read_csv_file(&config.csv_file, &config.csv)?;
    let mapper = RowMapper::new(&config.mapping);

    let workers = config.pipeline.effective_workers();
    let sink = PostgresSink::connect(
        &config.pg_connection,
        u32::try_from(workers.get()).unwrap_or(u32::MAX),
        &config.sql_statement,
        &config.table_name,
    )
    .await?;

    info!(
        table = %config.table_name,
        rows = rows.len(),
        parameters = mapper.parameter_count(),
        "loading rows"
    );

    let pipeline = Pipeline::new(config.pipeline.clone(), sink.clone());
    let shutdown_handle = spawn_shutdown_listener(pipeline.shutdown_tx());

    let result = pipeline.load_rows(&rows, &mapper).await;

    shutdown_handle.abort();
    let _ = shutdown_handle.await;
    sink.close().await;

    let report = result?;
    println!("{}: {report}", config.table_name);

    Ok(())
}

/// Runs the four benchmark combinations against the selected sink and prints the comparison.
pub async fn start_benchmark(args: BenchArgs) -> CliResult<()> {
    let config = BenchmarkConfig {
        workers: args.workers,
        jobs: args.jobs,
        buffer: args.buffer,
        pause: Duration::from_millis(args.pause_ms),
        sink_timeout_ms: args.sink_timeout_ms,
    };

    match args.sink {
        BenchSink::Simulated => {
            let latency = match args.max_latency_ms {
                Some(max_latency_ms) => LatencyProfile::Uniform {
                    min: Duration::from_millis(args.latency_ms),
                    max: Duration::from_millis(max_latency_ms),
                },
                None => LatencyProfile::Fixed(Duration::from_millis(args.latency_ms)),
            };
            let sink = SimulatedSink::new(latency).with_failure_rate(args.failure_rate)?;

            run_benchmark(config, sink).await
        }
        BenchSink::Http => {
            let sink = HttpSink::new(&args.url)?;

            run_benchmark(config, sink).await
        }
    }
}

async fn run_benchmark<K>(config: BenchmarkConfig, sink: K) -> CliResult<()>
where
    K: Sink<Unit = Job>,
{
    info!(
        sink = K::name(),
        workers = config.workers,
        jobs = config.jobs,
        buffer = config.buffer,
        "starting benchmark"
    );

    let benchmark = Benchmark::new(config, sink);
    let shutdown_handle = spawn_shutdown_listener(benchmark.shutdown_tx());

    let result = benchmark.run().await;

    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    let report = result?;
    print!("{report}");

    Ok(())
}

/// Requests shutdown on SIGINT (Ctrl+C) or SIGTERM.
///
/// The returned task must be aborted once the run is over.
fn spawn_shutdown_listener(shutdown_tx: ShutdownTx) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(error = %err, "failed to listen for ctrl+c, shutdown only by completion");
                    return;
                }
                info!("sigint (ctrl+c) received, shutting down");
            }
            _ = terminate() => {
                info!("sigterm received, shutting down");
            }
        }

        shutdown_tx.shutdown();
    })
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(err) => {
            warn!(error = %err, "failed to register sigterm handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
