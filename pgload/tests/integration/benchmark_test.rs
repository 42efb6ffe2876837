use pgload::benchmark::{Benchmark, BenchmarkConfig, Job};
use pgload::sink::simulated::{LatencyProfile, SimulatedSink};
use pgload::test_utils::memory_sink::MemorySink;
use pgload_config::shared::{CounterDiscipline, QueueCapacity};
use pgload_telemetry::tracing::init_test_tracing;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn both_disciplines_count_every_job() {
    init_test_tracing();

    let sink = SimulatedSink::new(LatencyProfile::Fixed(Duration::from_secs(2)));
    let benchmark = Benchmark::new(BenchmarkConfig::default(), sink);

    let report = benchmark.run().await.unwrap();

    assert_eq!(report.runs.len(), 4);
    assert_eq!(report.total_for(CounterDiscipline::Locked), 20);
    assert_eq!(report.total_for(CounterDiscipline::Atomic), 20);

    // Ten workers take ten jobs at once, every run lasts a single call.
    for run in &report.runs {
        assert_eq!(run.workers, 10);
        assert!(run.elapsed >= Duration::from_secs(2));
        assert!(run.elapsed < Duration::from_secs(4));
    }
}

#[tokio::test(start_paused = true)]
async fn failed_jobs_are_excluded_from_the_totals() {
    init_test_tracing();

    let sink = MemorySink::<Job>::new().failing_when(|job| job.id % 2 == 0);
    let config = BenchmarkConfig {
        workers: 3,
        jobs: 6,
        buffer: 2,
        pause: Duration::from_millis(10),
        sink_timeout_ms: None,
    };
    let benchmark = Benchmark::new(config, sink.clone());

    let report = benchmark.run().await.unwrap();

    for run in &report.runs {
        assert_eq!(run.succeeded, 3);
        assert_eq!(run.failed, 3);
    }
    assert_eq!(report.runs[1].capacity, QueueCapacity::Bounded { capacity: 2 });
    assert_eq!(sink.attempts().await, 24);
}
