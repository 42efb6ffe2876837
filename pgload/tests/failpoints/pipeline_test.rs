use fail::FailScenario;
use pgload::error::ErrorKind;
use pgload::failpoints::{PIPELINE__BEFORE_ENQUEUE, WORKER__BEFORE_SINK_APPLY};
use pgload::pipeline::Pipeline;
use pgload::test_utils::memory_sink::MemorySink;
use pgload_config::shared::{CounterDiscipline, PipelineConfig, QueueCapacity};
use pgload_telemetry::tracing::init_test_tracing;

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        no_of_workers: 4,
        queue: QueueCapacity::Bounded { capacity: 10 },
        counter: CounterDiscipline::Atomic,
        sink_timeout_ms: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_sink_failures_are_counted_as_failed() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    fail::cfg(WORKER__BEFORE_SINK_APPLY, "return(query)").unwrap();

    let sink = MemorySink::<u32>::new();
    let report = Pipeline::new(pipeline_config(), sink.clone())
        .run(1..=8)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 8);
    assert_eq!(sink.attempts().await, 0);

    scenario.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn a_limited_number_of_failures_leaves_the_rest_counted() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    fail::cfg(WORKER__BEFORE_SINK_APPLY, "3*return").unwrap();

    let sink = MemorySink::<u32>::new();
    let report = Pipeline::new(pipeline_config(), sink.clone())
        .run(1..=10)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 7);
    assert_eq!(report.failed, 3);
    assert_eq!(sink.applied().await.len(), 7);

    scenario.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn enqueue_failure_aborts_the_run() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    fail::cfg(PIPELINE__BEFORE_ENQUEUE, "return").unwrap();

    let err = Pipeline::new(pipeline_config(), MemorySink::<u32>::new())
        .run(1..=10)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InjectedFailure);

    scenario.teardown();
}
