use pgload::input::read_csv_file;
use pgload::mapping::{Parameter, ParameterList, RowMapper};
use pgload::pipeline::Pipeline;
use pgload::test_utils::memory_sink::MemorySink;
use pgload_config::shared::{
    CounterDiscipline, CsvConfig, MappingConfig, MissingColumnPolicy, PipelineConfig,
    QueueCapacity,
};
use pgload_telemetry::tracing::init_test_tracing;
use std::collections::BTreeMap;
use std::io::Write;

fn users_mapping(policy: MissingColumnPolicy) -> MappingConfig {
    MappingConfig {
        column_mapping: BTreeMap::from([
            ("email".to_string(), 2),
            ("id".to_string(), 0),
            ("name".to_string(), 1),
        ]),
        custom_mapping: BTreeMap::from([("source".to_string(), "import".to_string())]),
        missing_column_policy: policy,
    }
}

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn text(value: &str) -> Parameter {
    Parameter::Value(value.to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn csv_file_is_loaded_through_the_worker_pool() {
    init_test_tracing();

    let file = write_csv("1,Ada,ada@example.com\n2,Grace\n3,Linus,linus@example.com\n,\n");
    let rows = read_csv_file(file.path(), &CsvConfig::default()).unwrap();
    let mapper = RowMapper::new(&users_mapping(MissingColumnPolicy::BindNull));

    let sink = MemorySink::<ParameterList>::new();
    let pipeline = Pipeline::new(
        PipelineConfig {
            no_of_workers: 0,
            queue: QueueCapacity::Bounded { capacity: 100 },
            counter: CounterDiscipline::Locked,
            sink_timeout_ms: None,
        },
        sink.clone(),
    );

    let report = pipeline.load_rows(&rows, &mapper).await.unwrap();

    assert_eq!(report.workers, 5);
    // The last record only holds empty fields, which are still values.
    assert_eq!(report.enqueued, 4);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.mapping_gaps, 2);

    let applied = sink.applied().await;
    assert_eq!(applied.len(), 4);

    let grace = applied
        .iter()
        .find(|parameters| parameters.get(0) == Some(&text("2")))
        .unwrap();
    assert_eq!(
        grace.iter().cloned().collect::<Vec<_>>(),
        vec![text("2"), text("Grace"), Parameter::Absent, text("import")]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn header_and_short_rows_are_skipped_under_skip_policy() {
    init_test_tracing();

    let file = write_csv("id;name;email\n1;Ada;ada@example.com\n2;Grace\n");
    let csv = CsvConfig {
        has_headers: true,
        delimiter: ";".to_string(),
    };
    let rows = read_csv_file(file.path(), &csv).unwrap();
    let mapper = RowMapper::new(&users_mapping(MissingColumnPolicy::SkipRow));

    let sink = MemorySink::<ParameterList>::new();
    let pipeline = Pipeline::new(
        PipelineConfig {
            no_of_workers: 2,
            queue: QueueCapacity::Rendezvous,
            counter: CounterDiscipline::Atomic,
            sink_timeout_ms: None,
        },
        sink.clone(),
    );

    let report = pipeline.load_rows(&rows, &mapper).await.unwrap();

    assert_eq!(report.enqueued, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        sink.applied().await[0].iter().cloned().collect::<Vec<_>>(),
        vec![text("1"), text("Ada"), text("ada@example.com"), text("import")]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_rows_do_not_stop_the_load() {
    init_test_tracing();

    let file = write_csv("1,Ada,a@x.io\n2,Grace,g@x.io\n3,Linus,l@x.io\n4,Barbara,b@x.io\n");
    let rows = read_csv_file(file.path(), &CsvConfig::default()).unwrap();
    let mapper = RowMapper::new(&users_mapping(MissingColumnPolicy::BindNull));

    let sink = MemorySink::<ParameterList>::new()
        .failing_when(|parameters| parameters.get(0) == Some(&Parameter::Value("3".to_string())));
    let pipeline = Pipeline::new(PipelineConfig::default(), sink.clone());

    let report = pipeline.load_rows(&rows, &mapper).await.unwrap();

    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 1);
    assert!(!report.cancelled);
}
