use pgload::input::read_csv;
use pgload::mapping::RowMapper;
use pgload::pipeline::Pipeline;
use pgload::sink::postgres::PostgresSink;
use pgload::test_utils::database::{create_pg_database, drop_pg_database, local_pg_connection_config};
use pgload_config::shared::{
    CounterDiscipline, CsvConfig, MappingConfig, MissingColumnPolicy, PipelineConfig,
    QueueCapacity,
};
use pgload_telemetry::tracing::init_test_tracing;
use std::collections::BTreeMap;

#[ignore = "requires a Postgres server configured through TESTS_DATABASE_* variables"]
#[tokio::test(flavor = "multi_thread")]
async fn rows_are_inserted_with_nulls_for_missing_fields() {
    init_test_tracing();

    let config = local_pg_connection_config();
    let pool = create_pg_database(&config).await;
    sqlx::query("create table users (id int primary key, name text, email text, source text)")
        .execute(&pool)
        .await
        .unwrap();

    let mapping = MappingConfig {
        column_mapping: BTreeMap::from([
            ("email".to_string(), 2),
            ("id".to_string(), 0),
            ("name".to_string(), 1),
        ]),
        custom_mapping: BTreeMap::from([("source".to_string(), "import".to_string())]),
        missing_column_policy: MissingColumnPolicy::BindNull,
    };
    let rows = read_csv(
        "1,Ada,ada@example.com\n2,Grace\n3,Linus,linus@example.com\n1,Duplicate,d@example.com\n"
            .as_bytes(),
        &CsvConfig::default(),
    )
    .unwrap();

    let pipeline_config = PipelineConfig {
        no_of_workers: 3,
        queue: QueueCapacity::Rendezvous,
        counter: CounterDiscipline::Atomic,
        sink_timeout_ms: Some(10_000),
    };
    let sink = PostgresSink::connect(
        &config,
        pipeline_config.effective_workers().get() as u32,
        "insert into users (id, name, email, source) values ($1::int, $2, $3, $4)",
        "users",
    )
    .await
    .unwrap();

    let report = Pipeline::new(pipeline_config, sink.clone())
        .load_rows(&rows, &RowMapper::new(&mapping))
        .await
        .unwrap();

    // One of the two rows with id 1 violates the primary key.
    assert_eq!(report.enqueued, 4);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 1);

    let count: i64 = sqlx::query_scalar("select count(*) from users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 3);

    let email: Option<String> = sqlx::query_scalar("select email from users where id = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(email, None);

    sink.close().await;
    pool.close().await;
    drop_pg_database(&config).await;
}
