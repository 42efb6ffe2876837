//! Metrics definitions for loader monitoring.
//!
//! Values are recorded through the [`metrics`] facade. Without an installed recorder they are
//! discarded.

/// Label for the sink name in metrics.
pub const SINK_LABEL: &str = "sink";

/// Label for the counter discipline in metrics.
pub const COUNTER_DISCIPLINE_LABEL: &str = "counter_discipline";

/// Label for the queue capacity in metrics.
pub const QUEUE_CAPACITY_LABEL: &str = "queue_capacity";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter for units handed to the work queue.
pub const PGLOAD_UNITS_ENQUEUED_TOTAL: &str = "pgload_units_enqueued_total";

/// Counter for units the sink applied successfully.
pub const PGLOAD_UNITS_SUCCEEDED_TOTAL: &str = "pgload_units_succeeded_total";

/// Counter for units the sink failed to apply.
pub const PGLOAD_UNITS_FAILED_TOTAL: &str = "pgload_units_failed_total";

/// Counter for input rows dropped before reaching the queue.
pub const PGLOAD_ROWS_SKIPPED_TOTAL: &str = "pgload_rows_skipped_total";

/// Histogram for the duration of a single sink call.
pub const PGLOAD_SINK_CALL_DURATION_SECONDS: &str = "pgload_sink_call_duration_seconds";

/// Histogram for the duration of a complete pipeline run.
pub const PGLOAD_RUN_DURATION_SECONDS: &str = "pgload_run_duration_seconds";
