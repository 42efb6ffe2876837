use thiserror::Error;

/// Configuration validation errors.
///
/// These are raised before any worker is spawned and abort the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,

    #[error("`queue.capacity` cannot be zero, use the `rendezvous` mode instead")]
    BoundedQueueCapacityZero,

    #[error("`sink_timeout_ms` cannot be zero")]
    SinkTimeoutZero,

    #[error("`sql_statement` cannot be empty")]
    EmptyStatement,

    #[error("`column_mapping` and `custom_mapping` cannot both be empty")]
    EmptyMapping,

    #[error(
        "column `{column}` maps index {index}, which is outside the {mapped} mapped positions"
    )]
    ColumnIndexOutOfRange {
        column: String,
        index: usize,
        mapped: usize,
    },

    #[error("`csv.delimiter` must be a single ASCII character, got `{0}`")]
    InvalidDelimiter(String),
}
