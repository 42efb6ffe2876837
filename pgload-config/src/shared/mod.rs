//! Configuration types shared by the pipeline crate and the binary.

mod base;
mod connection;
mod loader;
mod pipeline;

pub use base::ValidationError;
pub use connection::{
    DEFAULT_SESSION_OPTIONS, IntoConnectOptions, PgConnectionConfig, PgSessionOptions, TlsConfig,
};
pub use loader::{CsvConfig, LoaderConfig, MappingConfig, MissingColumnPolicy};
pub use pipeline::{CounterDiscipline, DEFAULT_WORKER_COUNT, PipelineConfig, QueueCapacity};
