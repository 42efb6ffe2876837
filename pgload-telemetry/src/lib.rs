//! Logging setup shared by the pgload binary and tests.

pub mod tracing;
