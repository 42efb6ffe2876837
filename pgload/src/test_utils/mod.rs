//! Utilities for testing pipelines without external systems.
//!
//! - [`memory_sink`] provides [`memory_sink::MemorySink`], a sink recording every applied unit
//!   with optional per-unit failures and latency.
//! - [`database`] creates and drops isolated Postgres databases for tests that need a real
//!   server. Connection settings are read from `TESTS_DATABASE_*` environment variables.

pub mod database;
pub mod memory_sink;
