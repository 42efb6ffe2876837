//! Concurrent loading of CSV rows into Postgres through a pool of workers.
//!
//! Rows read by [`input`] are turned into positional parameter lists by [`mapping`] and pushed
//! by the [`pipeline`] driver through a work queue to a pool of [`workers`], each applying
//! units to a [`sink`] and counting successes in a shared counter from [`concurrency`].
//!
//! The same pipeline drives the [`benchmark`], which compares the lock-based and the atomic
//! counter under an unbuffered and a buffered queue.

pub mod benchmark;
pub mod concurrency;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod input;
mod macros;
pub mod mapping;
pub mod metrics;
pub mod pipeline;
pub mod sink;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod workers;
