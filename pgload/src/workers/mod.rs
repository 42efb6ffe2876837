//! Workers draining the work queue into a sink.

pub mod pool;
pub mod worker;

pub use pool::{PoolStats, WorkerPool};
pub use worker::{LoadWorker, WorkerStats};
