use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::shared::ValidationError;

/// Worker count used when the configured value is zero or negative.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Buffer size used when no queue configuration is given.
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Capacity discipline of the work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueueCapacity {
    /// Zero capacity, every enqueue waits until a worker takes the unit.
    Rendezvous,
    /// Up to `capacity` units may wait in the queue before enqueue blocks.
    Bounded { capacity: usize },
}

impl QueueCapacity {
    /// Number of units the queue can hold without a consumer, `0` for rendezvous.
    pub fn buffered_units(&self) -> usize {
        match self {
            QueueCapacity::Rendezvous => 0,
            QueueCapacity::Bounded { capacity } => *capacity,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let QueueCapacity::Bounded { capacity: 0 } = self {
            return Err(ValidationError::BoundedQueueCapacityZero);
        }

        Ok(())
    }
}

impl Default for QueueCapacity {
    fn default() -> Self {
        QueueCapacity::Bounded {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl fmt::Display for QueueCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueCapacity::Rendezvous => f.write_str("unbuffered"),
            QueueCapacity::Bounded { capacity } => write!(f, "buffered({capacity})"),
        }
    }
}

/// How the completed-unit counter is synchronized across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterDiscipline {
    /// Increments go through an exclusive lock.
    #[default]
    Locked,
    /// Increments are atomic fetch-and-add operations.
    Atomic,
}

impl fmt::Display for CounterDiscipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterDiscipline::Locked => f.write_str("mutex"),
            CounterDiscipline::Atomic => f.write_str("atomic"),
        }
    }
}

/// Settings of the worker pool and its queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Requested number of workers. Values `<= 0` resolve to [`DEFAULT_WORKER_COUNT`].
    #[serde(default)]
    pub no_of_workers: i64,
    #[serde(default)]
    pub queue: QueueCapacity,
    #[serde(default)]
    pub counter: CounterDiscipline,
    /// Upper bound for a single sink call, unbounded when absent.
    #[serde(default)]
    pub sink_timeout_ms: Option<u64>,
}

impl PipelineConfig {
    /// Returns the number of workers the pool actually spawns.
    pub fn effective_workers(&self) -> NonZeroUsize {
        resolve_worker_count(self.no_of_workers)
    }

    pub fn sink_timeout(&self) -> Option<Duration> {
        self.sink_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.queue.validate()?;

        if self.sink_timeout_ms == Some(0) {
            return Err(ValidationError::SinkTimeoutZero);
        }

        Ok(())
    }
}

fn resolve_worker_count(configured: i64) -> NonZeroUsize {
    usize::try_from(configured)
        .ok()
        .and_then(NonZeroUsize::new)
        .or_else(|| NonZeroUsize::new(DEFAULT_WORKER_COUNT))
        .unwrap_or(NonZeroUsize::MIN)
}
