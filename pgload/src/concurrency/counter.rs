//! Shared counter of successfully completed units.
//!
//! Two interchangeable disciplines exist so their cost can be compared: [`LockedCounter`]
//! serializes increments through a mutex and [`AtomicCounter`] uses a fetch-and-add. Both are
//! linearizable, no increment is ever lost.

use pgload_config::shared::CounterDiscipline;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A monotonically increasing count shared by all workers of a run.
pub trait CompletionCounter: fmt::Debug + Send + Sync {
    /// Adds one completed unit.
    fn increment(&self);

    /// Returns the current count.
    ///
    /// Once all workers have finished, this is the exact number of successful units.
    fn value(&self) -> u64;

    fn discipline(&self) -> CounterDiscipline;
}

pub type SharedCounter = Arc<dyn CompletionCounter>;

/// Creates a fresh counter starting at zero for a single run.
pub fn new_counter(discipline: CounterDiscipline) -> SharedCounter {
    match discipline {
        CounterDiscipline::Locked => Arc::new(LockedCounter::default()),
        CounterDiscipline::Atomic => Arc::new(AtomicCounter::default()),
    }
}

#[derive(Debug, Default)]
pub struct LockedCounter {
    count: Mutex<u64>,
}

impl CompletionCounter for LockedCounter {
    fn increment(&self) {
        // A panic while holding the guard cannot leave a partially written integer behind.
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
    }

    fn value(&self) -> u64 {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn discipline(&self) -> CounterDiscipline {
        CounterDiscipline::Locked
    }
}

#[derive(Debug, Default)]
pub struct AtomicCounter {
    count: AtomicU64,
}

impl CompletionCounter for AtomicCounter {
    fn increment(&self) {
        // Nothing is published through the counter, readers only look at it after joining.
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn value(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn discipline(&self) -> CounterDiscipline {
        CounterDiscipline::Atomic
    }
}
