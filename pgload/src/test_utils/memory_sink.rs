use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::sink::Sink;

type FailurePredicate<U> = Arc<dyn Fn(&U) -> bool + Send + Sync>;

#[derive(Debug)]
struct Inner<U> {
    applied: Vec<U>,
    attempts: u64,
}

/// In-memory sink for tests.
///
/// Every successfully applied unit is recorded and can be inspected with
/// [`MemorySink::applied`]. Units matching the failure predicate are rejected with
/// [`ErrorKind::SinkQueryFailed`] and not recorded.
pub struct MemorySink<U> {
    inner: Arc<Mutex<Inner<U>>>,
    fail_when: Option<FailurePredicate<U>>,
    latency: Duration,
}

impl<U> MemorySink<U>
where
    U: Clone + fmt::Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                applied: Vec::new(),
                attempts: 0,
            })),
            fail_when: None,
            latency: Duration::ZERO,
        }
    }

    /// Fails every unit for which `predicate` returns `true`.
    pub fn failing_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&U) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Arc::new(predicate));
        self
    }

    /// Sleeps for `latency` before handling each unit.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns a copy of the units applied so far, in completion order.
    pub async fn applied(&self) -> Vec<U> {
        let inner = self.inner.lock().await;
        inner.applied.clone()
    }

    /// Returns how many times [`Sink::apply`] was called, failed calls included.
    pub async fn attempts(&self) -> u64 {
        let inner = self.inner.lock().await;
        inner.attempts
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.applied.clear();
        inner.attempts = 0;
    }
}

impl<U> Default for MemorySink<U>
where
    U: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<U> Clone for MemorySink<U> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            fail_when: self.fail_when.clone(),
            latency: self.latency,
        }
    }
}

impl<U> fmt::Debug for MemorySink<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySink")
            .field("fails_units", &self.fail_when.is_some())
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl<U> Sink for MemorySink<U>
where
    U: Clone + fmt::Debug + Send + Sync + 'static,
{
    type Unit = U;

    fn name() -> &'static str {
        "memory"
    }

    async fn apply(&self, unit: &U) -> LoadResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut inner = self.inner.lock().await;
        inner.attempts += 1;

        if let Some(fail_when) = &self.fail_when
            && fail_when(unit)
        {
            bail!(
                ErrorKind::SinkQueryFailed,
                "The memory sink rejected the unit",
                format!("{unit:?}")
            );
        }

        info!(?unit, "applying unit");
        inner.applied.push(unit.clone());

        Ok(())
    }
}
