use std::fmt;
use std::future::Future;

use crate::error::LoadResult;

/// Side-effecting operation invoked once per unit of work.
///
/// A single [`Sink`] value is cloned into every worker of a run, so clones must share the
/// underlying resources (connection pools, HTTP clients) and be safe to use concurrently.
///
/// A failed [`Sink::apply`] is reported and counted by the worker and never retried. Effects
/// of successful calls are not rolled back when other units fail.
pub trait Sink: Clone + Send + Sync + 'static {
    /// The unit of work this sink consumes.
    type Unit: fmt::Debug + Send + Sync + 'static;

    /// Returns the name of the sink.
    fn name() -> &'static str;

    /// Applies a single unit.
    fn apply(&self, unit: &Self::Unit) -> impl Future<Output = LoadResult<()>> + Send;
}
