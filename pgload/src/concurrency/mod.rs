//! Coordination primitives of the loader pipeline.
//!
//! - [`queue`] is the single-producer, multi-consumer work queue between the driver and the
//!   workers, in rendezvous or bounded flavor.
//! - [`counter`] holds the completed-unit counter and its two synchronization disciplines.
//! - [`shutdown`] broadcasts cancellation to the driver and every worker.

pub mod counter;
pub mod queue;
pub mod shutdown;
