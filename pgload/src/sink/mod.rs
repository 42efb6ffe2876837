//! Sinks applying one unit of work to an external system.
//!
//! This module provides the [`Sink`] trait driven by the worker pool, and the implementations
//! used by the loader ([`postgres::PostgresSink`]) and the benchmark ([`http::HttpSink`],
//! [`simulated::SimulatedSink`]).

mod base;
pub mod http;
pub mod postgres;
pub mod simulated;

pub use base::Sink;
