//! Configuration types and loading for pgload.
//!
//! The types in [`shared`] are consumed read-only by the pipeline crate, while [`load_config`]
//! and [`load_config_from_file`] turn configuration files and environment variables into them.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from_file};
