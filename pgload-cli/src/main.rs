//! pgload binary.
//!
//! `pgload load` reads a CSV file and inserts every row into Postgres through a pool of
//! workers. `pgload bench` compares the counter disciplines and queue capacities of the same
//! pipeline on a latency bound workload.

use clap::Parser;
use pgload_config::shared::LoaderConfig;
use pgload_config::{Environment, load_config, load_config_from_file};
use pgload_telemetry::tracing::init_tracing;
use std::process::ExitCode;
use tracing::error;

use crate::cli::{Cli, Command, LoadArgs};
use crate::core::{start_benchmark, start_load_with_config};
use crate::error::{CliError, CliResult};

mod cli;
mod core;
mod error;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let environment = Environment::load().map_err(CliError::Environment)?;
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), environment)?;

    let result = match cli.command {
        Command::Load(args) => {
            // Bad settings fail before the runtime is started.
            let config = load_loader_config(&args)?;
            build_runtime()?.block_on(start_load_with_config(config))
        }
        Command::Bench(args) => build_runtime()?.block_on(start_benchmark(args)),
    };

    if let Err(err) = &result {
        error!("{err}");
    }

    result
}

fn build_runtime() -> CliResult<tokio::runtime::Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    Ok(runtime)
}

/// Loads and validates the loader configuration.
fn load_loader_config(args: &LoadArgs) -> CliResult<LoaderConfig> {
    let config = match &args.config {
        Some(path) => load_config_from_file::<LoaderConfig>(path)?,
        None => load_config::<LoaderConfig>()?,
    };
    config.validate()?;

    Ok(config)
}
