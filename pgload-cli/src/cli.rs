use clap::{Args, Parser, Subcommand, ValueEnum};
use pgload::benchmark::{
    DEFAULT_BENCHMARK_BUFFER, DEFAULT_BENCHMARK_JOBS, DEFAULT_BENCHMARK_WORKERS,
};
use pgload::sink::http::DEFAULT_HTTP_SINK_URL;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the configured CSV file into Postgres
    Load(LoadArgs),
    /// Compare the mutex and atomic counters with an unbuffered and a buffered queue
    Bench(BenchArgs),
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Configuration file (json or yaml). Without it, `configuration/base` and
    /// `configuration/{APP_ENVIRONMENT}` are loaded
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchSink {
    /// Sleep instead of calling a remote service
    Simulated,
    /// Issue a GET request per job
    Http,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Workers per run, values <= 0 fall back to the pipeline default
    #[arg(long, default_value_t = DEFAULT_BENCHMARK_WORKERS, allow_negative_numbers = true)]
    pub workers: i64,

    /// Jobs per run
    #[arg(long, default_value_t = DEFAULT_BENCHMARK_JOBS)]
    pub jobs: u64,

    /// Queue capacity of the buffered runs
    #[arg(long, default_value_t = DEFAULT_BENCHMARK_BUFFER)]
    pub buffer: usize,

    /// Sink each job is applied to
    #[arg(long, value_enum, default_value = "simulated")]
    pub sink: BenchSink,

    /// Latency of a simulated call in milliseconds
    #[arg(long, default_value = "2000")]
    pub latency_ms: u64,

    /// Upper bound of a uniformly random simulated latency, fixed latency when absent
    #[arg(long)]
    pub max_latency_ms: Option<u64>,

    /// Probability for a simulated call to fail
    #[arg(long, default_value = "0")]
    pub failure_rate: f64,

    /// URL requested by the http sink
    #[arg(long, default_value = DEFAULT_HTTP_SINK_URL)]
    pub url: String,

    /// Pause between two runs in milliseconds
    #[arg(long, default_value = "3000")]
    pub pause_ms: u64,

    /// Upper bound for a single sink call in milliseconds
    #[arg(long)]
    pub sink_timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bench_defaults_match_the_classic_setup() {
        let cli = Cli::parse_from(["pgload", "bench"]);

        let Command::Bench(args) = cli.command else {
            panic!("expected the bench command");
        };
        assert_eq!(args.workers, 10);
        assert_eq!(args.jobs, 10);
        assert_eq!(args.buffer, 10);
        assert_eq!(args.sink, BenchSink::Simulated);
        assert_eq!(args.pause_ms, 3000);
    }

    #[test]
    fn load_accepts_an_explicit_config_file() {
        let cli = Cli::parse_from(["pgload", "load", "--config", "config.json"]);

        let Command::Load(args) = cli.command else {
            panic!("expected the load command");
        };
        assert_eq!(args.config, Some(PathBuf::from("config.json")));
    }
}
