use pgload::error::LoadError;
use pgload_config::LoadConfigError;
use pgload_config::shared::ValidationError;
use pgload_telemetry::tracing::TracingError;
use std::error::Error;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

/// Errors ending the process with a non-zero exit code.
///
/// Per-unit sink failures never surface here, they are part of the completion report.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] LoadConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("environment error: {0}")]
    Environment(#[source] std::io::Error),

    #[error("logging setup failed: {0}")]
    Tracing(#[from] TracingError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Load(#[from] LoadError),
}

impl CliError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Config(_) | CliError::Validation(_) | CliError::Environment(_) => {
                "configuration error"
            }
            CliError::Tracing(_) => "logging error",
            CliError::Io(_) => "i/o error",
            CliError::Load(_) => "load error",
        }
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("pgload failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        // Load errors render their own detail and backtrace.
        if !matches!(self, CliError::Load(_)) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        out
    }
}
