//! Error types and result definitions for loader operations.
//!
//! [`LoadError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, an optional source error and the call site that created it. Errors coming
//! from several workers can be aggregated into a single [`LoadError`].

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used by every fallible loader operation.
pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the loader.
#[derive(Debug, Clone)]
pub struct LoadError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Failures collected from several workers.
    Many {
        errors: Vec<LoadError>,
        location: &'static Location<'static>,
    },
}

/// Classification of loader errors.
///
/// Sink kinds describe per-unit failures, which are logged and counted but never abort a run.
/// Configuration, input and connection kinds are raised before any worker starts.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Startup
    ConfigError,
    InputIoError,
    InputParseError,
    SinkConnectionFailed,

    // Per-unit sink failures
    SinkQueryFailed,
    SinkConstraintViolation,
    SinkConversionError,
    SinkRequestFailed,
    SinkTimeout,
    SinkSimulatedFailure,
    AuthenticationError,

    // Coordination
    QueueClosed,
    WorkerPanic,

    Unknown,

    /// Used by fault injection in tests.
    #[cfg(feature = "failpoints")]
    InjectedFailure,
}

impl LoadError {
    /// Returns the kind of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.kind,
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every kind contained in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match &self.repr {
            ErrorRepr::Single(payload) => vec![payload.kind],
            ErrorRepr::Many { errors, .. } => errors.iter().flat_map(|err| err.kinds()).collect(),
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.detail.as_deref(),
            ErrorRepr::Many { errors, .. } => errors.iter().find_map(|err| err.detail()),
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match &self.repr {
            ErrorRepr::Single(payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Attaches the originating error. No effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        LoadError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn with_detail_and_source<E>(kind: ErrorKind, description: &'static str, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = source.to_string();
        LoadError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(source)),
        )
    }
}

impl PartialEq for LoadError {
    fn eq(&self, other: &LoadError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write_block(f, "Detail", detail)?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_block(f, "Backtrace", &backtrace)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, title: &str, body: &str) -> fmt::Result {
    if body.trim().is_empty() {
        return write!(f, "\n  {title}: <empty>");
    }

    write!(f, "\n  {title}:")?;
    for line in body.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for LoadError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> LoadError {
        LoadError::from_components(kind, Cow::Borrowed(description), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for LoadError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> LoadError {
        LoadError::from_components(kind, Cow::Borrowed(description), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is.
impl<E> From<Vec<E>> for LoadError
where
    E: Into<LoadError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> LoadError {
        let location = Location::caller();
        let mut errors: Vec<LoadError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        LoadError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for LoadError {
    #[track_caller]
    fn from(err: std::io::Error) -> LoadError {
        LoadError::with_detail_and_source(ErrorKind::InputIoError, "I/O operation failed", err)
    }
}

impl From<csv::Error> for LoadError {
    #[track_caller]
    fn from(err: csv::Error) -> LoadError {
        let (kind, description) = match err.kind() {
            csv::ErrorKind::Io(_) => (ErrorKind::InputIoError, "CSV input could not be read"),
            _ => (ErrorKind::InputParseError, "CSV input could not be parsed"),
        };

        LoadError::with_detail_and_source(kind, description, err)
    }
}

/// Classifies [`sqlx::Error`] using the SQLSTATE class of database errors.
impl From<sqlx::Error> for LoadError {
    #[track_caller]
    fn from(err: sqlx::Error) -> LoadError {
        let (kind, description) = match &err {
            sqlx::Error::Database(database_error) => {
                let code = database_error.code().unwrap_or_default();
                match code.get(..2).unwrap_or_default() {
                    // Integrity constraint violation.
                    "23" => (
                        ErrorKind::SinkConstraintViolation,
                        "PostgreSQL constraint violation",
                    ),
                    // Data exception.
                    "22" => (
                        ErrorKind::SinkConversionError,
                        "PostgreSQL data conversion failed",
                    ),
                    // Connection exception and insufficient resources.
                    "08" | "53" => (
                        ErrorKind::SinkConnectionFailed,
                        "PostgreSQL connection failed",
                    ),
                    // Invalid authorization specification.
                    "28" => (
                        ErrorKind::AuthenticationError,
                        "PostgreSQL authentication failed",
                    ),
                    // Query canceled, usually by `statement_timeout`.
                    "57" if code == "57014" => {
                        (ErrorKind::SinkTimeout, "PostgreSQL statement timed out")
                    }
                    _ => (ErrorKind::SinkQueryFailed, "PostgreSQL statement failed"),
                }
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => (
                ErrorKind::SinkConnectionFailed,
                "PostgreSQL connection failed",
            ),
            sqlx::Error::PoolTimedOut => (
                ErrorKind::SinkTimeout,
                "Timed out acquiring a PostgreSQL connection",
            ),
            sqlx::Error::PoolClosed => (
                ErrorKind::SinkConnectionFailed,
                "PostgreSQL connection pool is closed",
            ),
            sqlx::Error::Configuration(_) => {
                (ErrorKind::ConfigError, "PostgreSQL configuration is invalid")
            }
            _ => (ErrorKind::SinkQueryFailed, "PostgreSQL operation failed"),
        };

        LoadError::with_detail_and_source(kind, description, err)
    }
}

impl From<reqwest::Error> for LoadError {
    #[track_caller]
    fn from(err: reqwest::Error) -> LoadError {
        let (kind, description) = if err.is_timeout() {
            (ErrorKind::SinkTimeout, "HTTP request timed out")
        } else if err.is_connect() {
            (ErrorKind::SinkConnectionFailed, "HTTP connection failed")
        } else if err.is_builder() {
            (ErrorKind::ConfigError, "HTTP client configuration is invalid")
        } else {
            (ErrorKind::SinkRequestFailed, "HTTP request failed")
        };

        LoadError::with_detail_and_source(kind, description, err)
    }
}
