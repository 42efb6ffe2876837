use pgload_config::shared::{DEFAULT_SESSION_OPTIONS, IntoConnectOptions, PgConnectionConfig};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, LoadError, LoadResult};
use crate::mapping::ParameterList;
use crate::sink::Sink;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Sink executing a parameterized statement once per mapped row.
///
/// Each position of the [`ParameterList`] is bound as nullable text to the placeholder with the
/// same ordinal (`$1`, `$2`, ...). Absent positions are bound as `NULL`. Parameters are typed
/// `text`, so statements writing other column types need explicit casts such as `$2::int`.
#[derive(Debug, Clone)]
pub struct PostgresSink {
    pool: PgPool,
    statement: Arc<str>,
    table_name: Arc<str>,
}

impl PostgresSink {
    /// Connects a pool sized for `max_connections` concurrent workers.
    ///
    /// The connection is established eagerly so that unreachable servers and bad credentials
    /// fail the run before any row is enqueued.
    pub async fn connect(
        config: &PgConnectionConfig,
        max_connections: u32,
        statement: &str,
        table_name: &str,
    ) -> LoadResult<Self> {
        let options = config.with_db(Some(&*DEFAULT_SESSION_OPTIONS));

        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            max_connections,
            "connected to postgres"
        );

        Self::from_pool(pool, statement, table_name)
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool, statement: &str, table_name: &str) -> LoadResult<Self> {
        if statement.trim().is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "The statement to execute is empty",
                format!("No statement was configured for table '{table_name}'")
            );
        }

        Ok(Self {
            pool,
            statement: Arc::from(statement),
            table_name: Arc::from(table_name),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes the pool, waiting for checked out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl Sink for PostgresSink {
    type Unit = ParameterList;

    fn name() -> &'static str {
        "postgres"
    }

    async fn apply(&self, unit: &ParameterList) -> LoadResult<()> {
        let mut query = sqlx::query(&self.statement);
        for parameter in unit.iter() {
            query = query.bind(parameter.as_deref());
        }

        let result = match query.execute(&self.pool).await {
            Ok(result) => result,
            Err(err) => {
                let err = LoadError::from(err);
                debug!(table = %self.table_name, kind = ?err.kind(), "statement failed");

                return Err(err);
            }
        };

        debug!(
            table = %self.table_name,
            rows_affected = result.rows_affected(),
            "statement executed"
        );

        Ok(())
    }
}
