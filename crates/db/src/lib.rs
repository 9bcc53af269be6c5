//! SQLite data access for the bookstore: connection factory, migration
//! runner and the generic repository contract shared by every entity.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub mod error;
pub mod migrate;
pub mod repository;

pub use error::{StoreError, StoreResult};
pub use migrate::Migration;
pub use repository::{
    Entity, FieldValue, Repository, RepositoryArc, SaveOutcome, SqlRepository, UnitOfWork,
};

const IN_MEMORY_MARKER: &str = ":memory:";

/// Handle to the relational store. Cheap to clone; every clone shares the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    operation_timeout: Duration,
}

impl Database {
    /// Open a pool against `url`, creating the database file when missing.
    ///
    /// In-memory databases are pinned to a single long-lived connection, since
    /// every SQLite connection to `:memory:` would otherwise see its own empty
    /// database.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        operation_timeout: Duration,
    ) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(IN_MEMORY_MARKER);
        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(operation_timeout);
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(StoreError::Unavailable)?;

        tracing::info!(
            target: "bookstore-db",
            in_memory,
            max_connections,
            timeout_ms = operation_timeout.as_millis() as u64,
            "database pool ready"
        );

        Ok(Self {
            pool,
            operation_timeout,
        })
    }

    /// Private in-memory database, mostly for tests and one-off tooling.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:", 1, Duration::from_secs(5)).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Run a store round-trip under the configured per-operation timeout.
    pub async fn timed<F, R>(&self, operation: &'static str, fut: F) -> StoreResult<R>
    where
        F: Future<Output = Result<R, sqlx::Error>>,
    {
        with_timeout(self.operation_timeout, operation, fut).await
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) async fn with_timeout<F, R>(
    after: Duration,
    operation: &'static str,
    fut: F,
) -> StoreResult<R>
where
    F: Future<Output = Result<R, sqlx::Error>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout { operation, after }),
    }
}
