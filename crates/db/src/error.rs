//! Store-level failures.

use std::time::Duration;

use thiserror::Error;

/// Faults raised by the data-access layer.
///
/// Expected outcomes (absent records, no-op writes) are not errors; they are
/// carried by `Option` and [`crate::SaveOutcome`] instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("referential integrity violated: {0}")]
    ReferentialIntegrity(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("column '{column}' is not mapped on table '{table}'")]
    UnknownColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("migration {module}/{id} failed")]
    Migration {
        module: String,
        id: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error(transparent)]
    Database(sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Constraint violations are caused by the caller's data, not by the store.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::ReferentialIntegrity(_) | StoreError::UniqueViolation(_)
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_foreign_key_violation() {
                return StoreError::ReferentialIntegrity(db_err.message().to_string());
            }
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(db_err.message().to_string());
            }
        }

        match err {
            unavailable @ (sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)) => StoreError::Unavailable(unavailable),
            other => StoreError::Database(other),
        }
    }
}
