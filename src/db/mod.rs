//! Store abstraction layer.
//!
//! Provides a backend-agnostic [`Store`] trait that hands out [`Session`]s.
//! A session is one connection; every step of a single record operation runs
//! on the same session so a write and its confirmatory read observe each
//! other. Two implementations exist behind feature flags:
//!
//! - `postgres` (default): Uses `deadpool-postgres` + `tokio-postgres`
//! - `libsql` (default): Uses libSQL (SQLite fork) for embedded deployment
//!
//! Callers never use a session directly; [`executor::Executor`] wraps one and
//! folds every error into a [`executor::RawOutcome`].

pub mod executor;
pub mod query;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "libsql")]
pub mod libsql;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DatabaseError;

pub use executor::{Executor, RawOutcome, StoreFailure};
pub use query::{JoinStrategy, ListVariant, Query, SqlValue};

/// Create a store from configuration and return it.
///
/// The libSQL schema is created when `init_schema` is set; nothing is created
/// for PostgreSQL.
pub async fn connect_from_config(
    config: &crate::config::DatabaseConfig,
) -> Result<Arc<dyn Store>, DatabaseError> {
    match config.backend {
        #[cfg(feature = "libsql")]
        crate::config::DatabaseBackend::LibSql => {
            let backend = libsql::LibSqlBackend::new_local(&config.libsql_path).await?;
            if config.init_schema {
                backend.ensure_schema().await?;
            }
            Ok(Arc::new(backend))
        }
        #[cfg(feature = "postgres")]
        crate::config::DatabaseBackend::Postgres => {
            let pg = postgres::PgBackend::new(config).await?;
            Ok(Arc::new(pg))
        }
        #[allow(unreachable_patterns)]
        other => Err(DatabaseError::Pool(format!(
            "backend '{}' is not compiled in; enable the '{}' feature",
            other.as_str(),
            other.as_str()
        ))),
    }
}

/// One decoded result row: column names paired with values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}

/// Result of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub affected: u64,
    /// Store-assigned identifier, reported for inserts only.
    pub generated_id: Option<i64>,
}

/// One store connection.
#[async_trait]
pub trait Session: Send + Sync {
    /// Run a `SELECT` and decode all rows.
    async fn fetch(&self, query: &Query) -> Result<Vec<Row>, DatabaseError>;

    /// Run an `INSERT`, `UPDATE` or `DELETE`.
    async fn write(&self, query: &Query) -> Result<WriteSummary, DatabaseError>;
}

/// Backend-agnostic store handle, constructed once at startup.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Acquire a session for one logical operation.
    async fn session(&self) -> Result<Box<dyn Session>, DatabaseError>;

    /// Stop handing out sessions and release backend resources.
    async fn close(&self);
}
