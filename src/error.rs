//! Error types shared across the crate.

/// Failures raised by a store backend.
///
/// These never cross the record-operations boundary: the executor adapter
/// folds every variant into a store-failure outcome.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("connection error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store is closed")]
    Closed,
}

#[cfg(feature = "libsql")]
impl From<libsql::Error> for DatabaseError {
    fn from(e: libsql::Error) -> Self {
        Self::Query(e.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DatabaseError {
    fn from(e: tokio_postgres::Error) -> Self {
        // The Display impl of a db error is just "db error"; surface the
        // server-side message instead.
        match e.as_db_error() {
            Some(db) => Self::Query(db.message().to_string()),
            None => Self::Query(e.to_string()),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<deadpool_postgres::PoolError> for DatabaseError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        Self::Pool(e.to_string())
    }
}

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {key}")]
    MissingRequired { key: String },

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// HTTP server lifecycle failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server failed to start: {reason}")]
    StartupFailed { reason: String },
}
