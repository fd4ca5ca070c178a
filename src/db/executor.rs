//! Executor adapter: runs one [`Query`] on a session and normalizes the
//! result into a [`RawOutcome`].
//!
//! Store errors never escape as `Err`; they become
//! [`RawOutcome::Failed`] carrying the underlying detail text.

use std::fmt;

use super::query::{Query, Statement};
use super::{Row, Session, Store};

/// The store refused or failed to run a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub detail: String,
}

impl StoreFailure {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl From<crate::error::DatabaseError> for StoreFailure {
    fn from(e: crate::error::DatabaseError) -> Self {
        Self::new(e.to_string())
    }
}

/// Normalized result of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    /// Rows produced by a `SELECT`, possibly none.
    Rows(Vec<Row>),
    /// A write ran. `generated_id` is set for inserts only.
    Written {
        affected: u64,
        generated_id: Option<i64>,
    },
    Failed(StoreFailure),
}

/// Runs queries on a single session.
///
/// One executor is opened per logical record operation; every statement it
/// runs shares the session's connection, so a read issued after a write
/// sees that write.
pub struct Executor {
    session: Box<dyn Session>,
}

impl Executor {
    /// Acquire a session from `store`.
    pub async fn open(store: &dyn Store) -> Result<Self, StoreFailure> {
        match store.session().await {
            Ok(session) => Ok(Self { session }),
            Err(e) => {
                tracing::warn!(backend = store.backend_name(), error = %e, "Failed to acquire store session");
                Err(e.into())
            }
        }
    }

    /// Wrap an existing session.
    pub fn with_session(session: Box<dyn Session>) -> Self {
        Self { session }
    }

    /// Run `query` and normalize the result.
    pub async fn execute(&self, query: &Query) -> RawOutcome {
        tracing::debug!(
            statement = query.statement.as_str(),
            params = query.params.len(),
            "Executing query"
        );

        let outcome = match query.statement {
            Statement::Select => match self.session.fetch(query).await {
                Ok(rows) => RawOutcome::Rows(rows),
                Err(e) => RawOutcome::Failed(e.into()),
            },
            Statement::Insert { .. } | Statement::Update | Statement::Delete => {
                match self.session.write(query).await {
                    Ok(summary) => RawOutcome::Written {
                        affected: summary.affected,
                        generated_id: match query.statement {
                            Statement::Insert { .. } => summary.generated_id,
                            _ => None,
                        },
                    },
                    Err(e) => RawOutcome::Failed(e.into()),
                }
            }
        };

        if let RawOutcome::Failed(failure) = &outcome {
            tracing::warn!(
                statement = query.statement.as_str(),
                error = %failure,
                "Query failed"
            );
        }
        outcome
    }
}
