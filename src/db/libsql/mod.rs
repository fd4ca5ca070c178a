//! libSQL/SQLite backend for the [`Store`] trait.
//!
//! Each session owns one connection from the shared `libsql::Database`.
//! The file runs in WAL mode and every connection waits up to
//! [`BUSY_TIMEOUT`] for a competing writer instead of failing with
//! `database is locked`.
//! SQLite keeps no type for dates, so they are stored as `YYYY-MM-DD` text.

mod schema;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use libsql::{Connection, Database};

use crate::db::query::{Placeholder, Query, SqlValue, Statement};
use crate::db::{Row, Session, Store, WriteSummary};
use crate::error::DatabaseError;

/// How long a connection waits on a locked database before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// libSQL store backend.
pub struct LibSqlBackend {
    db: Database,
    closed: AtomicBool,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("failed to open libSQL database: {e}")))?;

        let backend = Self {
            db,
            closed: AtomicBool::new(false),
        };
        backend.enable_wal().await?;

        tracing::info!(path = %path.display(), "Opened libSQL database");
        Ok(backend)
    }

    /// Readers no longer block the writer and vice versa. The mode is
    /// persistent, so one connection is enough.
    async fn enable_wal(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        // The pragma answers with the resulting mode as a row.
        let mut rows = conn.query("PRAGMA journal_mode = WAL", ()).await?;
        let mode = match rows.next().await? {
            Some(row) => row.get::<String>(0)?,
            None => String::new(),
        };
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(%mode, "libSQL database is not in WAL mode");
        }
        Ok(())
    }

    /// Open a new connection with foreign keys enforced and a busy timeout.
    pub async fn connect(&self) -> Result<Connection, DatabaseError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DatabaseError::Closed);
        }
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("failed to connect: {e}")))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        Ok(conn)
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(schema::SCHEMA).await?;
        tracing::info!("libSQL schema ready");
        Ok(())
    }
}

#[async_trait]
impl Store for LibSqlBackend {
    fn backend_name(&self) -> &'static str {
        "libsql"
    }

    async fn session(&self) -> Result<Box<dyn Session>, DatabaseError> {
        let conn = self.connect().await?;
        Ok(Box::new(LibSqlSession { conn }))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!("libSQL store closed");
        }
    }
}

struct LibSqlSession {
    conn: Connection,
}

fn to_libsql(value: &SqlValue) -> libsql::Value {
    match value {
        SqlValue::Null => libsql::Value::Null,
        SqlValue::Integer(v) => libsql::Value::Integer(*v),
        SqlValue::Real(v) => libsql::Value::Real(*v),
        SqlValue::Text(v) => libsql::Value::Text(v.clone()),
    }
}

fn from_libsql(value: libsql::Value) -> Result<SqlValue, DatabaseError> {
    match value {
        libsql::Value::Null => Ok(SqlValue::Null),
        libsql::Value::Integer(v) => Ok(SqlValue::Integer(v)),
        libsql::Value::Real(v) => Ok(SqlValue::Real(v)),
        libsql::Value::Text(v) => Ok(SqlValue::Text(v)),
        libsql::Value::Blob(_) => Err(DatabaseError::Serialization(
            "unexpected blob column".to_string(),
        )),
    }
}

fn bind(query: &Query) -> (String, libsql::params::Params) {
    let (sql, values) = query.positional(Placeholder::Question);
    let values = values.into_iter().map(to_libsql).collect();
    (sql, libsql::params::Params::Positional(values))
}

#[async_trait]
impl Session for LibSqlSession {
    async fn fetch(&self, query: &Query) -> Result<Vec<Row>, DatabaseError> {
        let (sql, params) = bind(query);
        let mut rows = self.conn.query(&sql, params).await?;

        let names: Vec<String> = (0..rows.column_count())
            .map(|idx| rows.column_name(idx).unwrap_or_default().to_string())
            .collect();

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let mut columns = Vec::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                let value = row.get_value(idx as i32)?;
                columns.push((name.clone(), from_libsql(value)?));
            }
            out.push(Row::new(columns));
        }
        Ok(out)
    }

    async fn write(&self, query: &Query) -> Result<WriteSummary, DatabaseError> {
        let (sql, params) = bind(query);
        let affected = self.conn.execute(&sql, params).await?;
        let generated_id = match query.statement {
            Statement::Insert { .. } if affected > 0 => {
                Some(self.conn.last_insert_rowid())
            }
            _ => None,
        };
        Ok(WriteSummary {
            affected,
            generated_id,
        })
    }
}
