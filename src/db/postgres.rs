//! PostgreSQL backend for the [`Store`] trait.
//!
//! Sessions are pooled `deadpool-postgres` clients. Bound values are typed
//! per parameter slot, so the same [`SqlValue`] serves `INT4`, `INT8`,
//! `DATE` and text columns.

use std::error::Error as StdError;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::NaiveDate;
use deadpool_postgres::{Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime};
use postgres_types::{IsNull, ToSql, Type, to_sql_checked};
use secrecy::ExposeSecret as _;
use tokio_postgres::NoTls;

use crate::config::DatabaseConfig;
use crate::db::query::{DATE_FORMAT, Placeholder, Query, SqlValue, Statement};
use crate::db::{Row, Session, Store, WriteSummary};
use crate::error::DatabaseError;

/// PostgreSQL store backend.
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    /// Create a connection pool from configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| DatabaseError::Pool("DATABASE_URL is not set".to_string()))?;

        let mut cfg = Config::new();
        cfg.url = Some(url.expose_secret().to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(format!("failed to create pool: {e}")))?;

        // Fail at startup rather than on the first request.
        let _ = pool.get().await?;
        tracing::info!(pool_size = config.pool_size, "Connected to PostgreSQL");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgBackend {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn session(&self) -> Result<Box<dyn Session>, DatabaseError> {
        if self.pool.is_closed() {
            return Err(DatabaseError::Closed);
        }
        let client = self.pool.get().await?;
        Ok(Box::new(PgSession { client }))
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close();
            tracing::info!("PostgreSQL pool closed");
        }
    }
}

struct PgSession {
    client: Object,
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Integer(v) => {
                if *ty == Type::INT2 {
                    i16::try_from(*v)?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*v)?.to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*v as f64).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            SqlValue::Real(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            SqlValue::Text(v) => {
                if *ty == Type::DATE {
                    NaiveDate::parse_from_str(v, DATE_FORMAT)?.to_sql(ty, out)
                } else {
                    v.as_str().to_sql(ty, out)
                }
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn decode(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue, DatabaseError> {
    let ty = row.columns()[idx].type_();
    let value = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|v| SqlValue::Integer(v.into()))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|v| SqlValue::Integer(v.into()))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Integer)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|v| SqlValue::Real(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Real)
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?.map(SqlValue::from)
    } else {
        row.try_get::<_, Option<String>>(idx)
            .map_err(|e| {
                DatabaseError::Serialization(format!(
                    "unsupported column type {} for {}: {e}",
                    ty.name(),
                    row.columns()[idx].name()
                ))
            })?
            .map(SqlValue::Text)
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn to_row(row: &tokio_postgres::Row) -> Result<Row, DatabaseError> {
    let columns = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| Ok((column.name().to_string(), decode(row, idx)?)))
        .collect::<Result<Vec<_>, DatabaseError>>()?;
    Ok(Row::new(columns))
}

#[async_trait]
impl Session for PgSession {
    async fn fetch(&self, query: &Query) -> Result<Vec<Row>, DatabaseError> {
        let (sql, values) = query.positional(Placeholder::Dollar);
        let params: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|v| *v as &(dyn ToSql + Sync))
            .collect();
        let rows = self.client.query(sql.as_str(), &params).await?;
        rows.iter().map(to_row).collect()
    }

    async fn write(&self, query: &Query) -> Result<WriteSummary, DatabaseError> {
        let (sql, values) = query.positional(Placeholder::Dollar);
        let params: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|v| *v as &(dyn ToSql + Sync))
            .collect();

        match query.statement {
            Statement::Insert { id_column } => {
                let sql = format!("{sql} RETURNING {id_column}");
                let row = self.client.query_opt(sql.as_str(), &params).await?;
                let generated_id = match row.as_ref().map(|r| decode(r, 0)).transpose()? {
                    Some(SqlValue::Integer(id)) => Some(id),
                    _ => None,
                };
                Ok(WriteSummary {
                    affected: u64::from(row.is_some()),
                    generated_id,
                })
            }
            _ => {
                let affected = self.client.execute(sql.as_str(), &params).await?;
                Ok(WriteSummary {
                    affected,
                    generated_id: None,
                })
            }
        }
    }
}
