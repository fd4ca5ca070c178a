use std::path::PathBuf;

use secrecy::SecretString;

use crate::config::helpers::{EnvSource, optional_env, parse_bool_env, parse_env, parse_string_env};
use crate::error::ConfigError;

/// Which store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    LibSql,
    Postgres,
}

impl DatabaseBackend {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "libsql" | "sqlite" => Ok(Self::LibSql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::InvalidValue {
                key: "DATABASE_BACKEND".to_string(),
                message: format!("unsupported backend '{other}'"),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LibSql => "libsql",
            Self::Postgres => "postgres",
        }
    }
}

/// Store connection settings.
#[derive(Debug)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// File path for the embedded libSQL database.
    pub libsql_path: PathBuf,
    /// Connection URL for PostgreSQL. Carries credentials.
    pub url: Option<SecretString>,
    pub pool_size: usize,
    /// Create the tables on startup when absent (libSQL only).
    pub init_schema: bool,
}

impl DatabaseConfig {
    pub(crate) fn resolve(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let backend = DatabaseBackend::from_str(&parse_string_env(env, "DATABASE_BACKEND", "libsql"))?;
        let url = optional_env(env, "DATABASE_URL").map(SecretString::from);
        if backend == DatabaseBackend::Postgres && url.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "DATABASE_URL".to_string(),
            });
        }

        let pool_size = parse_env(env, "DATABASE_POOL_SIZE", 10usize)?;
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DATABASE_POOL_SIZE".to_string(),
                message: "pool size must be at least 1".to_string(),
            });
        }

        Ok(Self {
            backend,
            libsql_path: PathBuf::from(parse_string_env(env, "LIBSQL_PATH", "./trialdesk.db")),
            url,
            pool_size,
            init_schema: parse_bool_env(env, "DATABASE_INIT_SCHEMA", false)?,
        })
    }
}
