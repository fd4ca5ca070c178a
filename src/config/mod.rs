//! Process configuration, resolved from the environment at startup.
//!
//! Values come from environment variables (a `.env` file is loaded first by
//! `main`), then CLI flags override individual fields.

mod database;
pub(crate) mod helpers;
mod server;

pub use database::{DatabaseBackend, DatabaseConfig};
pub use helpers::{EnvSource, ProcessEnv};
pub use server::{LogFormat, LoggingConfig, ServerConfig};

use crate::error::ConfigError;

/// Fully resolved configuration.
#[derive(Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(&ProcessEnv)
    }

    pub fn resolve(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseConfig::resolve(env)?,
            server: ServerConfig::resolve(env)?,
            logging: LoggingConfig::resolve(env)?,
        })
    }
}
