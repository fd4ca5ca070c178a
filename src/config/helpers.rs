//! Environment lookup helpers shared by the config resolvers.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigError;

/// Source of raw configuration values, keyed by environment variable name.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Returns the trimmed value of `key`, treating blank values as unset.
pub(crate) fn optional_env(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.get(key)
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn parse_string_env(env: &dyn EnvSource, key: &str, default: impl Into<String>) -> String {
    optional_env(env, key).unwrap_or_else(|| default.into())
}

pub(crate) fn parse_bool_env(
    env: &dyn EnvSource,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = optional_env(env, key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

pub(crate) fn parse_env<T>(env: &dyn EnvSource, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match optional_env(env, key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
