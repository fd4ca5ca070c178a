use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::HeaderValue;

use crate::config::helpers::{EnvSource, optional_env, parse_env, parse_string_env};
use crate::error::ConfigError;

const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:3000";

/// HTTP listener and CORS settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// The single browser origin allowed to call the API with credentials.
    pub frontend_origin: String,
}

impl ServerConfig {
    pub(crate) fn resolve(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let frontend_origin = parse_string_env(env, "FRONTEND_ORIGIN", DEFAULT_FRONTEND_ORIGIN);
        validate_origin(&frontend_origin)?;
        Ok(Self {
            host: parse_env(env, "HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: parse_env(env, "PORT", 5000u16)?,
            frontend_origin,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            frontend_origin: DEFAULT_FRONTEND_ORIGIN.to_string(),
        }
    }
}

fn validate_origin(raw: &str) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: "FRONTEND_ORIGIN".to_string(),
        message: message.to_string(),
    };
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(invalid("origin must start with http:// or https://"));
    }
    if raw.ends_with('/') {
        return Err(invalid("origin must not have a trailing slash"));
    }
    HeaderValue::from_str(raw).map_err(|_| invalid("origin is not a valid header value"))?;
    Ok(())
}

/// Log output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    pub(crate) fn resolve(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let format = match optional_env(env, "LOG_FORMAT").as_deref() {
            None | Some("pretty") | Some("text") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "LOG_FORMAT".to_string(),
                    message: format!("expected 'pretty' or 'json', got '{other}'"),
                });
            }
        };
        Ok(Self {
            filter: parse_string_env(env, "RUST_LOG", "trialdesk=info,tower_http=info"),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn server_defaults_match_frontend_dev_setup() {
        let config = ServerConfig::resolve(&env(&[])).expect("defaults");
        assert_eq!(config.port, 5000);
        assert_eq!(config.frontend_origin, "http://localhost:3000");
        assert_eq!(config.addr().to_string(), "127.0.0.1:5000");
    }

    #[test]
    fn origin_must_be_a_bare_http_origin() {
        for bad in ["localhost:3000", "http://localhost:3000/", "ftp://x"] {
            let err = ServerConfig::resolve(&env(&[("FRONTEND_ORIGIN", bad)]))
                .expect_err("origin must be rejected");
            assert!(err.to_string().contains("FRONTEND_ORIGIN"), "{bad}: {err}");
        }
    }

    #[test]
    fn log_format_accepts_json() {
        let config = LoggingConfig::resolve(&env(&[("LOG_FORMAT", "json")])).expect("json");
        assert_eq!(config.format, LogFormat::Json);
        assert!(LoggingConfig::resolve(&env(&[("LOG_FORMAT", "xml")])).is_err());
    }
}
