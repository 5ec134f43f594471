use config::{Config, Environment, File};
use serde::Deserialize;

use crate::domain::error::{DomainError, DomainResult};
use crate::infrastructure::storage::PostgresConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Signs login tokens.
    pub jwt_secret: String,
    /// Derives the key that seals provider credentials at rest.
    pub sealing_secret: String,
    pub token_ttl_hours: i64,
}

/// Application configuration, layered: defaults, then `config/default`
/// file if present, then `APP__`-prefixed environment variables
/// (e.g. `APP__SERVER__PORT=8080`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
}

impl AppConfig {
    pub fn load() -> DomainResult<Self> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("storage.backend", "memory")?
            .set_default("security.token_ttl_hours", 24)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        if loaded.storage.backend == StorageBackend::Postgres && loaded.storage.postgres.is_none() {
            return Err(DomainError::configuration(
                "storage.backend is postgres but storage.postgres is not set",
            ));
        }
        Ok(loaded)
    }
}

impl From<config::ConfigError> for DomainError {
    fn from(err: config::ConfigError) -> Self {
        DomainError::configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        };
        assert_eq!(server.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_log_format_deserializes() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
