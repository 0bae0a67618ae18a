//! # configs
//!
//! Runtime configuration. Sources, lowest priority first: built-in defaults,
//! a `.env` file, then `NESTBOARD__*` environment variables
//! (e.g. `NESTBOARD__PORT=8080`, `NESTBOARD__DATABASE_URL=sqlite:board.db`).

use domains::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "NESTBOARD";

/// Secret used when none is configured. Refused in production.
pub const DEV_AUTH_SECRET: &str = "nestboard-development-secret-change-me";

const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Deserialize)]
struct RawConfig {
    app_env: String,
    host: String,
    port: u16,
    log_level: String,
    log_format: Option<LogFormat>,
    storage: StorageBackend,
    database_url: String,
    database_max_connections: u32,
    auth_secret: String,
    default_page_size: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_env: String,
    pub host: String,
    pub port: u16,
    /// `EnvFilter` directive, e.g. `info` or `info,sqlx=warn`
    pub log_level: String,
    pub log_format: LogFormat,
    pub storage: StorageBackend,
    pub database_url: String,
    pub database_max_connections: u32,
    pub auth_secret: SecretString,
    pub default_page_size: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Loads from defaults plus the given environment source.
    pub fn load_from(env: config::Environment) -> Result<Self, ConfigError> {
        let raw: RawConfig = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("storage", "memory")?
            .set_default("database_url", "sqlite:nestboard.db")?
            .set_default("database_max_connections", 5)?
            .set_default("auth_secret", DEV_AUTH_SECRET)?
            .set_default("default_page_size", i64::from(DEFAULT_PAGE_SIZE))?
            .add_source(env.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        let is_production = raw.app_env.eq_ignore_ascii_case("production");
        let config = Self {
            log_format: raw.log_format.unwrap_or(if is_production {
                LogFormat::Json
            } else {
                LogFormat::Compact
            }),
            app_env: raw.app_env,
            host: raw.host,
            port: raw.port,
            log_level: raw.log_level,
            storage: raw.storage,
            database_url: raw.database_url,
            database_max_connections: raw.database_max_connections,
            auth_secret: SecretString::from(raw.auth_secret),
            default_page_size: raw.default_page_size,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.auth_secret.expose_secret();
        if self.is_production() && secret == DEV_AUTH_SECRET {
            return Err(ConfigError::Invalid(
                "auth_secret must be set in production".into(),
            ));
        }
        if secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid(format!(
                "auth_secret must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.default_page_size) {
            return Err(ConfigError::Invalid(format!(
                "default_page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.database_max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database_max_connections must be at least 1".into(),
            ));
        }
        if self.is_production() && self.storage == StorageBackend::Memory {
            tracing::warn!("running production with the in-memory store; data is lost on restart");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
