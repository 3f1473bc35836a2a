//! Configuration loading and representation.
//!
//! Sources, later ones overriding earlier ones:
//! 1. `config/academyerp.toml` (optional)
//! 2. `ERP_*` environment variables (`ERP_SIGNING_KEY`, `ERP_BIND_ADDR`, ...)
//!
//! Loaded once at startup. The signing key is validated here so a missing or
//! weak key stops the process before it can serve anything.

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use academyerp_auth::{Argon2Verifier, PasswordConfig, PasswordError, SigningKey, TokenConfig, TokenError};
use academyerp_observability::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error(transparent)]
    Signing(#[from] TokenError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("invalid setting '{key}': {message}")]
    Invalid { key: &'static str, message: String },
}

/// Flat settings as they appear in the file / environment.
#[derive(Deserialize)]
struct Settings {
    signing_key: Option<String>,
    #[serde(default = "default_party")]
    token_issuer: String,
    #[serde(default = "default_party")]
    token_audience: String,
    #[serde(default = "default_bind_addr")]
    bind_addr: String,
    database_url: Option<String>,
    argon2_memory_kib: Option<u32>,
    argon2_iterations: Option<u32>,
    argon2_parallelism: Option<u32>,
    #[serde(default = "default_log_format")]
    log_format: String,
}

fn default_party() -> String {
    TokenConfig::default().issuer
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub signing_key: SigningKey,
    pub token: TokenConfig,
    pub password: PasswordConfig,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from `config/academyerp.toml` and `ERP_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let source = Config::builder()
            .add_source(File::with_name("config/academyerp").required(false))
            .add_source(Environment::with_prefix("ERP"))
            .build()?;
        Self::from_source(source)
    }

    pub fn from_source(source: Config) -> Result<Self, ConfigError> {
        let settings: Settings = source.try_deserialize()?;

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            argon2_memory_kib: settings.argon2_memory_kib.unwrap_or(defaults.argon2_memory_kib),
            argon2_iterations: settings.argon2_iterations.unwrap_or(defaults.argon2_iterations),
            argon2_parallelism: settings
                .argon2_parallelism
                .unwrap_or(defaults.argon2_parallelism),
        };

        let signing_key = SigningKey::from_setting(settings.signing_key.as_deref())?;

        // Reject unusable Argon2 parameters at startup rather than on first activation.
        Argon2Verifier::new(&password)?;

        let log_format = settings
            .log_format
            .parse::<LogFormat>()
            .map_err(|message| ConfigError::Invalid {
                key: "log_format",
                message,
            })?;

        if settings.token_issuer.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "token_issuer",
                message: "must not be empty".to_string(),
            });
        }
        if settings.token_audience.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "token_audience",
                message: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            bind_addr: settings.bind_addr,
            database_url: settings.database_url.filter(|url| !url.trim().is_empty()),
            signing_key,
            token: TokenConfig {
                issuer: settings.token_issuer,
                audience: settings.token_audience,
            },
            password,
            log_format,
        })
    }
}
