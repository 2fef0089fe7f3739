//! Configuration types for the HTTP service

use std::path::Path;

use linex_sdk::config::BotConfig;
use linex_sdk::ConfigError;
use serde::Deserialize;
use tracing::info;

use crate::ServiceError;

/// Prefix of environment variables overriding file settings, e.g.
/// `LINEX__SERVER__PORT=9090`.
pub const ENV_PREFIX: &str = "LINEX";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_FILE_ENV: &str = "LINEX_CONFIG_FILE";

/// Service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Bot settings. When absent the credentials are read from
    /// `LINEX_CHANNEL_SECRET` and `LINEX_CHANNEL_ACCESS_TOKEN`.
    pub bot: Option<BotConfig>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path LINE posts webhooks to
    pub webhook_path: String,

    /// Seconds in-flight requests may drain after a shutdown signal before
    /// their connections are dropped
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            webhook_path: "/".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "linex_server=info,linex_sdk=info,tower_http=info".to_string(),
            json: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from files and the environment.
    ///
    /// Sources, later ones overriding earlier ones:
    ///  1. `/etc/linex/service.yaml`
    ///  2. `./config/service.yaml`
    ///  3. `explicit_file`, which must exist when given
    ///  4. `LINEX__`-prefixed environment variables (`__` separates levels)
    ///
    /// # Errors
    ///
    /// `ServiceError::Configuration` for unreadable files or values of the
    /// wrong type.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self, ServiceError> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name("/etc/linex/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::with_name("config/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        if let Some(path) = explicit_file {
            info!(path = %path.display(), "Loading configuration from explicit path");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| invalid("configuration", e))?;

        settings
            .try_deserialize()
            .map_err(|e| invalid("configuration", e))
    }

    /// Check for values that can never work.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if !self.server.webhook_path.starts_with('/') {
            return Err(ServiceError::Configuration(ConfigError::Invalid {
                name: "server.webhook_path".to_string(),
                message: "must start with '/'".to_string(),
            }));
        }
        if let Some(bot) = &self.bot {
            bot.validate()?;
        }
        Ok(())
    }

    /// The bot settings, from the file sources or else from the environment.
    ///
    /// # Errors
    ///
    /// `ServiceError::Configuration` when neither provides credentials.
    pub fn bot_config(&self) -> Result<BotConfig, ServiceError> {
        match &self.bot {
            Some(bot) => Ok(bot.clone()),
            None => Ok(BotConfig::from_env()?),
        }
    }
}

fn invalid(name: &str, error: impl std::fmt::Display) -> ServiceError {
    ServiceError::Configuration(ConfigError::Invalid {
        name: name.to_string(),
        message: error.to_string(),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
