//! Bot configuration and secret handling.
//!
//! [`BotConfig`] gathers every option the SDK recognises. It deserializes from
//! any `serde` source (the server binary layers files and environment
//! variables through the `config` crate) or can be read directly from the
//! `LINEX_*` environment variables with [`BotConfig::from_env`].

use serde::{Deserialize, Deserializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::client::ClientConfig;
use crate::dispatch::DispatchConfig;
use crate::error::ConfigError;
use crate::locale::LocaleConfig;

/// Environment variable holding the channel secret.
pub const CHANNEL_SECRET_ENV: &str = "LINEX_CHANNEL_SECRET";

/// Environment variable holding the channel access token.
pub const CHANNEL_ACCESS_TOKEN_ENV: &str = "LINEX_CHANNEL_ACCESS_TOKEN";

/// Environment variable pointing at a locale directory.
pub const LOCALE_DIR_ENV: &str = "LINEX_LOCALE_DIR";

/// A secret string that is wiped from memory on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret)
    }
}

/// Complete bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Channel secret used to verify webhook signatures.
    pub channel_secret: Secret,

    /// Channel access token used for every outbound API call.
    pub channel_access_token: Secret,

    /// Outbound API client settings.
    #[serde(default)]
    pub api: ClientConfig,

    /// Dispatch behaviour.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Locale directory settings. Locale support is disabled when absent.
    #[serde(default)]
    pub locale: Option<LocaleConfig>,
}

impl BotConfig {
    /// Create a configuration with default settings for everything but the credentials.
    pub fn new(channel_secret: impl Into<String>, channel_access_token: impl Into<String>) -> Self {
        Self {
            channel_secret: Secret::new(channel_secret),
            channel_access_token: Secret::new(channel_access_token),
            api: ClientConfig::default(),
            dispatch: DispatchConfig::default(),
            locale: None,
        }
    }

    /// Read the credentials (and an optional locale directory) from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when either credential variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let channel_secret = read_env(CHANNEL_SECRET_ENV)?;
        let channel_access_token = read_env(CHANNEL_ACCESS_TOKEN_ENV)?;

        let mut config = Self::new(channel_secret, channel_access_token);
        if let Ok(directory) = std::env::var(LOCALE_DIR_ENV) {
            if !directory.is_empty() {
                config.locale = Some(LocaleConfig::new(directory));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the locale configuration.
    pub fn with_locale(mut self, locale: LocaleConfig) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Check the configuration for values that can never work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_secret.is_empty() {
            return Err(ConfigError::Missing {
                name: "channel_secret".to_string(),
            });
        }
        if self.channel_access_token.is_empty() {
            return Err(ConfigError::Missing {
                name: "channel_access_token".to_string(),
            });
        }
        if let Some(locale) = &self.locale {
            locale.validate()?;
        }
        Ok(())
    }
}

fn read_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing {
        name: name.to_string(),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
