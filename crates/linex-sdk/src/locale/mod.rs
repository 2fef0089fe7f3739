//! Localized strings loaded from a directory of translation files.
//!
//! A locale directory holds a manifest (`_meta.json` or `_meta.yaml`) listing
//! the supported locale tags, plus the translation files. Two layouts are
//! supported, chosen by [`SortedBy`]:
//!
//! - `categories`: one file per category (`food.json`), shaped
//!   `{key: {locale: template}}`. The manifest is required.
//! - `locales`: one file per locale tag (`en-US.json`), shaped
//!   `{category: {key: template}}`. Without a manifest the locale list is the
//!   set of file names.
//!
//! Either way strings are addressed as `category/key`:
//!
//! ```text
//! locales/
//!   _meta.json   {"locales": ["en-US", "zh-Hant"]}
//!   food.json    {"DESCRIBE": {"en-US": "I like {food}", "zh-Hant": "我喜歡{food}"}}
//! ```
//!
//! [`LocaleStore`] loads and validates the directory; [`LocaleResolver`] picks
//! a locale for a user and returns a [`LocaleHandle`] that renders templates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

mod resolver;
mod store;
mod template;

pub use resolver::{
    InMemoryPreferences, LocaleHandle, LocalePreferenceSource, LocaleResolver,
    ProfileLanguagePreferences,
};
pub use store::{LocaleIndex, LocaleStore};
pub use template::{LocaleArgs, Template};

/// How translation files are grouped on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortedBy {
    /// One file per category.
    #[default]
    Categories,
    /// One file per locale tag.
    Locales,
}

/// Locale directory settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Directory holding the manifest and translation files.
    pub directory_path: PathBuf,

    /// File grouping.
    #[serde(default)]
    pub sorted_by: SortedBy,

    /// Locale used when a user has no usable preference.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Locale tried when a key has no template for the active locale.
    #[serde(default)]
    pub fallback_locale: Option<String>,
}

fn default_locale() -> String {
    "en-US".to_string()
}

impl LocaleConfig {
    /// Settings for `directory_path` with default grouping and locales.
    pub fn new(directory_path: impl Into<PathBuf>) -> Self {
        Self {
            directory_path: directory_path.into(),
            sorted_by: SortedBy::default(),
            default_locale: default_locale(),
            fallback_locale: None,
        }
    }

    /// Set the file grouping.
    pub fn with_sorted_by(mut self, sorted_by: SortedBy) -> Self {
        self.sorted_by = sorted_by;
        self
    }

    /// Set the default locale.
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    /// Set the fallback locale.
    pub fn with_fallback_locale(mut self, locale: impl Into<String>) -> Self {
        self.fallback_locale = Some(locale.into());
        self
    }

    /// Check for values that can never load.
    ///
    /// Whether the locales exist in the manifest is only known at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                name: "locale.directory_path".to_string(),
            });
        }
        if self.default_locale.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "locale.default_locale".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if matches!(&self.fallback_locale, Some(tag) if tag.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                name: "locale.fallback_locale".to_string(),
                message: "must not be empty when set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
