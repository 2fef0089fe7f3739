//! Per-user locale selection and string rendering.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::store::{LocaleIndex, LocaleStore};
use super::template::LocaleArgs;
use crate::client::MessagingApi;
use crate::error::LocaleError;
use crate::events::{Context, UserIdentity};

/// Source of a user's preferred locale tag.
#[async_trait]
pub trait LocalePreferenceSource: Send + Sync {
    /// The user's preferred tag, if known. It need not be a supported locale.
    async fn preferred_locale(&self, user: &UserIdentity) -> Option<String>;
}

/// Preferences set explicitly by the application.
#[derive(Debug, Default)]
pub struct InMemoryPreferences {
    preferences: RwLock<HashMap<UserIdentity, String>>,
}

impl InMemoryPreferences {
    /// Create an empty preference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's preferred tag.
    pub async fn set(&self, user: UserIdentity, locale: impl Into<String>) {
        self.preferences.write().await.insert(user, locale.into());
    }

    /// Forget a user's preference.
    pub async fn remove(&self, user: &UserIdentity) -> Option<String> {
        self.preferences.write().await.remove(user)
    }
}

#[async_trait]
impl LocalePreferenceSource for InMemoryPreferences {
    async fn preferred_locale(&self, user: &UserIdentity) -> Option<String> {
        self.preferences.read().await.get(user).cloned()
    }
}

/// Uses the language reported in the user's LINE profile.
///
/// Profile lookups that fail (unknown user, group ids, API errors) yield no
/// preference.
pub struct ProfileLanguagePreferences {
    api: Arc<dyn MessagingApi>,
}

impl ProfileLanguagePreferences {
    /// Create a source backed by `api`.
    pub fn new(api: Arc<dyn MessagingApi>) -> Self {
        Self { api }
    }
}

impl std::fmt::Debug for ProfileLanguagePreferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileLanguagePreferences").finish_non_exhaustive()
    }
}

#[async_trait]
impl LocalePreferenceSource for ProfileLanguagePreferences {
    async fn preferred_locale(&self, user: &UserIdentity) -> Option<String> {
        match self.api.get_profile(user.as_str()).await {
            Ok(profile) => profile.language,
            Err(e) => {
                debug!(user = %user, error = %e, "Profile lookup failed, no locale preference");
                None
            }
        }
    }
}

/// Chooses a locale per user and hands out [`LocaleHandle`]s.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use linex_sdk::events::UserIdentity;
/// use linex_sdk::locale::{LocaleArgs, LocaleConfig, LocaleResolver, LocaleStore};
///
/// # async fn example() -> Result<(), linex_sdk::error::LocaleError> {
/// let store = Arc::new(LocaleStore::load(LocaleConfig::new("locales")).await?);
/// let resolver = LocaleResolver::new(store);
///
/// let locale = resolver.resolve(&UserIdentity::new("U123")).await;
/// let food = locale.text("food/PIZZA")?;
/// let line = locale.format("food/DESCRIBE", &LocaleArgs::new().with("food", food))?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocaleResolver {
    store: Arc<LocaleStore>,
    preferences: Option<Arc<dyn LocalePreferenceSource>>,
}

impl LocaleResolver {
    /// Resolve every user to the default locale until a preference source is set.
    pub fn new(store: Arc<LocaleStore>) -> Self {
        Self {
            store,
            preferences: None,
        }
    }

    /// Consult `source` for each user's preferred locale.
    pub fn with_preferences(mut self, source: Arc<dyn LocalePreferenceSource>) -> Self {
        self.preferences = Some(source);
        self
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<LocaleStore> {
        &self.store
    }

    /// A handle for `user`.
    ///
    /// The preferred tag is matched exactly, then ignoring case, against the
    /// supported locales; anything else gets the default locale.
    pub async fn resolve(&self, user: &UserIdentity) -> LocaleHandle {
        let preferred = match &self.preferences {
            Some(source) => source.preferred_locale(user).await,
            None => None,
        };

        let index = self.store.snapshot();
        let locale = match preferred.as_deref().and_then(|tag| index.match_tag(tag)) {
            Some(tag) => tag.to_string(),
            None => {
                if let Some(tag) = &preferred {
                    debug!(user = %user, preferred = %tag, "Unsupported locale preference, using default");
                }
                index.default_locale().to_string()
            }
        };

        LocaleHandle { index, locale }
    }

    /// A handle for the user behind an event, or the default locale when the
    /// event has no source.
    pub async fn resolve_context(&self, ctx: &Context) -> LocaleHandle {
        match ctx.base().user_identity() {
            Some(user) => self.resolve(&user).await,
            None => self.default_handle(),
        }
    }

    /// A handle for the default locale.
    pub fn default_handle(&self) -> LocaleHandle {
        let index = self.store.snapshot();
        let locale = index.default_locale().to_string();
        LocaleHandle { index, locale }
    }

    /// A handle for an explicit locale tag, bypassing preferences.
    ///
    /// The tag is matched like a preference. A tag outside the supported
    /// locales is kept as given and every lookup through it fails with
    /// `LocaleError::MissingTranslation`.
    pub fn handle_for(&self, locale: impl Into<String>) -> LocaleHandle {
        let index = self.store.snapshot();
        let locale = locale.into();
        let locale = match index.match_tag(&locale) {
            Some(tag) => tag.to_string(),
            None => locale,
        };
        LocaleHandle { index, locale }
    }
}

impl std::fmt::Debug for LocaleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocaleResolver")
            .field("store", &self.store.config().directory_path)
            .field("has_preferences", &self.preferences.is_some())
            .finish()
    }
}

/// Renders strings in one locale from one snapshot of the store.
///
/// A reload after the handle was created does not affect it.
#[derive(Debug, Clone)]
pub struct LocaleHandle {
    index: Arc<LocaleIndex>,
    locale: String,
}

impl LocaleHandle {
    /// The active locale tag.
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// The snapshot this handle reads from.
    pub fn index(&self) -> &Arc<LocaleIndex> {
        &self.index
    }

    /// Render `category/key` with `args`.
    ///
    /// Arguments without a placeholder are ignored.
    ///
    /// # Errors
    ///
    /// - `LocaleError::Key` when the category or key does not exist.
    /// - `LocaleError::MissingTranslation` when the active locale is not
    ///   supported, or neither it nor the fallback locale has a template.
    /// - `LocaleError::Argument` listing every placeholder without an argument.
    pub fn format(&self, path: &str, args: &LocaleArgs) -> Result<String, LocaleError> {
        let translations = self
            .index
            .translations(path)
            .ok_or_else(|| LocaleError::Key {
                path: path.to_string(),
            })?;

        let missing = || LocaleError::MissingTranslation {
            path: path.to_string(),
            locale: self.locale.clone(),
        };
        if !self.index.supports(&self.locale) {
            return Err(missing());
        }

        let template = translations
            .get(&self.locale)
            .or_else(|| {
                self.index
                    .fallback_locale()
                    .and_then(|fallback| translations.get(fallback))
            })
            .ok_or_else(missing)?;

        template.render(args).map_err(|missing| LocaleError::Argument {
            path: path.to_string(),
            missing,
        })
    }

    /// Render `category/key` without arguments.
    ///
    /// # Errors
    ///
    /// As [`format`](Self::format).
    pub fn text(&self, path: &str) -> Result<String, LocaleError> {
        self.format(path, &LocaleArgs::new())
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
