//! Application assembly.

use std::sync::Arc;

use tracing::info;

use crate::client::{LineClient, MessagingApi};
use crate::config::BotConfig;
use crate::dispatch::Dispatcher;
use crate::error::BotError;
use crate::locale::{LocaleResolver, LocaleStore, ProfileLanguagePreferences};
use crate::webhook::WebhookReceiver;

/// A bot: one dispatcher, one outbound API, and optional localized strings.
///
/// Register handlers on [`dispatcher`](Self::dispatcher), then call
/// [`mark_ready`](Self::mark_ready) and serve webhooks through
/// [`receiver`](Self::receiver).
///
/// # Examples
///
/// ```rust,no_run
/// use linex_sdk::config::BotConfig;
/// use linex_sdk::dispatch::handler_fn;
/// use linex_sdk::events::Context;
/// use linex_sdk::{BoxError, LineBot};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bot = LineBot::from_config(BotConfig::from_env()?).await?;
///
/// bot.dispatcher()
///     .register("text", handler_fn(|ctx: Arc<Context>| async move {
///         let echo = ctx.text().unwrap_or_default().to_string();
///         ctx.reply(&[echo.into()]).await?;
///         Ok::<(), BoxError>(())
///     }))
///     .await;
///
/// bot.mark_ready().await;
/// let receiver = bot.receiver();
/// # Ok(())
/// # }
/// ```
pub struct LineBot {
    config: BotConfig,
    dispatcher: Arc<Dispatcher>,
    api: Arc<dyn MessagingApi>,
    locales: Option<LocaleResolver>,
}

impl LineBot {
    /// Assemble a bot talking to the LINE API with a [`LineClient`].
    ///
    /// # Errors
    ///
    /// `BotError` when the configuration is invalid, the HTTP client cannot
    /// be built, or the locale directory fails to load.
    pub async fn from_config(config: BotConfig) -> Result<Self, BotError> {
        config.validate()?;
        let client = LineClient::from_config(&config)?;
        Self::with_api(config, Arc::new(client)).await
    }

    /// Assemble a bot around a caller-provided API implementation.
    ///
    /// When a locale directory is configured it is loaded here, and users'
    /// locales are taken from their profile language.
    ///
    /// # Errors
    ///
    /// As [`from_config`](Self::from_config), minus client construction.
    pub async fn with_api(config: BotConfig, api: Arc<dyn MessagingApi>) -> Result<Self, BotError> {
        config.validate()?;

        let locales = match &config.locale {
            Some(locale_config) => {
                let store = LocaleStore::load(locale_config.clone()).await?;
                let preferences = Arc::new(ProfileLanguagePreferences::new(api.clone()));
                Some(LocaleResolver::new(Arc::new(store)).with_preferences(preferences))
            }
            None => None,
        };

        info!(
            mode = ?config.dispatch.mode,
            locales = locales.is_some(),
            "Bot assembled"
        );

        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(config.dispatch.clone())),
            config,
            api,
            locales,
        })
    }

    /// Replace the locale resolver.
    pub fn with_locales(mut self, resolver: LocaleResolver) -> Self {
        self.locales = Some(resolver);
        self
    }

    /// The configuration the bot was built from.
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// The handler registry.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The outbound API.
    pub fn api(&self) -> &Arc<dyn MessagingApi> {
        &self.api
    }

    /// The locale resolver, when locales are configured.
    pub fn locales(&self) -> Option<&LocaleResolver> {
        self.locales.as_ref()
    }

    /// Run the ready hooks and start accepting events.
    pub async fn mark_ready(&self) {
        self.dispatcher.mark_ready().await;
    }

    /// A webhook receiver feeding this bot's dispatcher.
    pub fn receiver(&self) -> WebhookReceiver {
        WebhookReceiver::new(
            self.config.channel_secret.clone(),
            self.dispatcher.clone(),
            self.api.clone(),
        )
    }
}

impl std::fmt::Debug for LineBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineBot")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("locales", &self.locales)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "bot_tests.rs"]
mod tests;
