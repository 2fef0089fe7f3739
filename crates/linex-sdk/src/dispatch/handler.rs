//! Handler traits for application-provided event processing.
//!
//! Handlers are registered with the [`Dispatcher`](super::Dispatcher) under an
//! event name. They receive the event's [`Context`] behind an `Arc` so that
//! every handler of one event observes the same context.
//!
//! # Examples
//!
//! ```rust
//! use linex_sdk::dispatch::{handler_fn, EventHandler};
//! use linex_sdk::client::Message;
//! use linex_sdk::events::Context;
//! use linex_sdk::BoxError;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! // As a type
//! struct Greeter;
//!
//! #[async_trait]
//! impl EventHandler for Greeter {
//!     async fn handle(&self, ctx: Arc<Context>) -> Result<(), BoxError> {
//!         ctx.reply(&[Message::text("Thanks for following!")]).await?;
//!         Ok(())
//!     }
//! }
//!
//! // As a closure
//! let echo = handler_fn(|ctx: Arc<Context>| async move {
//!     if let Some(text) = ctx.text() {
//!         ctx.reply(&[Message::text(text)]).await?;
//!     }
//!     Ok::<(), BoxError>(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::events::Context;

/// Processes one event.
///
/// Errors and panics are contained by the dispatcher: they are logged and
/// reported, and never stop the remaining handlers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: Arc<Context>) -> Result<(), BoxError>;
}

/// Processes a command or postback together with its parsed arguments.
#[async_trait]
pub trait ArgumentHandler: Send + Sync {
    async fn handle(&self, ctx: Arc<Context>, args: Vec<String>) -> Result<(), BoxError>;
}

/// Runs once when the dispatcher becomes ready.
#[async_trait]
pub trait ReadyHook: Send + Sync {
    async fn on_ready(&self) -> Result<(), BoxError>;
}

/// Adapt an async closure into an [`EventHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Adapt an async closure into an [`ArgumentHandler`].
pub fn args_fn<F, Fut>(f: F) -> Arc<dyn ArgumentHandler>
where
    F: Fn(Arc<Context>, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(FnArgumentHandler(f))
}

/// Adapt an async closure into a [`ReadyHook`].
pub fn ready_fn<F, Fut>(f: F) -> Arc<dyn ReadyHook>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(FnReadyHook(f))
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn handle(&self, ctx: Arc<Context>) -> Result<(), BoxError> {
        (self.0)(ctx).await
    }
}

struct FnArgumentHandler<F>(F);

#[async_trait]
impl<F, Fut> ArgumentHandler for FnArgumentHandler<F>
where
    F: Fn(Arc<Context>, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn handle(&self, ctx: Arc<Context>, args: Vec<String>) -> Result<(), BoxError> {
        (self.0)(ctx, args).await
    }
}

struct FnReadyHook<F>(F);

#[async_trait]
impl<F, Fut> ReadyHook for FnReadyHook<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn on_ready(&self) -> Result<(), BoxError> {
        (self.0)().await
    }
}
