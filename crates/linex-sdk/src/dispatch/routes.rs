//! Text-command and postback routing built on top of plain event handlers.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;

use super::handler::{ArgumentHandler, EventHandler};
use crate::error::BoxError;
use crate::events::context::split_postback;
use crate::events::Context;

/// Build postback data that routes to the `name` postback handler.
///
/// Arguments are joined with `;`: `postback_data("order", [42, 2])` is
/// `"order;42;2"`.
pub fn postback_data<I>(name: &str, args: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut data = name.to_string();
    for arg in args {
        data.push(';');
        data.push_str(&arg.to_string());
    }
    data
}

/// Split a text message into command arguments.
///
/// The text must be the command name alone, or the name followed by
/// whitespace and `;`-separated arguments.
pub(crate) fn parse_command(text: &str, name: &str) -> Option<Vec<String>> {
    let rest = text.strip_prefix(name)?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let rest = rest.trim_start();
    if rest.is_empty() {
        return Some(Vec::new());
    }
    Some(rest.split(';').map(str::to_string).collect())
}

/// Runs an argument handler for text messages naming one command.
pub(crate) struct CommandRoute {
    pub name: String,
    pub handler: Arc<dyn ArgumentHandler>,
}

#[async_trait]
impl EventHandler for CommandRoute {
    async fn handle(&self, ctx: Arc<Context>) -> Result<(), BoxError> {
        let Some(args) = ctx.text().and_then(|text| parse_command(text, &self.name)) else {
            return Ok(());
        };
        self.handler.handle(ctx, args).await
    }
}

/// Runs an argument handler for postbacks carrying one data prefix.
pub(crate) struct PostbackRoute {
    pub prefix: String,
    pub handler: Arc<dyn ArgumentHandler>,
}

#[async_trait]
impl EventHandler for PostbackRoute {
    async fn handle(&self, ctx: Arc<Context>) -> Result<(), BoxError> {
        let Some(args) = ctx
            .postback_data()
            .and_then(|data| split_postback(data, &self.prefix))
            .map(|args| args.into_iter().map(str::to_string).collect::<Vec<_>>())
        else {
            return Ok(());
        };
        self.handler.handle(ctx, args).await
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
