//! # linex Server
//!
//! Binary entry point: loads configuration, initialises logging, assembles
//! the bot, and serves the webhook endpoint.
//!
//! Exit codes: 1 bind failure, 2 server failure, 3 configuration error,
//! 4 locale directory failed to load.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use linex_sdk::client::LineClient;
use linex_sdk::LineBot;
use linex_server::{bot_info_hook, start_server, LoggingConfig, ServiceConfig, ServiceError};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "linex-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve a LINE bot webhook endpoint")]
struct Cli {
    /// Configuration file layered over the default locations
    #[arg(short, long, env = "LINEX_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut service_config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet.
            eprintln!("Could not load configuration: {e}");
            std::process::exit(e.exit_code());
        }
    };
    if let Some(host) = cli.host {
        service_config.server.host = host;
    }
    if let Some(port) = cli.port {
        service_config.server.port = port;
    }
    if cli.json_logs {
        service_config.logging.json = true;
    }

    init_logging(&service_config.logging);
    info!("Starting linex server");

    if let Err(e) = run(service_config).await {
        error!(error = %e, "linex server stopped");
        let exit_code = match e.downcast_ref::<ServiceError>() {
            Some(service_error) => service_error.exit_code(),
            None => 2,
        };
        std::process::exit(exit_code);
    }
}

async fn run(service_config: ServiceConfig) -> anyhow::Result<()> {
    service_config
        .validate()
        .context("Service configuration is invalid")?;
    let bot_config = service_config.bot_config()?;

    let client = Arc::new(LineClient::from_config(&bot_config).map_err(ServiceError::from)?);
    let bot = LineBot::with_api(bot_config, client.clone())
        .await
        .map_err(ServiceError::from)?;
    bot.dispatcher().on_ready(bot_info_hook(client)).await;

    start_server(&service_config.server, Arc::new(bot)).await?;
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
