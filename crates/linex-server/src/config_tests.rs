//! Tests for service configuration loading.

use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = ServiceConfig::default();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.webhook_path, "/");
    assert_eq!(config.server.shutdown_timeout_seconds, 30);
    assert!(!config.logging.json);
    assert!(config.bot.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_relative_webhook_path() {
    let mut config = ServiceConfig::default();
    config.server.webhook_path = "callback".to_string();

    let result = config.validate();

    assert!(matches!(
        result,
        Err(ServiceError::Configuration(ConfigError::Invalid { name, .. })) if name == "server.webhook_path"
    ));
}

#[test]
fn test_validate_checks_bot_credentials() {
    let config = ServiceConfig {
        bot: Some(BotConfig::new("", "token")),
        ..ServiceConfig::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ServiceError::Configuration(ConfigError::Missing { .. }))
    ));
}

#[test]
#[serial]
fn test_load_layers_explicit_file_and_environment() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("service.yaml");
    std::fs::write(
        &path,
        "server:\n  port: 9000\n  webhook_path: /callback\n\
         logging:\n  json: true\n\
         bot:\n  channel_secret: file-secret\n  channel_access_token: file-token\n  \
         dispatch:\n    mode: inline\n",
    )
    .unwrap();
    std::env::set_var("LINEX__SERVER__PORT", "9100");

    // Act
    let result = ServiceConfig::load(Some(&path));
    std::env::remove_var("LINEX__SERVER__PORT");

    // Assert
    let config = result.expect("configuration loads");
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.webhook_path, "/callback");
    assert!(config.logging.json);
    let bot = config.bot_config().unwrap();
    assert_eq!(bot.channel_secret.expose(), "file-secret");
    assert_eq!(bot.dispatch.mode, linex_sdk::DispatchMode::Inline);
}

#[test]
#[serial]
fn test_load_requires_explicit_file_to_exist() {
    let dir = TempDir::new().unwrap();

    let result = ServiceConfig::load(Some(&dir.path().join("absent.yaml")));

    assert!(matches!(result, Err(ServiceError::Configuration(_))));
}

#[test]
#[serial]
fn test_bot_config_falls_back_to_environment() {
    std::env::set_var(linex_sdk::config::CHANNEL_SECRET_ENV, "env-secret");
    std::env::set_var(linex_sdk::config::CHANNEL_ACCESS_TOKEN_ENV, "env-token");

    let result = ServiceConfig::default().bot_config();

    std::env::remove_var(linex_sdk::config::CHANNEL_SECRET_ENV);
    std::env::remove_var(linex_sdk::config::CHANNEL_ACCESS_TOKEN_ENV);
    let bot = result.expect("credentials are in the environment");
    assert_eq!(bot.channel_access_token.expose(), "env-token");
}
