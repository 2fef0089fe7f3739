//! Tests for locale configuration.

use super::*;

#[test]
fn test_new_uses_defaults() {
    let config = LocaleConfig::new("locales");

    assert_eq!(config.directory_path, PathBuf::from("locales"));
    assert_eq!(config.sorted_by, SortedBy::Categories);
    assert_eq!(config.default_locale, "en-US");
    assert!(config.fallback_locale.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_deserialize_applies_defaults() {
    let config: LocaleConfig =
        serde_json::from_value(serde_json::json!({ "directory_path": "i18n" })).unwrap();

    assert_eq!(config, LocaleConfig::new("i18n"));
}

#[test]
fn test_builders_set_fields() {
    let config = LocaleConfig::new("i18n")
        .with_sorted_by(SortedBy::Locales)
        .with_default_locale("zh-Hant")
        .with_fallback_locale("en-US");

    assert_eq!(config.sorted_by, SortedBy::Locales);
    assert_eq!(config.default_locale, "zh-Hant");
    assert_eq!(config.fallback_locale.as_deref(), Some("en-US"));
}

#[test]
fn test_validate_rejects_empty_directory() {
    let result = LocaleConfig::new("").validate();

    assert!(matches!(result, Err(ConfigError::Missing { name }) if name == "locale.directory_path"));
}

#[test]
fn test_validate_rejects_blank_locales() {
    let blank_default = LocaleConfig::new("i18n").with_default_locale(" ");
    let blank_fallback = LocaleConfig::new("i18n").with_fallback_locale("");

    assert!(matches!(
        blank_default.validate(),
        Err(ConfigError::Invalid { name, .. }) if name == "locale.default_locale"
    ));
    assert!(matches!(
        blank_fallback.validate(),
        Err(ConfigError::Invalid { name, .. }) if name == "locale.fallback_locale"
    ));
}
