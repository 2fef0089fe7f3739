//! Tests for command and postback parsing.

use super::*;

#[test]
fn test_postback_data_joins_arguments() {
    assert_eq!(postback_data("handling", [1, 2]), "handling;1;2");
    assert_eq!(postback_data("flag", ["happy"]), "flag;happy");
    assert_eq!(postback_data("plain", Vec::<String>::new()), "plain");
}

#[test]
fn test_parse_command_without_arguments() {
    assert_eq!(parse_command("!help", "!help"), Some(vec![]));
    assert_eq!(parse_command("!help   ", "!help"), Some(vec![]));
}

#[test]
fn test_parse_command_splits_on_semicolons() {
    assert_eq!(
        parse_command("!add milk;2 bottles", "!add"),
        Some(vec!["milk".to_string(), "2 bottles".to_string()])
    );
}

#[test]
fn test_parse_command_requires_word_boundary() {
    assert_eq!(parse_command("!helpme", "!help"), None);
    assert_eq!(parse_command("say !help", "!help"), None);
}
