//! Tests for template parsing and rendering.

use super::*;

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_collects_placeholders_in_order() {
    let template = Template::parse("{name} likes {food}, says {name}").unwrap();

    let names: Vec<&str> = template.placeholders().collect();

    assert_eq!(names, vec!["name", "food", "name"]);
    assert_eq!(template.source(), "{name} likes {food}, says {name}");
}

#[test]
fn test_parse_plain_text_has_no_placeholders() {
    let template = Template::parse("just text").unwrap();

    assert_eq!(template.placeholders().count(), 0);
    assert_eq!(template.render(&LocaleArgs::new()).unwrap(), "just text");
}

#[test]
fn test_parse_accepts_dotted_and_dashed_names() {
    let template = Template::parse("{user.name}-{item_count}-{x-y}").unwrap();

    let names: Vec<&str> = template.placeholders().collect();

    assert_eq!(names, vec!["user.name", "item_count", "x-y"]);
}

#[test]
fn test_parse_rejects_unterminated_placeholder() {
    let result = Template::parse("hello {name");

    assert_eq!(result, Err(TemplateError::Unterminated { position: 6 }));
}

#[test]
fn test_parse_keeps_empty_braces_as_text() {
    let template = Template::parse("a {} b").unwrap();

    assert_eq!(template.placeholders().count(), 0);
    assert_eq!(template.render(&LocaleArgs::new()).unwrap(), "a {} b");
}

#[test]
fn test_parse_keeps_invalid_placeholder_runs_as_text() {
    // Arrange
    let args = LocaleArgs::new().with("ok", "yes").with("name", "Ada");

    // Act
    let spaced = Template::parse("{ ok } then {ok}").unwrap();
    let emoji = Template::parse("mood: {😀} {name}").unwrap();

    // Assert
    assert_eq!(spaced.placeholders().collect::<Vec<_>>(), vec!["ok"]);
    assert_eq!(spaced.render(&args).unwrap(), "{ ok } then yes");
    assert_eq!(emoji.render(&args).unwrap(), "mood: {😀} Ada");
    assert_eq!(emoji.source(), "mood: {😀} {name}");
}

#[test]
fn test_parse_restarts_placeholder_at_nested_brace() {
    let template = Template::parse("{a{name}").unwrap();

    let rendered = template.render(&LocaleArgs::new().with("name", "x")).unwrap();

    assert_eq!(rendered, "{ax");
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_render_substitutes_every_occurrence() {
    let template = Template::parse("{a}+{a}={b}").unwrap();
    let args = LocaleArgs::new().with("a", 1).with("b", 2);

    let rendered = template.render(&args).unwrap();

    assert_eq!(rendered, "1+1=2");
}

#[test]
fn test_render_unescapes_doubled_braces() {
    let template = Template::parse("{{literal}} and }} and {value}").unwrap();
    let args = LocaleArgs::new().with("value", "x");

    let rendered = template.render(&args).unwrap();

    assert_eq!(rendered, "{literal} and } and x");
}

#[test]
fn test_render_keeps_lone_closing_brace() {
    let template = Template::parse("a } b").unwrap();

    assert_eq!(template.render(&LocaleArgs::new()).unwrap(), "a } b");
}

#[test]
fn test_render_ignores_extra_arguments() {
    let template = Template::parse("Hi {name}").unwrap();
    let args = LocaleArgs::new().with("name", "Ann").with("unused", 99);

    assert_eq!(template.render(&args).unwrap(), "Hi Ann");
}

#[test]
fn test_render_reports_all_missing_names_once() {
    let template = Template::parse("{a} {b} {a} {c}").unwrap();
    let args = LocaleArgs::new().with("b", "present");

    let missing = template.render(&args).unwrap_err();

    assert_eq!(missing, vec!["a".to_string(), "c".to_string()]);
}

#[test]
fn test_render_handles_multibyte_text() {
    let template = Template::parse("我喜歡{food}！").unwrap();
    let args = LocaleArgs::new().with("food", "披薩");

    assert_eq!(template.render(&args).unwrap(), "我喜歡披薩！");
}

// ============================================================================
// Arguments
// ============================================================================

#[test]
fn test_args_insert_replaces_value() {
    let mut args = LocaleArgs::new();
    assert!(args.is_empty());

    args.insert("k", "first");
    args.insert("k", "second");

    assert_eq!(args.get("k"), Some("second"));
}

#[test]
fn test_args_collect_from_pairs() {
    let args: LocaleArgs = vec![("a", 1), ("b", 2)].into_iter().collect();

    assert_eq!(args.get("a"), Some("1"));
    assert_eq!(args.get("b"), Some("2"));
    assert_eq!(args.get("c"), None);
}
