//! Template text with `{name}` placeholders.
//!
//! Templates are parsed once, at load time, into literal and placeholder
//! segments. Rendering substitutes every placeholder or fails listing the
//! names that had no argument; there is no partial output.
//!
//! Syntax:
//! - `{name}`: placeholder; names use `[A-Za-z0-9_.-]`.
//! - `{{` and `}}`: literal braces.
//! - A lone `}` is literal text, and so is a braced run that is not a valid
//!   placeholder, such as `{}` or `{ ok }`.

use std::collections::HashMap;
use std::fmt::Display;

use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

enum ScanState {
    Literal,
    Placeholder { start: usize, name: String },
}

impl Template {
    /// Parse template text.
    ///
    /// # Errors
    ///
    /// `TemplateError::Unterminated` if the text ends inside a placeholder.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut state = ScanState::Literal;
        let mut chars = source.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            state = match state {
                ScanState::Literal => match c {
                    '{' if chars.peek().map(|&(_, next)| next) == Some('{') => {
                        chars.next();
                        literal.push('{');
                        ScanState::Literal
                    }
                    '{' => ScanState::Placeholder {
                        start: position,
                        name: String::new(),
                    },
                    '}' if chars.peek().map(|&(_, next)| next) == Some('}') => {
                        chars.next();
                        literal.push('}');
                        ScanState::Literal
                    }
                    other => {
                        literal.push(other);
                        ScanState::Literal
                    }
                },
                ScanState::Placeholder { start, mut name } => match c {
                    '}' if !name.is_empty() => {
                        if !literal.is_empty() {
                            segments.push(Segment::Literal(std::mem::take(&mut literal)));
                        }
                        segments.push(Segment::Placeholder(name));
                        ScanState::Literal
                    }
                    c if is_name_char(c) => {
                        name.push(c);
                        ScanState::Placeholder { start, name }
                    }
                    // Not a placeholder after all: keep the run as written.
                    '{' => {
                        literal.push('{');
                        literal.push_str(&name);
                        ScanState::Placeholder {
                            start: position,
                            name: String::new(),
                        }
                    }
                    other => {
                        literal.push('{');
                        literal.push_str(&name);
                        literal.push(other);
                        ScanState::Literal
                    }
                },
            };
        }

        if let ScanState::Placeholder { start, .. } = state {
            return Err(TemplateError::Unterminated { position: start });
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance (repeats included).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder from `args`.
    ///
    /// Arguments without a placeholder are ignored.
    ///
    /// # Errors
    ///
    /// The names of every placeholder without an argument, deduplicated, in
    /// order of first appearance.
    pub fn render(&self, args: &LocaleArgs) -> Result<String, Vec<String>> {
        let mut output = String::with_capacity(self.source.len());
        let mut missing: Vec<String> = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder(name) => match args.get(name) {
                    Some(value) => output.push_str(value),
                    None => {
                        if !missing.iter().any(|m| m == name) {
                            missing.push(name.clone());
                        }
                    }
                },
            }
        }

        if missing.is_empty() {
            Ok(output)
        } else {
            Err(missing)
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Named arguments for template rendering.
///
/// Values are converted to strings when added, so the result of one lookup
/// can be passed as an argument to another.
///
/// # Examples
///
/// ```rust
/// use linex_sdk::locale::LocaleArgs;
///
/// let args = LocaleArgs::new().with("food", "pizza").with("count", 3);
///
/// assert_eq!(args.get("count"), Some("3"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleArgs {
    values: HashMap<String, String>,
}

impl LocaleArgs {
    /// Create an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument.
    pub fn with(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace an argument.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Display) {
        self.values.insert(name.into(), value.to_string());
    }

    /// Look up an argument.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether no arguments are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Display> FromIterator<(K, V)> for LocaleArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (name, value) in iter {
            args.insert(name, value);
        }
        args
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
