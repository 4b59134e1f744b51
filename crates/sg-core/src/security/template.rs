//! Fixed-structure templates with escaped leaf values.
//!
//! A [`Template`] is parsed from a `&'static str`, so its structure is decided
//! when the code is written. Request data can only ever fill a `{field}` slot,
//! and every slot value is HTML-escaped exactly once on the way in.
//!
//! `{{` and `}}` render as literal braces.

use std::collections::HashMap;

use thiserror::Error;

use super::escape::SanitizedField;
use super::field::UntrustedField;

/// Substituted for a referenced field that the caller did not supply.
pub const DEFAULT_FALLBACK: &str = "unknown";

/// Errors in a template literal. These surface when the template is built,
/// never when it is rendered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unclosed placeholder at byte {0}")]
    Unclosed(usize),
    #[error("Empty placeholder at byte {0}")]
    EmptyPlaceholder(usize),
    #[error("Unmatched '}}' at byte {0}")]
    UnmatchedClose(usize),
    #[error("Invalid placeholder name: {0:?}")]
    InvalidName(String),
}

/// Anything that can answer "what did the caller send for `name`?".
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<UntrustedField>;
}

impl FieldSource for HashMap<String, UntrustedField> {
    fn field(&self, name: &str) -> Option<UntrustedField> {
        self.get(name).cloned()
    }
}

impl FieldSource for HashMap<&str, UntrustedField> {
    fn field(&self, name: &str) -> Option<UntrustedField> {
        self.get(name).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(&'static str),
}

#[derive(Debug, Clone)]
pub struct Template {
    source: &'static str,
    segments: Vec<Segment>,
    fallbacks: Vec<(&'static str, &'static str)>,
}

impl Template {
    pub fn new(source: &'static str) -> Result<Self, TemplateError> {
        Ok(Self {
            source,
            segments: parse(source)?,
            fallbacks: Vec::new(),
        })
    }

    /// Use `literal` instead of [`DEFAULT_FALLBACK`] when `field` is absent.
    pub fn with_fallback(mut self, field: &'static str, literal: &'static str) -> Self {
        self.fallbacks.retain(|(name, _)| *name != field);
        self.fallbacks.push((field, literal));
        self
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Placeholder names in order of appearance (duplicates included).
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(name) => Some(*name),
            Segment::Literal(_) => None,
        })
    }

    /// Render the template. Never fails: hostile values are neutralised by
    /// escaping and absent values degrade to their fallback literal.
    pub fn render<S: FieldSource + ?Sized>(&self, fields: &S) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    let value = match fields.field(name) {
                        Some(raw) => SanitizedField::from_untrusted(&raw),
                        None => SanitizedField::from_literal(self.fallback_for(name)),
                    };
                    out.push_str(value.as_str());
                }
            }
        }
        out
    }

    fn fallback_for(&self, field: &str) -> &'static str {
        self.fallbacks
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, literal)| *literal)
            .unwrap_or(DEFAULT_FALLBACK)
    }
}

/// Free-function form of [`Template::render`].
pub fn render<S: FieldSource + ?Sized>(template: &Template, fields: &S) -> String {
    template.render(fields)
}

fn parse(source: &'static str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(TemplateError::UnmatchedClose(pos)),
            '{' => {
                let start = pos + 1;
                let end = source[start..]
                    .find('}')
                    .map(|offset| start + offset)
                    .ok_or(TemplateError::Unclosed(pos))?;
                let name = &source[start..end];
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder(pos));
                }
                if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(TemplateError::InvalidName(name.to_string()));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(name));
                // Skip the name and the closing brace.
                for (next, _) in chars.by_ref() {
                    if next == end {
                        break;
                    }
                }
            }
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting() -> Template {
        Template::new("Hello {name}! Your age is {age}.")
            .unwrap()
            .with_fallback("name", "")
    }

    fn fields(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, UntrustedField> {
        pairs
            .iter()
            .map(|(k, v)| (*k, UntrustedField::new(*v)))
            .collect()
    }

    #[test]
    fn test_parse_fields_in_order() {
        let template = Template::new("{a} and {b_2}, then {a}").unwrap();
        assert_eq!(template.fields().collect::<Vec<_>>(), vec!["a", "b_2", "a"]);
    }

    #[test]
    fn test_script_is_escaped() {
        let out = greeting().render(&fields(&[
            ("name", "<script>alert(1)</script>"),
            ("age", "30"),
        ]));
        assert!(out.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!out.contains("<script>"));
        assert_eq!(
            out,
            "Hello &lt;script&gt;alert(1)&lt;/script&gt;! Your age is 30."
        );
    }

    #[test]
    fn test_no_raw_special_characters_from_fields() {
        let out = greeting().render(&fields(&[("name", r#"<>&"'"#), ("age", r#"'"><"#)]));
        let without_template = out
            .trim_start_matches("Hello ")
            .replace("! Your age is ", "")
            .trim_end_matches('.')
            .replace("&amp;", "")
            .replace("&lt;", "")
            .replace("&gt;", "")
            .replace("&quot;", "")
            .replace("&#x27;", "");
        for ch in ['<', '>', '&', '"', '\''] {
            assert!(!without_template.contains(ch), "raw {:?} leaked", ch);
        }
    }

    #[test]
    fn test_escapes_exactly_once() {
        let out = greeting().render(&fields(&[("name", "&amp;"), ("age", "1")]));
        assert_eq!(out, "Hello &amp;amp;! Your age is 1.");
    }

    #[test]
    fn test_absent_field_uses_default_fallback() {
        let out = greeting().render(&fields(&[("name", "<b>x</b>")]));
        assert_eq!(out, "Hello &lt;b&gt;x&lt;/b&gt;! Your age is unknown.");
    }

    #[test]
    fn test_absent_field_uses_declared_fallback() {
        let out = greeting().render(&HashMap::<&str, UntrustedField>::new());
        assert_eq!(out, "Hello ! Your age is unknown.");
    }

    #[test]
    fn test_present_but_empty_is_not_absent() {
        let out = greeting().render(&fields(&[("name", "ann"), ("age", "")]));
        assert_eq!(out, "Hello ann! Your age is .");
    }

    #[test]
    fn test_fallback_override_replaces_previous() {
        let template = Template::new("{x}")
            .unwrap()
            .with_fallback("x", "first")
            .with_fallback("x", "second");
        assert_eq!(template.render(&HashMap::<String, UntrustedField>::new()), "second");
    }

    #[test]
    fn test_placeholder_syntax_in_value_is_not_expanded() {
        let out = greeting().render(&fields(&[("name", "{age}"), ("age", "7")]));
        assert_eq!(out, "Hello {age}! Your age is 7.");
    }

    #[test]
    fn test_literal_braces() {
        let template = Template::new("{{{v}}}").unwrap();
        let out = render(&template, &fields(&[("v", "1")]));
        assert_eq!(out, "{1}");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Template::new("Hi {name").unwrap_err(), TemplateError::Unclosed(3));
        assert_eq!(Template::new("Hi {}").unwrap_err(), TemplateError::EmptyPlaceholder(3));
        assert_eq!(Template::new("Hi }").unwrap_err(), TemplateError::UnmatchedClose(3));
        assert!(matches!(
            Template::new("{a b}").unwrap_err(),
            TemplateError::InvalidName(_)
        ));
    }
}
