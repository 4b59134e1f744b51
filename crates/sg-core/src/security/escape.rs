//! HTML entity escaping for values interpolated into markup.

use std::fmt;

use super::field::UntrustedField;

/// Escape the five characters that can change markup or attribute context.
///
/// `&` is handled in the same single pass as the others, so every input
/// character is escaped exactly once.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// A value that is safe to place into an HTML body or quoted attribute.
///
/// Only constructible by escaping, either an [`UntrustedField`] or a
/// compile-time literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedField(String);

impl SanitizedField {
    pub fn from_untrusted(field: &UntrustedField) -> Self {
        Self(escape_html(field.as_raw()))
    }

    /// Escape a fixed fallback literal.
    pub fn from_literal(literal: &'static str) -> Self {
        Self(escape_html(literal))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SanitizedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
