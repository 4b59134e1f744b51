//! Raw values received from an external caller.

use std::fmt;

/// A string that originated outside the process (a request parameter).
///
/// Nothing is assumed about its content. No `Deref` to `str` and no
/// `Display`: the raw text is only reachable through
/// [`UntrustedField::as_raw`].
#[derive(Clone, PartialEq, Eq)]
pub struct UntrustedField(String);

impl UntrustedField {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw, unvalidated text.
    pub fn as_raw(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for UntrustedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `{:?}` escapes control characters, so log lines stay single-line.
        f.debug_tuple("UntrustedField").field(&self.0).finish()
    }
}

impl From<&str> for UntrustedField {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UntrustedField {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_is_preserved() {
        let field = UntrustedField::new("<b>x</b>; id");
        assert_eq!(field.as_raw(), "<b>x</b>; id");
        assert_eq!(field.len(), 12);
        assert!(!field.is_empty());
        assert!(UntrustedField::from("").is_empty());
    }

    #[test]
    fn test_debug_escapes_newlines() {
        let field = UntrustedField::new("a\nb");
        assert_eq!(format!("{:?}", field), r#"UntrustedField("a\nb")"#);
    }
}
