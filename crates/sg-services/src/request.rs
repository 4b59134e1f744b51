use sg_core::security::field::UntrustedField;
use sg_core::security::template::FieldSource;

/// Raw parameters of one request, in arrival order.
///
/// [`RequestParams::get`] hands values out as [`UntrustedField`]s and returns
/// `None` for absent keys, so every caller has to decide what absence means.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// First value supplied for `name`, if any.
    pub fn get(&self, name: &str) -> Option<UntrustedField> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| UntrustedField::new(value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FieldSource for RequestParams {
    fn field(&self, name: &str) -> Option<UntrustedField> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_first_value() {
        let params = RequestParams::from_pairs([("name", "ann"), ("name", "bob")]);
        assert_eq!(params.get("name").unwrap().as_raw(), "ann");
    }

    #[test]
    fn test_absent_is_none_and_empty_is_some() {
        let mut params = RequestParams::new();
        assert!(params.is_empty());
        params.insert("age", "");
        assert!(params.get("name").is_none());
        assert!(params.get("age").unwrap().is_empty());
    }
}
