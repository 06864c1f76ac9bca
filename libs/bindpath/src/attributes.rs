//! Per-call converter attributes

use std::collections::BTreeMap;

/// Format pattern (chrono `strftime` syntax) required by temporal converters
pub const DATE_TIME_FORMAT: &str = "dateTimeFormat";

/// Directory that relative paths are resolved against
pub const PARENT_DIR: &str = "parentDir";

/// String-keyed options passed through to every converter in a single call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: BTreeMap<String, String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn date_time_format(&self) -> Option<&str> {
        self.get(DATE_TIME_FORMAT)
    }

    pub fn parent_dir(&self) -> Option<&str> {
        self.get(PARENT_DIR)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_keys() {
        let attrs = Attributes::new()
            .with(DATE_TIME_FORMAT, "%Y-%m-%d")
            .with(PARENT_DIR, "/tmp");
        assert_eq!(attrs.date_time_format(), Some("%Y-%m-%d"));
        assert_eq!(attrs.parent_dir(), Some("/tmp"));
        assert_eq!(attrs.get("other"), None);
    }

    #[test]
    fn test_from_iter_and_overwrite() {
        let mut attrs: Attributes = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(attrs.insert("a", "3").as_deref(), Some("1"));
        assert_eq!(attrs.get("a"), Some("3"));
        assert!(Attributes::new().is_empty());
    }
}
