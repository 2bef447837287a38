//! Case-insensitive multi-valued metadata map.

use std::collections::HashMap;

/// Request metadata map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    entries: HashMap<String, Vec<String>>,
}

impl RequestMetadata {
    /// Create an empty metadata map.
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(key: &str) -> String {
        key.to_ascii_lowercase()
    }

    /// Append a value under `key`.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(Self::normalize(key))
            .or_default()
            .push(value.into());
    }

    /// Replace every value under `key` with `value`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(Self::normalize(key), vec![value.into()]);
    }

    /// All values under `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&Self::normalize(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The value under `key` if exactly one is present.
    pub fn get_single(&self, key: &str) -> Option<&str> {
        match self.get_all(key) {
            [value] => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.entries.remove(&Self::normalize(key))
    }

    /// Iterate over `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RequestMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Self::new();
        for (key, value) in iter {
            metadata.insert(key.as_ref(), value);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut md = RequestMetadata::new();
        md.insert("Authorization", "ClusterKey 00");
        assert_eq!(md.get_single("authorization"), Some("ClusterKey 00"));
        assert_eq!(md.get_single("AUTHORIZATION"), Some("ClusterKey 00"));
    }

    #[test]
    fn test_get_single_requires_exactly_one_value() {
        let mut md: RequestMetadata = [("x-test", "a"), ("X-Test", "b")].into_iter().collect();
        assert_eq!(md.get_all("x-test").len(), 2);
        assert_eq!(md.get_single("x-test"), None);
        assert_eq!(md.get_single("missing"), None);

        md.set("x-test", "c");
        assert_eq!(md.get_single("x-test"), Some("c"));
    }

    #[test]
    fn test_remove() {
        let mut md = RequestMetadata::new();
        md.insert("a", "1");
        assert_eq!(md.remove("A"), Some(vec!["1".to_string()]));
        assert!(md.is_empty());
    }
}
