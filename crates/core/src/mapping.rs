use indexmap::IndexMap;
use serde::Serialize;

/// Insertion-ordered container keyed by code.
///
/// Order is meaningful: it is the classification-code sequence as it appeared
/// in the sheet. Re-inserting an existing key replaces the value in place and
/// keeps the original position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Mapping<V> {
    entries: IndexMap<String, V>,
}

impl<V> Default for Mapping<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<V> Mapping<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or silently replace.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    /// Position of `key` in insertion order.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }
}

impl<V: Clone + Default> Mapping<V> {
    /// Lookup that falls back to `V::default()` for absent keys.
    pub fn get_or_default(&self, key: &str) -> V {
        self.entries.get(key).cloned().unwrap_or_default()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Mapping<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut m = Mapping::new();
        m.insert("B", 2);
        m.insert("A", 1);
        m.insert("C", 3);
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["B", "A", "C"]);
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut m = Mapping::new();
        m.insert("B", 2);
        m.insert("A", 1);
        let old = m.insert("B", 20);
        assert_eq!(old, Some(2));
        assert_eq!(m.len(), 2);
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![("B", &20), ("A", &1)]);
    }

    #[test]
    fn default_valued_lookup() {
        let m: Mapping<i64> = [("x", 5)].into_iter().collect();
        assert_eq!(m.get_or_default("x"), 5);
        assert_eq!(m.get_or_default("missing"), 0);
        assert!(m.contains_key("x"));
        assert!(!m.contains_key("X"));
    }
}
