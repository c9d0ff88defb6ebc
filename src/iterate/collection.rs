//! Collections accepted by the cooperative iterator.
//!
//! Both shapes are normalized to an ordered list of `(Key, value)` entries:
//! - sequences get positional keys ([`Key::Index`]);
//! - keyed mappings get field keys ([`Key::Field`]) in the order they were supplied.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Key of one visited element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Position in a sequence.
    Index(usize),
    /// Field name in a keyed mapping.
    Field(Arc<str>),
}

impl Key {
    /// Returns the position for sequence keys.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Field(_) => None,
        }
    }

    /// Returns the field name for mapping keys.
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Key::Index(_) => None,
            Key::Field(f) => Some(f.as_ref()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "#{i}"),
            Key::Field(name) => f.write_str(name),
        }
    }
}

/// Ordered `(key, value)` view over a sequence or a keyed mapping.
#[derive(Debug, Clone)]
pub struct Collection<V> {
    entries: Vec<(Key, V)>,
}

impl<V> Collection<V> {
    /// Sequence with positional keys `0..n`.
    pub fn sequence(values: impl IntoIterator<Item = V>) -> Self {
        Self {
            entries: values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Key::Index(i), v))
                .collect(),
        }
    }

    /// Mapping with field keys, visited in the order supplied.
    pub fn keyed<K: Into<Arc<str>>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (Key::Field(k.into()), v))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(Key, V)> {
        self.entries
    }
}

impl<V> From<Vec<V>> for Collection<V> {
    fn from(values: Vec<V>) -> Self {
        Collection::sequence(values)
    }
}

impl<V> From<BTreeMap<String, V>> for Collection<V> {
    fn from(map: BTreeMap<String, V>) -> Self {
        Collection::keyed(map)
    }
}

/// Hash maps have no stable order; fields are sorted so runs are reproducible.
impl<V> From<HashMap<String, V>> for Collection<V> {
    fn from(map: HashMap<String, V>) -> Self {
        let mut pairs: Vec<(String, V)> = map.into_iter().collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Collection::keyed(pairs)
    }
}
