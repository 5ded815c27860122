use std::collections::{HashMap, HashSet};

use larder_types::{Attribute, Query, Record, Value};

use super::{targets, Index, IndexFactory};
use crate::error::IndexBuildError;

/// Equality index: value -> keys.
///
/// Answers `Equal`, `In` and `Present`.
pub struct HashIndex<T: Record> {
    attribute: Attribute<T>,
    buckets: HashMap<Value, HashSet<T::Key>>,
}

impl<T: Record> HashIndex<T> {
    pub fn new(attribute: Attribute<T>) -> Self {
        Self {
            attribute,
            buckets: HashMap::new(),
        }
    }

    /// Number of distinct values indexed.
    pub fn distinct_values(&self) -> usize {
        self.buckets.len()
    }

    fn keys_for(&self, value: &Value) -> HashSet<T::Key> {
        self.buckets.get(value).cloned().unwrap_or_default()
    }
}

impl<T: Record> Index<T> for HashIndex<T> {
    fn attribute(&self) -> &Attribute<T> {
        &self.attribute
    }

    fn kind(&self) -> &str {
        "hash"
    }

    fn insert(&mut self, key: &T::Key, record: &T) {
        let value = self.attribute.value_of(record);
        self.buckets.entry(value).or_default().insert(key.clone());
    }

    fn remove(&mut self, key: &T::Key, record: &T) {
        let value = self.attribute.value_of(record);
        if let Some(keys) = self.buckets.get_mut(&value) {
            keys.remove(key);
            if keys.is_empty() {
                self.buckets.remove(&value);
            }
        }
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }

    fn lookup(&self, query: &Query<T>) -> Option<HashSet<T::Key>> {
        if !targets(query, self.attribute.name()) {
            return None;
        }
        match query {
            Query::Equal(_, v) => Some(self.keys_for(v)),
            Query::In(_, vs) => Some(vs.iter().flat_map(|v| self.keys_for(v)).collect()),
            Query::Present(_) => Some(
                self.buckets
                    .iter()
                    .filter(|(v, _)| !v.is_null())
                    .flat_map(|(_, keys)| keys.iter().cloned())
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Builds [`HashIndex`]es.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashIndexFactory;

impl<T: Record> IndexFactory<T> for HashIndexFactory {
    fn kind(&self) -> &str {
        "hash"
    }

    fn build(&self, attribute: &Attribute<T>) -> Result<Box<dyn Index<T>>, IndexBuildError> {
        Ok(Box::new(HashIndex::new(attribute.clone())))
    }
}
