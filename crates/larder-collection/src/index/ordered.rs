use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

use larder_types::{Attribute, Query, Record, Value};

use super::{targets, Index, IndexFactory};
use crate::error::IndexBuildError;

/// Sorted index: value -> keys, in value order.
///
/// Answers everything [`super::HashIndex`] answers plus the range operators
/// and `StartsWith` on text values. Range answers exclude [`Value::Null`].
pub struct OrderedIndex<T: Record> {
    attribute: Attribute<T>,
    tree: BTreeMap<Value, HashSet<T::Key>>,
}

impl<T: Record> OrderedIndex<T> {
    pub fn new(attribute: Attribute<T>) -> Self {
        Self {
            attribute,
            tree: BTreeMap::new(),
        }
    }

    /// Smallest non-null indexed value.
    pub fn min_value(&self) -> Option<&Value> {
        self.tree.keys().find(|v| !v.is_null())
    }

    /// Largest indexed value.
    pub fn max_value(&self) -> Option<&Value> {
        self.tree.keys().next_back().filter(|v| !v.is_null())
    }

    fn keys_for(&self, value: &Value) -> HashSet<T::Key> {
        self.tree.get(value).cloned().unwrap_or_default()
    }

    fn range(&self, lower: Bound<&Value>, upper: Bound<&Value>) -> HashSet<T::Key> {
        if is_empty_range(lower, upper) {
            return HashSet::new();
        }
        self.tree
            .range::<Value, _>((lower, upper))
            .filter(|(v, _)| !v.is_null())
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    fn prefixed(&self, prefix: &str) -> HashSet<T::Key> {
        let start = Value::Text(prefix.to_string());
        self.tree
            .range::<Value, _>((Bound::Included(&start), Bound::Unbounded))
            .take_while(|(v, _)| v.as_text().is_some_and(|s| s.starts_with(prefix)))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }
}

// `BTreeMap::range` panics on inverted bounds and on equal bounds that are
// both excluded.
fn is_empty_range(lower: Bound<&Value>, upper: Bound<&Value>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}

impl<T: Record> Index<T> for OrderedIndex<T> {
    fn attribute(&self) -> &Attribute<T> {
        &self.attribute
    }

    fn kind(&self) -> &str {
        "ordered"
    }

    fn insert(&mut self, key: &T::Key, record: &T) {
        let value = self.attribute.value_of(record);
        self.tree.entry(value).or_default().insert(key.clone());
    }

    fn remove(&mut self, key: &T::Key, record: &T) {
        let value = self.attribute.value_of(record);
        if let Some(keys) = self.tree.get_mut(&value) {
            keys.remove(key);
            if keys.is_empty() {
                self.tree.remove(&value);
            }
        }
    }

    fn clear(&mut self) {
        self.tree.clear();
    }

    fn lookup(&self, query: &Query<T>) -> Option<HashSet<T::Key>> {
        if !targets(query, self.attribute.name()) {
            return None;
        }
        let keys = match query {
            Query::Equal(_, v) => self.keys_for(v),
            Query::In(_, vs) => vs.iter().flat_map(|v| self.keys_for(v)).collect(),
            Query::Present(_) => self.range(Bound::Excluded(&Value::Null), Bound::Unbounded),
            Query::LessThan {
                bound, inclusive, ..
            } => {
                let upper = if *inclusive {
                    Bound::Included(bound)
                } else {
                    Bound::Excluded(bound)
                };
                self.range(Bound::Unbounded, upper)
            }
            Query::GreaterThan {
                bound, inclusive, ..
            } => {
                let lower = if *inclusive {
                    Bound::Included(bound)
                } else {
                    Bound::Excluded(bound)
                };
                self.range(lower, Bound::Unbounded)
            }
            Query::Between { lower, upper, .. } => {
                self.range(Bound::Included(lower), Bound::Included(upper))
            }
            Query::StartsWith(_, prefix) => self.prefixed(prefix),
            _ => return None,
        };
        Some(keys)
    }
}

/// Builds [`OrderedIndex`]es.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderedIndexFactory;

impl<T: Record> IndexFactory<T> for OrderedIndexFactory {
    fn kind(&self) -> &str {
        "ordered"
    }

    fn build(&self, attribute: &Attribute<T>) -> Result<Box<dyn Index<T>>, IndexBuildError> {
        Ok(Box::new(OrderedIndex::new(attribute.clone())))
    }
}
