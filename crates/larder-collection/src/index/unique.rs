use std::collections::{HashMap, HashSet};

use larder_types::{Attribute, Query, Record, Value};

use super::{targets, Index, IndexFactory};
use crate::error::{CollectionError, CollectionResult, IndexBuildError};

/// Unique equality index: value -> the single key holding it.
///
/// Null values are not indexed and never conflict, so `Equal(Null)` and
/// `Present` fall back to a scan.
pub struct UniqueIndex<T: Record> {
    attribute: Attribute<T>,
    entries: HashMap<Value, T::Key>,
}

impl<T: Record> UniqueIndex<T> {
    pub fn new(attribute: Attribute<T>) -> Self {
        Self {
            attribute,
            entries: HashMap::new(),
        }
    }

    /// The key holding `value`, if any.
    pub fn get(&self, value: &Value) -> Option<&T::Key> {
        self.entries.get(value)
    }
}

impl<T: Record> Index<T> for UniqueIndex<T> {
    fn attribute(&self) -> &Attribute<T> {
        &self.attribute
    }

    fn kind(&self) -> &str {
        "unique"
    }

    fn check(&self, key: &T::Key, record: &T) -> CollectionResult<()> {
        let value = self.attribute.value_of(record);
        if value.is_null() {
            return Ok(());
        }
        match self.entries.get(&value) {
            Some(holder) if holder != key => Err(CollectionError::UniqueViolation {
                attribute: self.attribute.name().to_string(),
                value: value.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, key: &T::Key, record: &T) {
        let value = self.attribute.value_of(record);
        if !value.is_null() {
            self.entries.insert(value, key.clone());
        }
    }

    fn remove(&mut self, key: &T::Key, record: &T) {
        let value = self.attribute.value_of(record);
        if self.entries.get(&value) == Some(key) {
            self.entries.remove(&value);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn lookup(&self, query: &Query<T>) -> Option<HashSet<T::Key>> {
        if !targets(query, self.attribute.name()) {
            return None;
        }
        match query {
            Query::Equal(_, v) if !v.is_null() => {
                Some(self.entries.get(v).cloned().into_iter().collect())
            }
            Query::In(_, vs) if vs.iter().all(|v| !v.is_null()) => Some(
                vs.iter()
                    .filter_map(|v| self.entries.get(v).cloned())
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Builds [`UniqueIndex`]es.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniqueIndexFactory;

impl<T: Record> IndexFactory<T> for UniqueIndexFactory {
    fn kind(&self) -> &str {
        "unique"
    }

    fn build(&self, attribute: &Attribute<T>) -> Result<Box<dyn Index<T>>, IndexBuildError> {
        Ok(Box::new(UniqueIndex::new(attribute.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{person, Person};

    #[test]
    fn check_rejects_value_held_by_other_key() {
        let ann = person(1, "ann", 30, None);
        let mut idx = UniqueIndex::new(Person::name());
        idx.insert(&ann.id, &ann);

        let impostor = person(2, "ann", 41, None);
        let err = idx.check(&impostor.id, &impostor).unwrap_err();
        assert_eq!(
            err,
            CollectionError::UniqueViolation {
                attribute: "name".into(),
                value: "\"ann\"".into(),
            }
        );
        // Same key re-inserting the same value is fine.
        assert!(idx.check(&ann.id, &ann).is_ok());
    }

    #[test]
    fn nulls_never_conflict() {
        let mut idx = UniqueIndex::new(Person::city());
        let a = person(1, "a", 1, None);
        let b = person(2, "b", 2, None);
        idx.insert(&a.id, &a);
        assert!(idx.check(&b.id, &b).is_ok());
        assert!(idx.lookup(&Person::city().equal(Value::Null)).is_none());
        assert!(idx.lookup(&Person::city().present()).is_none());
    }

    #[test]
    fn lookup_and_remove() {
        let mut idx = UniqueIndex::new(Person::name());
        let a = person(1, "a", 1, None);
        let b = person(2, "b", 2, None);
        idx.insert(&a.id, &a);
        idx.insert(&b.id, &b);

        let found = idx.lookup(&Person::name().one_of(["a", "b", "c"])).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(idx.get(&Value::from("b")), Some(&2));

        idx.remove(&a.id, &a);
        assert!(idx.lookup(&Person::name().equal("a")).unwrap().is_empty());
    }
}
