//! The default [`IndexedCollection`]: records and indexes behind one lock.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use larder_types::{Query, QueryOptions, Record};

use crate::collection::{IndexedCollection, ResultSet};
use crate::error::{CollectionError, CollectionResult, IndexBuildError};
use crate::index::Index;

struct State<T: Record> {
    records: HashMap<T::Key, T>,
    indexes: Vec<Box<dyn Index<T>>>,
}

/// Prior value of a key, replayed in reverse to undo a failed batch.
type Undo<T> = Vec<(<T as Record>::Key, Option<T>)>;

impl<T: Record> State<T> {
    fn take(&mut self, key: &T::Key) -> Option<T> {
        let record = self.records.remove(key)?;
        for idx in &mut self.indexes {
            idx.remove(key, &record);
        }
        Some(record)
    }

    fn put(&mut self, key: T::Key, record: T) {
        for idx in &mut self.indexes {
            idx.insert(&key, &record);
        }
        self.records.insert(key, record);
    }

    fn check(&self, key: &T::Key, record: &T) -> CollectionResult<()> {
        self.indexes.iter().try_for_each(|idx| idx.check(key, record))
    }

    fn rollback(&mut self, undo: Undo<T>) {
        for (key, prior) in undo.into_iter().rev() {
            self.take(&key);
            if let Some(record) = prior {
                self.put(key, record);
            }
        }
    }

    /// Remove `removals` by key, then upsert `inserts`; all or nothing.
    fn apply(&mut self, removals: &[T], inserts: &[T]) -> CollectionResult<()> {
        let mut undo: Undo<T> = Vec::with_capacity(removals.len() + inserts.len());
        for r in removals {
            let key = r.key();
            if let Some(prior) = self.take(&key) {
                undo.push((key, Some(prior)));
            }
        }
        for r in inserts {
            let key = r.key();
            let prior = self.take(&key);
            if let Err(e) = self.check(&key, r) {
                undo.push((key, prior));
                self.rollback(undo);
                return Err(e);
            }
            self.put(key.clone(), r.clone());
            undo.push((key, prior));
        }
        Ok(())
    }

    /// Insert `inserts` only if none of their keys is stored; all or nothing.
    fn apply_new(&mut self, inserts: &[T]) -> CollectionResult<()> {
        let mut batch = HashSet::with_capacity(inserts.len());
        for r in inserts {
            let key = r.key();
            if self.records.contains_key(&key) || !batch.insert(key.clone()) {
                return Err(CollectionError::KeyExists {
                    key: format!("{key:?}"),
                });
            }
        }
        self.apply(&[], inserts)
    }

    fn all_keys(&self) -> HashSet<T::Key> {
        self.records.keys().cloned().collect()
    }

    fn scan(&self, query: &Query<T>) -> HashSet<T::Key> {
        self.records
            .iter()
            .filter(|(_, r)| query.matches(r))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Answer a leaf query from the first attached index that supports it.
    fn indexed(&self, query: &Query<T>) -> Option<HashSet<T::Key>> {
        self.indexes.iter().find_map(|idx| idx.lookup(query))
    }

    fn evaluate(&self, query: &Query<T>) -> HashSet<T::Key> {
        match query {
            Query::All => self.all_keys(),
            Query::And(parts) => self.evaluate_and(query, parts),
            Query::Or(parts) => parts.iter().flat_map(|q| self.evaluate(q)).collect(),
            Query::Not(inner) => {
                let excluded = self.evaluate(inner);
                self.records
                    .keys()
                    .filter(|k| !excluded.contains(*k))
                    .cloned()
                    .collect()
            }
            leaf => self.indexed(leaf).unwrap_or_else(|| self.scan(leaf)),
        }
    }

    // Drive a conjunction from its most selective indexed leaf and filter the
    // candidates with the remaining parts.
    fn evaluate_and(&self, whole: &Query<T>, parts: &[Query<T>]) -> HashSet<T::Key> {
        let driver = parts
            .iter()
            .enumerate()
            .filter_map(|(i, q)| self.indexed(q).map(|keys| (i, keys)))
            .min_by_key(|(_, keys)| keys.len());

        let Some((driver_pos, candidates)) = driver else {
            return self.scan(whole);
        };

        candidates
            .into_iter()
            .filter(|k| {
                self.records.get(k).is_some_and(|r| {
                    parts
                        .iter()
                        .enumerate()
                        .all(|(i, q)| i == driver_pos || q.matches(r))
                })
            })
            .collect()
    }
}

/// Thread-safe indexed collection.
///
/// Records and their indexes live behind a single `RwLock`, so every
/// mutation (including `replace` and `extract`) is atomic with respect to
/// readers, and queries see a consistent view of records and indexes.
pub struct ConcurrentIndexedCollection<T: Record> {
    state: RwLock<State<T>>,
}

impl<T: Record> ConcurrentIndexedCollection<T> {
    /// Create a new empty collection.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(State {
                records: HashMap::with_capacity(capacity),
                indexes: Vec::new(),
            }),
        }
    }
}

impl<T: Record> Default for ConcurrentIndexedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> IndexedCollection<T> for ConcurrentIndexedCollection<T> {
    fn insert(&self, records: &[T]) -> CollectionResult<()> {
        self.state.write().apply(&[], records)
    }

    fn insert_new(&self, records: &[T]) -> CollectionResult<()> {
        self.state.write().apply_new(records)
    }

    fn remove_all(&self, records: &[T]) -> usize {
        let mut state = self.state.write();
        records
            .iter()
            .filter(|r| state.take(&r.key()).is_some())
            .count()
    }

    fn replace(&self, old: &[T], new: &[T], _options: &QueryOptions) -> CollectionResult<()> {
        self.state.write().apply(old, new)
    }

    fn extract(&self, query: &Query<T>) -> Vec<T> {
        let mut state = self.state.write();
        let keys = state.evaluate(query);
        keys.iter().filter_map(|k| state.take(k)).collect()
    }

    fn clear(&self) {
        let mut state = self.state.write();
        state.records.clear();
        for idx in &mut state.indexes {
            idx.clear();
        }
    }

    fn len(&self) -> usize {
        self.state.read().records.len()
    }

    fn get(&self, key: &T::Key) -> Option<T> {
        self.state.read().records.get(key).cloned()
    }

    fn snapshot(&self) -> Vec<T> {
        self.state.read().records.values().cloned().collect()
    }

    fn retrieve(&self, query: &Query<T>, _options: &QueryOptions) -> ResultSet<'_, T> {
        let state = self.state.read();
        let keys = state.evaluate(query);
        let len = keys.len();
        let records = keys
            .into_iter()
            .filter_map(move |k| state.records.get(&k).cloned());
        ResultSet::new(Box::new(records), len)
    }

    fn add_index(&self, mut index: Box<dyn Index<T>>) -> Result<(), IndexBuildError> {
        let mut state = self.state.write();
        let attribute = index.attribute().name().to_string();
        let kind = index.kind().to_string();

        let duplicate = state
            .indexes
            .iter()
            .any(|idx| idx.attribute().name() == attribute && idx.kind() == kind);
        if duplicate {
            return Err(IndexBuildError::Duplicate { attribute, kind });
        }

        for (key, record) in &state.records {
            if let Err(source) = index.check(key, record) {
                return Err(IndexBuildError::Rejected {
                    attribute,
                    kind,
                    source,
                });
            }
            index.insert(key, record);
        }

        debug!(%attribute, %kind, records = state.records.len(), "index attached");
        state.indexes.push(index);
        Ok(())
    }

    fn index_names(&self) -> Vec<String> {
        self.state
            .read()
            .indexes
            .iter()
            .map(|idx| format!("{}({})", idx.kind(), idx.attribute().name()))
            .collect()
    }
}

impl<T: Record> std::fmt::Debug for ConcurrentIndexedCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ConcurrentIndexedCollection")
            .field("records", &state.records.len())
            .field("indexes", &state.indexes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{HashIndex, OrderedIndex, UniqueIndex};
    use crate::testing::{person, Person};
    use larder_types::Value;

    fn people() -> Vec<Person> {
        vec![
            person(1, "ann", 20, Some("oslo")),
            person(2, "bo", 30, Some("rome")),
            person(3, "cy", 40, None),
            person(4, "di", 50, Some("oslo")),
        ]
    }

    fn loaded() -> ConcurrentIndexedCollection<Person> {
        let coll = ConcurrentIndexedCollection::new();
        coll.insert(&people()).unwrap();
        coll
    }

    fn ids(records: impl IntoIterator<Item = Person>) -> Vec<u32> {
        let mut v: Vec<u32> = records.into_iter().map(|p| p.id).collect();
        v.sort_unstable();
        v
    }

    fn none() -> QueryOptions {
        QueryOptions::none()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    #[test]
    fn insert_upserts_by_key() {
        let coll = loaded();
        coll.insert(&[person(2, "bob", 31, Some("rome"))]).unwrap();
        assert_eq!(coll.len(), 4);
        assert_eq!(coll.get(&2).unwrap().name, "bob");
    }

    #[test]
    fn insert_new_never_replaces_a_stored_record() {
        let coll = loaded();
        let err = coll
            .insert_new(&[person(9, "new", 1, None), person(2, "impostor", 0, None)])
            .unwrap_err();
        assert_eq!(err, CollectionError::KeyExists { key: "2".into() });
        assert_eq!(coll.get(&2).unwrap().name, "bo");
        assert!(coll.get(&9).is_none());

        let err = coll
            .insert_new(&[person(9, "a", 1, None), person(9, "b", 2, None)])
            .unwrap_err();
        assert!(matches!(err, CollectionError::KeyExists { .. }));
        assert!(coll.get(&9).is_none());

        coll.insert_new(&[person(9, "new", 1, None)]).unwrap();
        assert_eq!(coll.len(), 5);
    }

    #[test]
    fn remove_all_counts_present_records() {
        let coll = loaded();
        let removed = coll.remove_all(&[person(1, "", 0, None), person(99, "", 0, None)]);
        assert_eq!(removed, 1);
        assert!(coll.get(&1).is_none());
    }

    #[test]
    fn replace_swaps_versions_and_reindexes() {
        let coll = loaded();
        coll.add_index(Box::new(HashIndex::new(Person::city()))).unwrap();

        let moved = person(1, "ann", 20, Some("lima"));
        coll.replace(&[moved.clone()], &[moved], &none()).unwrap();

        let in_oslo = coll.retrieve(&Person::city().equal("oslo"), &none());
        assert_eq!(ids(in_oslo), vec![4]);
        let in_lima = coll.retrieve(&Person::city().equal("lima"), &none());
        assert_eq!(ids(in_lima), vec![1]);
    }

    #[test]
    fn failed_batch_rolls_back() {
        let coll = loaded();
        coll.add_index(Box::new(UniqueIndex::new(Person::name()))).unwrap();

        // Second record collides with "bo" (id 2); the first must not stick.
        let err = coll
            .insert(&[person(7, "gus", 1, None), person(8, "bo", 2, None)])
            .unwrap_err();
        assert!(matches!(err, CollectionError::UniqueViolation { .. }));
        assert_eq!(coll.len(), 4);
        assert!(coll.get(&7).is_none());

        // Replace that fails leaves the old version in place and indexed.
        let err = coll
            .replace(&[person(1, "", 0, None)], &[person(1, "cy", 20, None)], &none())
            .unwrap_err();
        assert!(matches!(err, CollectionError::UniqueViolation { .. }));
        assert_eq!(coll.get(&1).unwrap().name, "ann");
        assert_eq!(ids(coll.retrieve(&Person::name().equal("ann"), &none())), vec![1]);
    }

    #[test]
    fn unique_index_allows_renaming_within_same_key() {
        let coll = loaded();
        coll.add_index(Box::new(UniqueIndex::new(Person::name()))).unwrap();
        coll.insert(&[person(1, "ann", 99, None)]).unwrap();
        assert_eq!(coll.get(&1).unwrap().age, 99);
    }

    #[test]
    fn extract_removes_exactly_matches() {
        let coll = loaded();
        coll.add_index(Box::new(OrderedIndex::new(Person::age()))).unwrap();
        let taken = coll.extract(&Person::age().at_least(40));
        assert_eq!(ids(taken), vec![3, 4]);
        assert_eq!(ids(coll.snapshot()), vec![1, 2]);
        assert!(coll
            .retrieve(&Person::age().at_least(40), &none())
            .is_empty());
    }

    #[test]
    fn clear_keeps_indexes_attached() {
        let coll = loaded();
        coll.add_index(Box::new(HashIndex::new(Person::city()))).unwrap();
        coll.clear();
        assert!(coll.is_empty());
        assert_eq!(coll.index_names(), vec!["hash(city)".to_string()]);

        coll.insert(&[person(9, "zed", 9, Some("oslo"))]).unwrap();
        assert_eq!(ids(coll.retrieve(&Person::city().equal("oslo"), &none())), vec![9]);
    }

    // -----------------------------------------------------------------------
    // Index attachment
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_index_is_rejected() {
        let coll = loaded();
        coll.add_index(Box::new(HashIndex::new(Person::city()))).unwrap();
        let err = coll
            .add_index(Box::new(HashIndex::new(Person::city())))
            .unwrap_err();
        assert_eq!(
            err,
            IndexBuildError::Duplicate {
                attribute: "city".into(),
                kind: "hash".into()
            }
        );
        // A different kind on the same attribute is fine.
        coll.add_index(Box::new(OrderedIndex::new(Person::city()))).unwrap();
        assert_eq!(coll.index_names().len(), 2);
    }

    #[test]
    fn unique_index_over_duplicates_is_rejected() {
        let coll = loaded();
        let err = coll
            .add_index(Box::new(UniqueIndex::new(Person::city())))
            .unwrap_err();
        assert!(matches!(err, IndexBuildError::Rejected { ref kind, .. } if kind == "unique"));
        assert!(coll.index_names().is_empty());
        // Collection still answers the query by scanning.
        assert_eq!(ids(coll.retrieve(&Person::city().equal("oslo"), &none())), vec![1, 4]);
    }

    // -----------------------------------------------------------------------
    // Query planning
    // -----------------------------------------------------------------------

    #[test]
    fn indexed_and_scanned_answers_agree() {
        let plain = loaded();
        let indexed = loaded();
        indexed.add_index(Box::new(OrderedIndex::new(Person::age()))).unwrap();
        indexed.add_index(Box::new(HashIndex::new(Person::city()))).unwrap();

        let queries = vec![
            Query::All,
            Person::age().between(25, 45),
            Person::city().equal("oslo").and(Person::age().greater_than(20)),
            Person::city().present().and(Person::name().starts_with("d")),
            Person::age().less_than(25).or(Person::city().equal(Value::Null)),
            Person::city().equal("oslo").negate(),
            Person::name().equal("bo").and(Person::age().equal(30)),
            Query::And(vec![]),
        ];
        for q in queries {
            assert_eq!(
                ids(plain.retrieve(&q, &none())),
                ids(indexed.retrieve(&q, &none())),
                "query {q}"
            );
        }
    }

    #[test]
    fn empty_and_matches_everything() {
        let coll = loaded();
        assert_eq!(coll.retrieve(&Query::And(vec![]), &none()).len(), 4);
        assert!(coll.retrieve(&Query::Or(vec![]), &none()).is_empty());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_writers_and_readers() {
        use std::sync::Arc;
        use std::thread;

        let coll = Arc::new(ConcurrentIndexedCollection::<Person>::new());
        coll.add_index(Box::new(OrderedIndex::new(Person::age()))).unwrap();

        let writers: Vec<_> = (0..4u32)
            .map(|t| {
                let coll = Arc::clone(&coll);
                thread::spawn(move || {
                    for i in 0..50u32 {
                        let id = t * 1000 + i;
                        coll.insert(&[person(id, "w", i64::from(i), None)]).unwrap();
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..2)
            .map(|_| {
                let coll = Arc::clone(&coll);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let rs = coll.retrieve(&Person::age().less_than(10), &QueryOptions::none());
                        let n = rs.len();
                        assert_eq!(rs.count(), n);
                    }
                })
            })
            .collect();

        for h in writers.into_iter().chain(readers) {
            h.join().expect("thread should not panic");
        }
        assert_eq!(coll.len(), 200);
        assert_eq!(
            coll.retrieve(&Person::age().less_than(10), &none()).len(),
            40
        );
    }

    #[test]
    fn debug_format() {
        let coll = loaded();
        let debug = format!("{coll:?}");
        assert!(debug.contains("records: 4"));

        coll.add_index(Box::new(HashIndex::new(Person::city()))).unwrap();
        let shared: std::sync::Arc<dyn IndexedCollection<Person>> = std::sync::Arc::new(coll);
        let debug = format!("{shared:?}");
        assert!(debug.contains("len: 4"));
        assert!(debug.contains("hash(city)"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ordered_index_agrees_with_scan(
                ages in proptest::collection::vec(0i64..60, 0..40),
                lo in 0i64..60,
                hi in 0i64..60,
            ) {
                let records: Vec<Person> = ages
                    .iter()
                    .enumerate()
                    .map(|(i, age)| person(i as u32, "p", *age, None))
                    .collect();
                let plain = ConcurrentIndexedCollection::new();
                plain.insert(&records).unwrap();
                let indexed = ConcurrentIndexedCollection::new();
                indexed.add_index(Box::new(OrderedIndex::new(Person::age()))).unwrap();
                indexed.insert(&records).unwrap();

                let q = Person::age().between(lo, hi).or(Person::age().greater_than(hi));
                prop_assert_eq!(
                    ids(plain.retrieve(&q, &QueryOptions::none())),
                    ids(indexed.retrieve(&q, &QueryOptions::none()))
                );
            }
        }
    }
}
