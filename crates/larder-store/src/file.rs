use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use larder_types::{QueryOptions, Record};

use crate::error::{StoreError, StoreResult};
use crate::stats::{Counters, StoreStats};
use crate::traits::BackingStore;

/// Backing store holding every record of one type in a JSON file.
///
/// The file is a JSON array of records. Each write loads the file, applies
/// the batch, and replaces the file atomically: the new contents go to a
/// temporary file in the same directory which is then renamed over the old
/// one. Writers are serialized by an internal mutex. A missing file reads as
/// an empty store.
pub struct FileBackingStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    counters: Counters,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FileBackingStore<T>
where
    T: Record + Serialize + DeserializeOwned,
{
    /// Open (or lazily create) a store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            counters: Counters::default(),
            _marker: PhantomData,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Call counters since open.
    pub fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }

    fn load(&self) -> StoreResult<Vec<T>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let records: Vec<T> = serde_json::from_reader(BufReader::new(file))?;
        Ok(records)
    }

    fn load_map(&self) -> StoreResult<HashMap<T::Key, T>> {
        Ok(self.load()?.into_iter().map(|r| (r.key(), r)).collect())
    }

    fn persist(&self, map: HashMap<T::Key, T>) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let records: Vec<T> = map.into_values().collect();

        let tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, &records)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        debug!(path = ?self.path, records = records.len(), "file store rewritten");
        Ok(())
    }
}

impl<T> BackingStore<T> for FileBackingStore<T>
where
    T: Record + Serialize + DeserializeOwned,
{
    fn create(&self, records: &[T], _options: &QueryOptions) -> StoreResult<()> {
        self.counters.create();
        let _guard = self.write_lock.lock();
        let mut map = self.load_map()?;
        if let Some(existing) = records.iter().find(|r| map.contains_key(&r.key())) {
            return Err(StoreError::Conflict(format!("{:?}", existing.key())));
        }
        for r in records {
            map.insert(r.key(), r.clone());
        }
        self.persist(map)
    }

    fn read_all(&self, _options: &QueryOptions) -> StoreResult<Vec<T>> {
        self.counters.read();
        self.load()
    }

    fn update(&self, records: &[T], _options: &QueryOptions) -> StoreResult<()> {
        self.counters.update();
        let _guard = self.write_lock.lock();
        let mut map = self.load_map()?;
        if let Some(missing) = records.iter().find(|r| !map.contains_key(&r.key())) {
            return Err(StoreError::NotFound(format!("{:?}", missing.key())));
        }
        for r in records {
            map.insert(r.key(), r.clone());
        }
        self.persist(map)
    }

    fn delete(&self, records: &[T], _options: &QueryOptions) -> StoreResult<()> {
        self.counters.delete();
        let _guard = self.write_lock.lock();
        let mut map = self.load_map()?;
        let before = map.len();
        for r in records {
            map.remove(&r.key());
        }
        if map.len() == before {
            return Ok(());
        }
        self.persist(map)
    }
}

impl<T> std::fmt::Debug for FileBackingStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackingStore")
            .field("path", &self.path)
            .finish()
    }
}
