use std::any::TypeId;
use std::fmt;
use std::hash::Hash;

/// A value that can be held by the cache and by a backing store.
///
/// Identity is the key: two records with the same key are two versions of the
/// same logical record. Removal and replacement in every Larder component are
/// keyed, so an updated record replaces whatever is stored under its key.
pub trait Record: Clone + Send + Sync + 'static {
    /// Stable identity of a record.
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// The key of this record.
    fn key(&self) -> Self::Key;
}

/// Runtime identity of a record type.
///
/// Equality and hashing use only the `TypeId`; the name is carried for
/// logging and error messages.
#[derive(Clone, Copy)]
pub struct RecordType {
    id: TypeId,
    name: &'static str,
}

impl RecordType {
    /// The record type of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordType({})", self.name)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
