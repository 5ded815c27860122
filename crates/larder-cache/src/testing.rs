//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use larder_collection::{
    CollectionProvider, HashIndexFactory, Index, IndexBuildError, IndexFactory, IndexedCollection,
    OrderedIndexFactory, ProviderError, UniqueIndexFactory,
};
use larder_store::{BackingStore, InMemoryBackingStore, StoreResult};
use larder_types::{Attribute, QueryOptions, Record, Value};

use crate::descriptor::{Cached, CollectionDescriptor};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// ----- Employee -----

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: u64,
    pub name: String,
    pub dept: String,
    pub salary: i64,
    pub email: Option<String>,
}

impl Record for Employee {
    type Key = u64;

    fn key(&self) -> u64 {
        self.id
    }
}

impl Employee {
    pub fn name() -> Attribute<Employee> {
        Attribute::new("name", |e: &Employee| Value::from(e.name.as_str()))
    }

    pub fn dept() -> Attribute<Employee> {
        Attribute::new("dept", |e: &Employee| Value::from(e.dept.as_str()))
    }

    pub fn salary() -> Attribute<Employee> {
        Attribute::new("salary", |e: &Employee| Value::from(e.salary))
    }

    pub fn email() -> Attribute<Employee> {
        Attribute::new("email", |e: &Employee| Value::from(e.email.clone()))
    }
}

impl Cached for Employee {
    fn descriptor() -> CollectionDescriptor<Self> {
        CollectionDescriptor::builder()
            .index(Employee::dept(), HashIndexFactory)
            .index(Employee::salary(), OrderedIndexFactory)
            .index(Employee::email(), UniqueIndexFactory)
            .build()
    }
}

pub fn employee(id: u64, name: &str, dept: &str, salary: i64) -> Employee {
    Employee {
        id,
        name: name.to_string(),
        dept: dept.to_string(),
        salary,
        email: None,
    }
}

pub fn staff() -> Vec<Employee> {
    vec![
        employee(1, "ada", "eng", 120),
        employee(2, "grace", "eng", 150),
        employee(3, "linus", "ops", 90),
        employee(4, "barbara", "research", 200),
    ]
}

pub fn sorted_ids(records: impl IntoIterator<Item = Employee>) -> Vec<u64> {
    let mut ids: Vec<u64> = records.into_iter().map(|e| e.id).collect();
    ids.sort_unstable();
    ids
}

// ----- Contractor: inherits Employee's indexes -----

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contractor {
    pub staff: Employee,
    pub agency: String,
}

impl Record for Contractor {
    type Key = u64;

    fn key(&self) -> u64 {
        self.staff.id
    }
}

impl Contractor {
    pub fn dept() -> Attribute<Contractor> {
        Employee::dept().project(|c: &Contractor| &c.staff)
    }

    pub fn agency() -> Attribute<Contractor> {
        Attribute::new("agency", |c: &Contractor| Value::from(c.agency.as_str()))
    }
}

impl Cached for Contractor {
    fn descriptor() -> CollectionDescriptor<Self> {
        CollectionDescriptor::builder()
            .extends::<Employee>(|c: &Contractor| &c.staff)
            .inherit_indexes(true)
            .index(Contractor::dept(), OrderedIndexFactory)
            .index(Contractor::agency(), HashIndexFactory)
            .build()
    }
}

// ----- Badge: a second, independent type -----

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Badge {
    pub id: u32,
    pub holder: String,
}

impl Record for Badge {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

impl Badge {
    pub fn holder() -> Attribute<Badge> {
        Attribute::new("holder", |b: &Badge| Value::from(b.holder.as_str()))
    }
}

impl Cached for Badge {
    fn descriptor() -> CollectionDescriptor<Self> {
        CollectionDescriptor::builder()
            .index(Badge::holder(), HashIndexFactory)
            .build()
    }
}

pub fn badge(id: u32, holder: &str) -> Badge {
    Badge {
        id,
        holder: holder.to_string(),
    }
}

// ----- Misconfigured types -----

/// Declares the same index twice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ledger {
    pub id: u32,
}

impl Record for Ledger {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

impl Cached for Ledger {
    fn descriptor() -> CollectionDescriptor<Self> {
        let id = Attribute::new("id", |l: &Ledger| Value::from(l.id));
        CollectionDescriptor::builder()
            .index(id.clone(), HashIndexFactory)
            .index(id, HashIndexFactory)
            .build()
    }
}

/// Its collection provider always fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sealed {
    pub id: u32,
}

impl Record for Sealed {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

impl Cached for Sealed {
    fn descriptor() -> CollectionDescriptor<Self> {
        CollectionDescriptor::builder()
            .provider(FailingProvider)
            .build()
    }
}

/// One of its two index declarations cannot be built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub id: u32,
    pub code: String,
}

impl Record for Ticket {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

impl Ticket {
    pub fn code() -> Attribute<Ticket> {
        Attribute::new("code", |t: &Ticket| Value::from(t.code.as_str()))
    }
}

impl Cached for Ticket {
    fn descriptor() -> CollectionDescriptor<Self> {
        let code = Ticket::code();
        CollectionDescriptor::builder()
            .index(code.clone(), FailingIndexFactory)
            .index(code, HashIndexFactory)
            .build()
    }
}

pub fn ticket(id: u32, code: &str) -> Ticket {
    Ticket {
        id,
        code: code.to_string(),
    }
}

// ----- Failing collaborators -----

pub struct FailingIndexFactory;

impl<T: Record> IndexFactory<T> for FailingIndexFactory {
    fn kind(&self) -> &str {
        "broken"
    }

    fn build(&self, attribute: &Attribute<T>) -> Result<Box<dyn Index<T>>, IndexBuildError> {
        Err(IndexBuildError::Failed {
            attribute: attribute.name().to_string(),
            kind: "broken".to_string(),
            reason: "factory refused".to_string(),
        })
    }
}

pub struct FailingProvider;

impl<T: Record> CollectionProvider<T> for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn build(&self) -> Result<Arc<dyn IndexedCollection<T>>, ProviderError> {
        Err(ProviderError {
            provider: "failing".to_string(),
            reason: "no collections today".to_string(),
        })
    }
}

/// An in-memory store whose full read takes `delay`.
pub struct SlowStore<T: Record> {
    pub inner: InMemoryBackingStore<T>,
    delay: Duration,
}

impl<T: Record> SlowStore<T> {
    pub fn new(records: Vec<T>, delay: Duration) -> Self {
        Self {
            inner: InMemoryBackingStore::with_records(records),
            delay,
        }
    }
}

impl<T: Record> BackingStore<T> for SlowStore<T> {
    fn create(&self, records: &[T], options: &QueryOptions) -> StoreResult<()> {
        self.inner.create(records, options)
    }

    fn read_all(&self, options: &QueryOptions) -> StoreResult<Vec<T>> {
        thread::sleep(self.delay);
        self.inner.read_all(options)
    }

    fn update(&self, records: &[T], options: &QueryOptions) -> StoreResult<()> {
        self.inner.update(records, options)
    }

    fn delete(&self, records: &[T], options: &QueryOptions) -> StoreResult<()> {
        self.inner.delete(records, options)
    }
}
