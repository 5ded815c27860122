//! Backing-store interface for Larder.
//!
//! The cache delegates durability to a [`BackingStore`]: an opaque, keyed
//! CRUD capability called synchronously. The cache never interprets store
//! errors beyond propagating them.
//!
//! # Storage Backends
//!
//! - [`InMemoryBackingStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileBackingStore`] -- JSON file, rewritten atomically on every write
//!
//! # Design Rules
//!
//! 1. Records are identified by their key; create rejects existing keys,
//!    update rejects missing keys, delete of a missing key is a no-op.
//! 2. A batch is validated before any record in it is applied.
//! 3. Options are accepted on every call and may be ignored by a backend.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod stats;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileBackingStore;
pub use memory::InMemoryBackingStore;
pub use stats::StoreStats;
pub use traits::BackingStore;
