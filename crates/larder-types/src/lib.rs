//! Foundation types for Larder.
//!
//! Larder is a write-through, in-memory indexed cache placed in front of an
//! arbitrary backing store. This crate provides the vocabulary shared by the
//! store, collection, and cache crates. Every other Larder crate depends on
//! `larder-types`.
//!
//! # Key Types
//!
//! - [`Record`] -- A cacheable value with a stable key
//! - [`RecordType`] -- Runtime identity of a record type
//! - [`Value`] -- Totally ordered, hashable attribute value
//! - [`Attribute`] -- Named extractor from a record to a [`Value`]
//! - [`Query`] -- Structured query over attributes, evaluable in memory
//! - [`Predicate`] -- Query representation accepted at the CRUD boundary
//! - [`QueryOptions`] -- Opaque backend options passed through unmodified

pub mod attribute;
pub mod options;
pub mod query;
pub mod record;
pub mod value;

pub use attribute::Attribute;
pub use options::QueryOptions;
pub use query::{Predicate, Query};
pub use record::{Record, RecordType};
pub use value::Value;
