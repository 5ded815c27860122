use std::fmt;
use std::sync::Arc;

use crate::query::Query;
use crate::value::Value;

type Extractor<T> = dyn Fn(&T) -> Value + Send + Sync;

/// A named extractor from a record to a [`Value`].
///
/// Attributes are what indexes are built on and what queries refer to. They
/// are cheap to clone; clones share the extractor. Two attributes are
/// considered the same by indexes and query planning when their names match,
/// so attributes of one record type that share a name must extract the same
/// value. Clone an attribute rather than rebuilding it under the same name
/// with a different extractor.
pub struct Attribute<T> {
    name: Arc<str>,
    extract: Arc<Extractor<T>>,
}

impl<T: 'static> Attribute<T> {
    /// Create an attribute from a name and an extractor function.
    ///
    /// `name` identifies the attribute to indexes: a query on any attribute
    /// named `name` may be answered by an index built from this one.
    pub fn new<F>(name: &str, extract: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            extract: Arc::new(extract),
        }
    }

    /// Lift this attribute onto a type that embeds `T`.
    ///
    /// The projected attribute keeps the same name, so a parent's index
    /// declaration can be inherited by a child type.
    pub fn project<C, P>(&self, projection: P) -> Attribute<C>
    where
        C: 'static,
        P: Fn(&C) -> &T + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.extract);
        Attribute {
            name: Arc::clone(&self.name),
            extract: Arc::new(move |child: &C| inner(projection(child))),
        }
    }

    /// Whether `other` is a clone of this attribute.
    pub fn shares_extractor(&self, other: &Attribute<T>) -> bool {
        Arc::ptr_eq(&self.extract, &other.extract)
    }

    // ---------------------------------------------------------------
    // Query builders
    // ---------------------------------------------------------------

    pub fn equal(&self, value: impl Into<Value>) -> Query<T> {
        Query::Equal(self.clone(), value.into())
    }

    pub fn one_of<I, V>(&self, values: I) -> Query<T>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Query::In(self.clone(), values.into_iter().map(Into::into).collect())
    }

    pub fn less_than(&self, bound: impl Into<Value>) -> Query<T> {
        Query::LessThan {
            attribute: self.clone(),
            bound: bound.into(),
            inclusive: false,
        }
    }

    pub fn at_most(&self, bound: impl Into<Value>) -> Query<T> {
        Query::LessThan {
            attribute: self.clone(),
            bound: bound.into(),
            inclusive: true,
        }
    }

    pub fn greater_than(&self, bound: impl Into<Value>) -> Query<T> {
        Query::GreaterThan {
            attribute: self.clone(),
            bound: bound.into(),
            inclusive: false,
        }
    }

    pub fn at_least(&self, bound: impl Into<Value>) -> Query<T> {
        Query::GreaterThan {
            attribute: self.clone(),
            bound: bound.into(),
            inclusive: true,
        }
    }

    /// Inclusive on both ends.
    pub fn between(&self, lower: impl Into<Value>, upper: impl Into<Value>) -> Query<T> {
        Query::Between {
            attribute: self.clone(),
            lower: lower.into(),
            upper: upper.into(),
        }
    }

    pub fn starts_with(&self, prefix: &str) -> Query<T> {
        Query::StartsWith(self.clone(), prefix.to_string())
    }

    /// Matches records whose value is not [`Value::Null`].
    pub fn present(&self) -> Query<T> {
        Query::Present(self.clone())
    }
}

impl<T> Attribute<T> {
    /// The attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extract this attribute's value from a record.
    pub fn value_of(&self, record: &T) -> Value {
        (self.extract)(record)
    }
}

impl<T> Clone for Attribute<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            extract: Arc::clone(&self.extract),
        }
    }
}

impl<T> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Attribute").field(&&*self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base {
        id: i64,
    }

    struct Derived {
        base: Base,
        label: String,
    }

    #[test]
    fn extracts_value() {
        let id = Attribute::new("id", |b: &Base| Value::from(b.id));
        assert_eq!(id.name(), "id");
        assert_eq!(id.value_of(&Base { id: 9 }), Value::Int(9));
    }

    #[test]
    fn only_clones_share_an_extractor() {
        let id = Attribute::new("id", |b: &Base| Value::from(b.id));
        let rebuilt = Attribute::new("id", |b: &Base| Value::from(-b.id));
        assert!(id.shares_extractor(&id.clone()));
        assert!(!id.shares_extractor(&rebuilt));
    }

    #[test]
    fn projection_keeps_name_and_reads_through() {
        let id = Attribute::new("id", |b: &Base| Value::from(b.id));
        let projected: Attribute<Derived> = id.project(|d: &Derived| &d.base);
        let d = Derived {
            base: Base { id: 42 },
            label: "x".into(),
        };
        assert_eq!(projected.name(), "id");
        assert_eq!(projected.value_of(&d), Value::Int(42));
        assert_eq!(d.label, "x");
    }

    #[test]
    fn clones_share_extractor() {
        let id = Attribute::new("id", |b: &Base| Value::from(b.id * 2));
        let copy = id.clone();
        assert_eq!(copy.value_of(&Base { id: 4 }), Value::Int(8));
        assert_eq!(format!("{copy:?}"), "Attribute(\"id\")");
    }
}
