use std::fmt;

use crate::attribute::Attribute;
use crate::value::Value;

/// A structured query over record attributes.
///
/// This is the closed set of predicate shapes the in-memory collection can
/// evaluate. [`Query::matches`] is the reference semantics: an index that
/// answers a query must return exactly the records a full scan with
/// `matches` would return.
///
/// Range operators (`LessThan`, `GreaterThan`, `Between`) never match
/// [`Value::Null`].
pub enum Query<T> {
    /// Every record.
    All,
    Equal(Attribute<T>, Value),
    In(Attribute<T>, Vec<Value>),
    LessThan {
        attribute: Attribute<T>,
        bound: Value,
        inclusive: bool,
    },
    GreaterThan {
        attribute: Attribute<T>,
        bound: Value,
        inclusive: bool,
    },
    /// Inclusive on both ends.
    Between {
        attribute: Attribute<T>,
        lower: Value,
        upper: Value,
    },
    /// Text values starting with the prefix.
    StartsWith(Attribute<T>, String),
    /// Values other than [`Value::Null`].
    Present(Attribute<T>),
    And(Vec<Query<T>>),
    Or(Vec<Query<T>>),
    Not(Box<Query<T>>),
}

impl<T> Query<T> {
    /// Evaluate this query against a single record.
    pub fn matches(&self, record: &T) -> bool {
        match self {
            Query::All => true,
            Query::Equal(attr, v) => attr.value_of(record) == *v,
            Query::In(attr, vs) => {
                let v = attr.value_of(record);
                vs.contains(&v)
            }
            Query::LessThan {
                attribute,
                bound,
                inclusive,
            } => {
                let v = attribute.value_of(record);
                !v.is_null() && (v < *bound || (*inclusive && v == *bound))
            }
            Query::GreaterThan {
                attribute,
                bound,
                inclusive,
            } => {
                let v = attribute.value_of(record);
                !v.is_null() && (v > *bound || (*inclusive && v == *bound))
            }
            Query::Between {
                attribute,
                lower,
                upper,
            } => {
                let v = attribute.value_of(record);
                !v.is_null() && *lower <= v && v <= *upper
            }
            Query::StartsWith(attr, prefix) => attr
                .value_of(record)
                .as_text()
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Query::Present(attr) => !attr.value_of(record).is_null(),
            Query::And(qs) => qs.iter().all(|q| q.matches(record)),
            Query::Or(qs) => qs.iter().any(|q| q.matches(record)),
            Query::Not(q) => !q.matches(record),
        }
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: Query<T>) -> Query<T> {
        match self {
            Query::And(mut qs) => {
                qs.push(other);
                Query::And(qs)
            }
            q => Query::And(vec![q, other]),
        }
    }

    /// Disjunction of `self` and `other`, flattening nested `Or`s.
    pub fn or(self, other: Query<T>) -> Query<T> {
        match self {
            Query::Or(mut qs) => {
                qs.push(other);
                Query::Or(qs)
            }
            q => Query::Or(vec![q, other]),
        }
    }

    pub fn negate(self) -> Query<T> {
        Query::Not(Box::new(self))
    }

    /// The attribute a leaf query constrains, or `None` for `All` and
    /// logical combinators.
    pub fn attribute(&self) -> Option<&Attribute<T>> {
        match self {
            Query::Equal(a, _)
            | Query::In(a, _)
            | Query::StartsWith(a, _)
            | Query::Present(a)
            | Query::LessThan { attribute: a, .. }
            | Query::GreaterThan { attribute: a, .. }
            | Query::Between { attribute: a, .. } => Some(a),
            Query::All | Query::And(_) | Query::Or(_) | Query::Not(_) => None,
        }
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        match self {
            Query::All => Query::All,
            Query::Equal(a, v) => Query::Equal(a.clone(), v.clone()),
            Query::In(a, vs) => Query::In(a.clone(), vs.clone()),
            Query::LessThan {
                attribute,
                bound,
                inclusive,
            } => Query::LessThan {
                attribute: attribute.clone(),
                bound: bound.clone(),
                inclusive: *inclusive,
            },
            Query::GreaterThan {
                attribute,
                bound,
                inclusive,
            } => Query::GreaterThan {
                attribute: attribute.clone(),
                bound: bound.clone(),
                inclusive: *inclusive,
            },
            Query::Between {
                attribute,
                lower,
                upper,
            } => Query::Between {
                attribute: attribute.clone(),
                lower: lower.clone(),
                upper: upper.clone(),
            },
            Query::StartsWith(a, p) => Query::StartsWith(a.clone(), p.clone()),
            Query::Present(a) => Query::Present(a.clone()),
            Query::And(qs) => Query::And(qs.clone()),
            Query::Or(qs) => Query::Or(qs.clone()),
            Query::Not(q) => Query::Not(q.clone()),
        }
    }
}

impl<T> fmt::Display for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T>(f: &mut fmt::Formatter<'_>, qs: &[Query<T>], op: &str) -> fmt::Result {
            f.write_str("(")?;
            for (i, q) in qs.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{q}")?;
            }
            f.write_str(")")
        }

        match self {
            Query::All => f.write_str("*"),
            Query::Equal(a, v) => write!(f, "{} = {v}", a.name()),
            Query::In(a, vs) => {
                write!(f, "{} IN [", a.name())?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Query::LessThan {
                attribute,
                bound,
                inclusive,
            } => {
                let op = if *inclusive { "<=" } else { "<" };
                write!(f, "{} {op} {bound}", attribute.name())
            }
            Query::GreaterThan {
                attribute,
                bound,
                inclusive,
            } => {
                let op = if *inclusive { ">=" } else { ">" };
                write!(f, "{} {op} {bound}", attribute.name())
            }
            Query::Between {
                attribute,
                lower,
                upper,
            } => write!(f, "{} BETWEEN {lower} AND {upper}", attribute.name()),
            Query::StartsWith(a, p) => write!(f, "{} STARTS WITH {p:?}", a.name()),
            Query::Present(a) => write!(f, "{} IS NOT NULL", a.name()),
            Query::And(qs) => join(f, qs, "AND"),
            Query::Or(qs) => join(f, qs, "OR"),
            Query::Not(q) => write!(f, "NOT {q}"),
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query({self})")
    }
}

/// Query representation accepted by CRUD operations.
///
/// The in-memory side evaluates only [`Predicate::Structured`]. A
/// [`Predicate::Native`] carries backend-native query text (for example a SQL
/// fragment) meant for a backing store; the cache rejects it.
pub enum Predicate<T> {
    Structured(Query<T>),
    Native(String),
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        match self {
            Predicate::Structured(q) => Predicate::Structured(q.clone()),
            Predicate::Native(s) => Predicate::Native(s.clone()),
        }
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Structured(q) => write!(f, "Structured({q})"),
            Predicate::Native(s) => f.debug_tuple("Native").field(s).finish(),
        }
    }
}

impl<T> Predicate<T> {
    /// Short name of the representation, for error messages.
    pub fn representation(&self) -> &'static str {
        match self {
            Predicate::Structured(_) => "structured query",
            Predicate::Native(_) => "native query text",
        }
    }
}

impl<T> From<Query<T>> for Predicate<T> {
    fn from(q: Query<T>) -> Self {
        Predicate::Structured(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        id: i64,
        name: Option<String>,
    }

    fn id() -> Attribute<Item> {
        Attribute::new("id", |i: &Item| Value::from(i.id))
    }

    fn name() -> Attribute<Item> {
        Attribute::new("name", |i: &Item| Value::from(i.name.clone()))
    }

    fn item(id: i64, name: Option<&str>) -> Item {
        Item {
            id,
            name: name.map(str::to_string),
        }
    }

    // -----------------------------------------------------------------------
    // Leaf operators
    // -----------------------------------------------------------------------

    #[test]
    fn equal_and_in() {
        let r = item(3, Some("c"));
        assert!(id().equal(3).matches(&r));
        assert!(!id().equal(4).matches(&r));
        assert!(id().one_of([1, 3, 5]).matches(&r));
        assert!(!id().one_of([2, 4]).matches(&r));
    }

    #[test]
    fn range_bounds() {
        let r = item(10, None);
        assert!(id().less_than(11).matches(&r));
        assert!(!id().less_than(10).matches(&r));
        assert!(id().at_most(10).matches(&r));
        assert!(id().greater_than(9).matches(&r));
        assert!(!id().greater_than(10).matches(&r));
        assert!(id().at_least(10).matches(&r));
        assert!(id().between(10, 10).matches(&r));
        assert!(!id().between(11, 20).matches(&r));
    }

    #[test]
    fn ranges_never_match_null() {
        let r = item(1, None);
        assert!(!name().less_than("zzz").matches(&r));
        assert!(!name().at_most("a").matches(&r));
        assert!(!name().between(Value::Null, "z").matches(&r));
    }

    #[test]
    fn starts_with_only_matches_text() {
        assert!(name().starts_with("al").matches(&item(1, Some("alice"))));
        assert!(!name().starts_with("al").matches(&item(1, Some("bob"))));
        assert!(!name().starts_with("").matches(&item(1, None)));
    }

    #[test]
    fn present() {
        assert!(name().present().matches(&item(1, Some(""))));
        assert!(!name().present().matches(&item(1, None)));
    }

    // -----------------------------------------------------------------------
    // Combinators
    // -----------------------------------------------------------------------

    #[test]
    fn and_or_not() {
        let r = item(5, Some("eve"));
        let q = id().greater_than(1).and(name().equal("eve"));
        assert!(q.matches(&r));
        let q = id().equal(1).or(name().equal("eve"));
        assert!(q.matches(&r));
        assert!(!id().equal(5).negate().matches(&r));
        assert!(Query::All.matches(&r));
    }

    #[test]
    fn and_flattens() {
        let q = id().equal(1).and(id().equal(2)).and(id().equal(3));
        match q {
            Query::And(qs) => assert_eq!(qs.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn leaf_attribute() {
        assert_eq!(id().equal(1).attribute().map(|a| a.name()), Some("id"));
        assert!(Query::<Item>::All.attribute().is_none());
        assert!(id().equal(1).negate().attribute().is_none());
    }

    #[test]
    fn display() {
        let q = id().at_least(2).and(name().starts_with("a"));
        assert_eq!(q.to_string(), "(id >= 2 AND name STARTS WITH \"a\")");
        assert_eq!(id().one_of([1, 2]).to_string(), "id IN [1, 2]");
    }

    #[test]
    fn predicate_representation() {
        let p: Predicate<Item> = id().equal(1).into();
        assert_eq!(p.representation(), "structured query");
        let n: Predicate<Item> = Predicate::Native("id = 1".into());
        assert_eq!(n.representation(), "native query text");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn negation_is_complement(v in -50i64..50, bound in -50i64..50) {
                let r = item(v, None);
                let q = id().less_than(bound);
                prop_assert_eq!(q.clone().negate().matches(&r), !q.matches(&r));
            }

            #[test]
            fn between_agrees_with_at_least_and_at_most(v in -50i64..50, lo in -50i64..50, hi in -50i64..50) {
                let r = item(v, None);
                let combined = id().at_least(lo).and(id().at_most(hi));
                prop_assert_eq!(id().between(lo, hi).matches(&r), combined.matches(&r));
            }
        }
    }
}
