//! Typed filter language for document queries.
//!
//! Field names are dotted paths into the document (`"config.channel_id"`,
//! `"end_life.time"`). Backends translate a [`Filter`] into their own query
//! dialect; [`Filter::matches`] is the reference semantics.

use serde_json::Value;
use std::cmp::Ordering;

/// A predicate over JSON documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value.
    Eq(String, Value),
    /// Field equals one of the values.
    In(String, Vec<Value>),
    /// Numeric field strictly greater than value.
    Gt(String, f64),
    /// Numeric field strictly less than value.
    Lt(String, f64),
    /// Numeric field greater than or equal to another numeric field.
    FieldGte(String, String),
    /// String field contains the needle, ignoring case.
    ContainsInsensitive(String, String),
    /// Every clause matches. Empty matches everything.
    And(Vec<Filter>),
    /// Some clause matches. Empty matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    /// Match every document.
    pub fn all() -> Self {
        Self::And(Vec::new())
    }

    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    /// `field IN values`.
    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// `field > value`.
    pub fn gt(field: impl Into<String>, value: f64) -> Self {
        Self::Gt(field.into(), value)
    }

    /// `field < value`.
    pub fn lt(field: impl Into<String>, value: f64) -> Self {
        Self::Lt(field.into(), value)
    }

    /// `field >= other`.
    pub fn field_gte(field: impl Into<String>, other: impl Into<String>) -> Self {
        Self::FieldGte(field.into(), other.into())
    }

    /// Case-insensitive substring match.
    pub fn contains_insensitive(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::ContainsInsensitive(field.into(), needle.into())
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::And(mut a), Self::And(b)) => {
                a.extend(b);
                Self::And(a)
            }
            (Self::And(mut a), other) => {
                a.push(other);
                Self::And(a)
            }
            (this, Self::And(mut b)) => {
                b.insert(0, this);
                Self::And(b)
            }
            (this, other) => Self::And(vec![this, other]),
        }
    }

    /// Disjunction.
    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut a) => {
                a.push(other);
                Self::Or(a)
            }
            this => Self::Or(vec![this, other]),
        }
    }

    /// The value a top-level equality clause pins `field` to, if any.
    pub fn pinned(&self, field: &str) -> Option<&Value> {
        match self {
            Self::Eq(f, v) if f == field => Some(v),
            Self::And(clauses) => clauses.iter().find_map(|c| c.pinned(field)),
            _ => None,
        }
    }

    /// Whether `doc` satisfies the filter.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::Eq(field, value) => lookup(doc, field).is_some_and(|v| values_equal(v, value)),
            Self::In(field, values) => lookup(doc, field)
                .is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate))),
            Self::Gt(field, bound) => number(doc, field).is_some_and(|n| n > *bound),
            Self::Lt(field, bound) => number(doc, field).is_some_and(|n| n < *bound),
            Self::FieldGte(field, other) => match (number(doc, field), number(doc, other)) {
                (Some(a), Some(b)) => a >= b,
                _ => false,
            },
            Self::ContainsInsensitive(field, needle) => lookup(doc, field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
        }
    }
}

/// Resolve a dotted path inside a document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

/// Set a dotted path inside a document, creating intermediate objects.
///
/// Returns `false` when an intermediate value exists and is not an object.
pub fn assign(doc: &mut Value, path: &str, value: Value) -> bool {
    let mut current = doc;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(object) = current.as_object_mut() else {
            return false;
        };
        if segments.peek().is_none() {
            object.insert(segment.to_string(), value);
            return true;
        }
        current = object
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    false
}

/// Order two optional field values: numbers numerically, strings
/// lexically, missing values last.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => x.cmp(y),
                _ => a.to_string().cmp(&b.to_string()),
            },
        },
    }
}

fn number(doc: &Value, path: &str) -> Option<f64> {
    lookup(doc, path).and_then(Value::as_f64)
}

// `1` and `1.0` compare equal, unlike `Value`'s `PartialEq`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
