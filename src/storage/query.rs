//! Backend-neutral query vocabulary
//!
//! Filters are flat conjunctions of equality predicates, updates are lists of
//! field assignments. Both are generic over the record's field descriptor and
//! get erased to plain field names before they reach an adapter.

use mongodb::bson::Bson;
use serde_json::{Number, Value};

use super::record::{Document, RecordField};

/// Scalar value that can appear in a predicate or an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::Number(Number::from(*i)),
            // NaN / Infinity 没有 JSON 表示，按 null 处理
            FieldValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            FieldValue::Str(s) => Value::String(s.clone()),
        }
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            FieldValue::Null => Bson::Null,
            FieldValue::Bool(b) => Bson::Boolean(*b),
            FieldValue::Int(i) => Bson::Int64(*i),
            FieldValue::Float(f) => Bson::Double(*f),
            FieldValue::Str(s) => Bson::String(s.clone()),
        }
    }

    /// Equality against a decoded JSON value.
    ///
    /// Numbers compare by value regardless of integer/float representation,
    /// so `Int(1)` equals a stored `1.0`. Anything else compares strictly.
    pub fn matches_json(&self, stored: &Value) -> bool {
        match (self, stored) {
            (FieldValue::Null, Value::Null) => true,
            (FieldValue::Bool(a), Value::Bool(b)) => a == b,
            (FieldValue::Str(a), Value::String(b)) => a == b,
            (FieldValue::Int(a), Value::Number(n)) => match n.as_i64() {
                Some(b) => *a == b,
                None => n.as_f64().is_some_and(|b| (*a as f64) == b),
            },
            (FieldValue::Float(a), Value::Number(n)) => n.as_f64().is_some_and(|b| *a == b),
            _ => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::Str(value.clone())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<F> {
    Equals(F, FieldValue),
}

impl<F: RecordField> Predicate<F> {
    pub fn field(&self) -> F {
        match self {
            Predicate::Equals(field, _) => *field,
        }
    }

    pub fn value(&self) -> &FieldValue {
        match self {
            Predicate::Equals(_, value) => value,
        }
    }
}

/// Conjunction of predicates. An empty filter matches everything.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter<F = &'static str> {
    predicates: Vec<Predicate<F>>,
}

impl<F> Default for Filter<F> {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }
}

impl<F: RecordField> Filter<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `field == value`.
    pub fn eq(mut self, field: F, value: impl Into<FieldValue>) -> Self {
        self.predicates.push(Predicate::Equals(field, value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Predicate<F>] {
        &self.predicates
    }

    /// Drop the field type, keeping the stored names.
    pub fn erase(&self) -> Filter {
        Filter {
            predicates: self
                .predicates
                .iter()
                .map(|p| Predicate::Equals(p.field().name(), p.value().clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assignment<F> {
    Set(F, FieldValue),
}

impl<F: RecordField> Assignment<F> {
    pub fn field(&self) -> F {
        match self {
            Assignment::Set(field, _) => *field,
        }
    }

    pub fn value(&self) -> &FieldValue {
        match self {
            Assignment::Set(_, value) => value,
        }
    }
}

/// Partial update: every assignment overwrites one existing field.
#[derive(Debug, Clone, PartialEq)]
pub struct Update<F = &'static str> {
    assignments: Vec<Assignment<F>>,
}

impl<F> Default for Update<F> {
    fn default() -> Self {
        Self {
            assignments: Vec::new(),
        }
    }
}

impl<F: RecordField> Update<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: F, value: impl Into<FieldValue>) -> Self {
        self.assignments.push(Assignment::Set(field, value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignments(&self) -> &[Assignment<F>] {
        &self.assignments
    }

    pub fn erase(&self) -> Update {
        Update {
            assignments: self
                .assignments
                .iter()
                .map(|a| Assignment::Set(a.field().name(), a.value().clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    Asc,
    Desc,
}

impl IndexOrder {
    pub fn as_i32(self) -> i32 {
        match self {
            IndexOrder::Asc => 1,
            IndexOrder::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec<F = &'static str> {
    pub keys: Vec<(F, IndexOrder)>,
    pub name: Option<String>,
    pub unique: bool,
}

impl<F: RecordField> IndexSpec<F> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            name: None,
            unique: false,
        }
    }

    pub fn key(mut self, field: F, order: IndexOrder) -> Self {
        self.keys.push((field, order));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn erase(&self) -> IndexSpec {
        IndexSpec {
            keys: self.keys.iter().map(|(f, o)| (f.name(), *o)).collect(),
            name: self.name.clone(),
            unique: self.unique,
        }
    }
}

impl<F: RecordField> Default for IndexSpec<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pagination and scan options.
///
/// `key` / `prefix_scan` only concern the embedded backend, `min` / `max`
/// only the networked one. `limit == 0` means no limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub skip: u64,
    pub limit: u64,
    pub key: String,
    pub prefix_scan: bool,
    pub min: Option<Document>,
    pub max: Option<Document>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct lookup of a single key.
    pub fn by_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Ordered scan of every key starting with `prefix`.
    pub fn by_prefix(prefix: impl Into<String>) -> Self {
        Self {
            key: prefix.into(),
            prefix_scan: true,
            ..Self::default()
        }
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn min(mut self, min: Document) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: Document) -> Self {
        self.max = Some(max);
        self
    }

    /// `limit` as an upper bound usable with iterator adaptors.
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            usize::MAX
        } else {
            usize::try_from(self.limit).unwrap_or(usize::MAX)
        }
    }
}
