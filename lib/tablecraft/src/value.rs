//! Canonical in-memory values and their storage representations.
//!
//! The same enum carries both sides of a converter: a column's canonical value
//! (what callers read and write) and the representation an engine stores.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

/// A value bound to, or read from, a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    BigInt(i128),
    Float(f64),
    /// Decimal digits as text, e.g. `"12.50"`.
    Decimal(String),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(serde_json::Value),
}

impl Value {
    /// Short name of the variant, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Json(_) => "json",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render as a SQL literal for use in `default` clauses.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::BigInt(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Decimal(s) => s.clone(),
            Value::Text(s) => quote_literal(s),
            Value::Uuid(u) => quote_literal(&u.hyphenated().to_string()),
            Value::Timestamp(dt) => quote_literal(&crate::time::format_timestamp(dt)),
            Value::Date(d) => quote_literal(&crate::time::format_date(d)),
            Value::Time(t) => quote_literal(&crate::time::format_time(t)),
            Value::Json(j) => quote_literal(&j.to_string()),
        }
    }
}

/// Quote a string as a SQL literal, doubling embedded quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::BigInt(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::Timestamp(dt)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Extract a Rust value from a canonical [`Value`].
///
/// Implemented for the field types `#[derive(TableRow)]` supports.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue>;
}

fn mismatch(expected: &'static str, found: &Value) -> crate::ConversionIssue {
    crate::ConversionIssue::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Int(n) => Ok(n),
            Value::BigInt(n) => i64::try_from(n)
                .map_err(|_| crate::ConversionIssue::OutOfRange(n.to_string())),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        let n = i64::from_value(value)?;
        i32::try_from(n).map_err(|_| crate::ConversionIssue::OutOfRange(n.to_string()))
    }
}

impl FromValue for i128 {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::BigInt(n) => Ok(n),
            Value::Int(n) => Ok(n.into()),
            other => Err(mismatch("bigint", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Float(n) => Ok(n),
            Value::Int(n) => Ok(n as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        f64::from_value(value).map(|n| n as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Uuid(u) => Ok(u),
            other => Err(mismatch("uuid", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Timestamp(dt) => Ok(dt),
            other => Err(mismatch("timestamp", &other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Date(d) => Ok(d),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Time(t) => Ok(t),
            other => Err(mismatch("time", &other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Json(j) => Ok(j),
            other => Err(mismatch("json", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, crate::ConversionIssue> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// An ordered set of column values for one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, replacing any previous value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Remove a column and return its value.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(name, _)| name == column)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}
