//! Binding storage values to `SqliteArguments` and reading rows back.
//!
//! After the driver's encoders run, values are integers, reals or text. Other
//! variants only show up for custom kinds and are bound in their text form.

use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Arguments, Column as _, Row as _, TypeInfo, ValueRef};
use tablecraft::query::{BoundValue, ParamStyle};
use tablecraft::time::{format_date, format_time, format_timestamp};
use tablecraft::{Column, Row, StorageError, Value};

fn engine_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Engine(e.to_string())
}

/// Positional `?` placeholders.
pub struct SqliteParams;

impl ParamStyle for SqliteParams {
    fn param(&self, _index: usize, _column: &Column) -> String {
        "?".to_string()
    }
}

fn bind_value(args: &mut SqliteArguments<'_>, value: &Value) -> Result<(), StorageError> {
    match value {
        Value::Null => args.add(None::<String>),
        Value::Bool(b) => args.add(i64::from(*b)),
        Value::Int(n) => args.add(*n),
        Value::Float(n) => args.add(*n),
        Value::BigInt(n) => args.add(n.to_string()),
        Value::Decimal(s) | Value::Text(s) => args.add(s.clone()),
        Value::Uuid(u) => args.add(u.hyphenated().to_string()),
        Value::Timestamp(dt) => args.add(format_timestamp(dt)),
        Value::Date(d) => args.add(format_date(d)),
        Value::Time(t) => args.add(format_time(t)),
        Value::Json(j) => args.add(j.to_string()),
    }
    .map_err(engine_error)
}

pub(crate) fn bind_all<'q>(values: &[BoundValue]) -> Result<SqliteArguments<'q>, StorageError> {
    let mut args = SqliteArguments::default();
    for bound in values {
        bind_value(&mut args, &bound.value)?;
    }
    Ok(args)
}

/// Read one column by the storage class of the value actually stored.
fn extract_value(row: &SqliteRow, idx: usize) -> Result<Value, StorageError> {
    let raw = row.try_get_raw(idx).map_err(engine_error)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let class = raw.type_info().name().to_string();
    let value = match class.as_str() {
        "INTEGER" => Value::Int(row.try_get::<i64, _>(idx).map_err(engine_error)?),
        "REAL" => Value::Float(row.try_get::<f64, _>(idx).map_err(engine_error)?),
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(idx).map_err(engine_error)?;
            Value::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Value::Text(row.try_get::<String, _>(idx).map_err(engine_error)?),
    };
    Ok(value)
}

pub(crate) fn extract_row(row: &SqliteRow) -> Result<Row, StorageError> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.set(column.name(), extract_value(row, idx)?);
    }
    Ok(out)
}
