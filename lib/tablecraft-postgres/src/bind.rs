//! Binding storage values to `PgArguments` and reading them back from rows.
//!
//! Values arriving here are already in storage form. The column kind travels
//! with each value so nulls get a typed bind and integers the right width.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, Column as _, Row as _, TypeInfo};
use tablecraft::query::{BoundValue, ParamStyle};
use tablecraft::{Column, ColumnKind, Row, StorageError, Value, quote_ident};
use uuid::Uuid;

fn engine_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Engine(e.to_string())
}

/// `$n` placeholders, cast where the bound Rust type differs from the column's.
pub struct PgParams;

impl ParamStyle for PgParams {
    fn param(&self, index: usize, column: &Column) -> String {
        match column.kind() {
            ColumnKind::BigInt | ColumnKind::Decimal => format!("${index}::numeric"),
            ColumnKind::Json => format!("${index}::json"),
            _ => format!("${index}"),
        }
    }

    /// Numerics are read back as text so values beyond `rust_decimal` survive.
    fn select_expr(&self, column: &Column) -> String {
        let name = quote_ident(column.name());
        match column.kind() {
            ColumnKind::BigInt | ColumnKind::Decimal => format!("{name}::text as {name}"),
            _ => name,
        }
    }
}

fn bind_null(args: &mut PgArguments, kind: &ColumnKind) -> Result<(), StorageError> {
    match kind {
        ColumnKind::Int32 => args.add(None::<i32>),
        ColumnKind::Int64 => args.add(None::<i64>),
        ColumnKind::Float32 => args.add(None::<f32>),
        ColumnKind::Float64 => args.add(None::<f64>),
        ColumnKind::Boolean => args.add(None::<bool>),
        ColumnKind::Uuid => args.add(None::<Uuid>),
        ColumnKind::Datetime => args.add(None::<DateTime<Utc>>),
        ColumnKind::DatePart => args.add(None::<NaiveDate>),
        ColumnKind::TimePart => args.add(None::<NaiveTime>),
        ColumnKind::Json | ColumnKind::JsonBinary => args.add(None::<serde_json::Value>),
        // Text and numeric text.
        _ => args.add(None::<String>),
    }
    .map_err(engine_error)
}

/// Bind one value, picking the Rust type from the value and the column kind.
pub(crate) fn bind_value(args: &mut PgArguments, bound: &BoundValue) -> Result<(), StorageError> {
    match &bound.value {
        Value::Null => return bind_null(args, &bound.kind),
        Value::Bool(b) => args.add(*b),
        Value::Int(n) if bound.kind == ColumnKind::Int32 => {
            args.add(i32::try_from(*n).map_err(engine_error)?)
        }
        Value::Int(n) => args.add(*n),
        // Only reachable through custom kinds; numerics travel as decimal text.
        Value::BigInt(n) => args.add(n.to_string()),
        Value::Float(n) if bound.kind == ColumnKind::Float32 => args.add(*n as f32),
        Value::Float(n) => args.add(*n),
        Value::Decimal(s) | Value::Text(s) => args.add(s.clone()),
        Value::Uuid(u) => args.add(*u),
        Value::Timestamp(dt) => args.add(*dt),
        Value::Date(d) => args.add(*d),
        Value::Time(t) => args.add(*t),
        Value::Json(j) => args.add(j.clone()),
    }
    .map_err(engine_error)
}

pub(crate) fn bind_all(values: &[BoundValue]) -> Result<PgArguments, StorageError> {
    let mut args = PgArguments::default();
    for value in values {
        bind_value(&mut args, value)?;
    }
    Ok(args)
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, StorageError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(idx).map_err(engine_error)
}

/// Read one column as a storage value, decoding by the reported Postgres type.
fn extract_value(row: &PgRow, idx: usize) -> Result<Value, StorageError> {
    let type_name = row.columns()[idx].type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => get::<bool>(row, idx)?.map(Value::Bool),
        "INT2" => get::<i16>(row, idx)?.map(|n| Value::Int(n.into())),
        "INT4" => get::<i32>(row, idx)?.map(|n| Value::Int(n.into())),
        "INT8" => get::<i64>(row, idx)?.map(Value::Int),
        "FLOAT4" => get::<f32>(row, idx)?.map(|n| Value::Float(n.into())),
        "FLOAT8" => get::<f64>(row, idx)?.map(Value::Float),
        "NUMERIC" => get::<rust_decimal::Decimal>(row, idx)?.map(|d| Value::Decimal(d.to_string())),
        "UUID" => get::<Uuid>(row, idx)?.map(Value::Uuid),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx)?.map(Value::Timestamp),
        "TIMESTAMP" => get::<NaiveDateTime>(row, idx)?.map(|dt| Value::Timestamp(dt.and_utc())),
        "DATE" => get::<NaiveDate>(row, idx)?.map(Value::Date),
        "TIME" => get::<NaiveTime>(row, idx)?.map(Value::Time),
        "JSON" | "JSONB" => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        _ => get::<String>(row, idx)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Every column of a result row, in storage form.
pub(crate) fn extract_row(row: &PgRow) -> Result<Row, StorageError> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.set(column.name(), extract_value(row, idx)?);
    }
    Ok(out)
}
