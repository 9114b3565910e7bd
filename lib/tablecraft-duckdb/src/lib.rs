//! DuckDB driver for tablecraft.
//!
//! DuckDB has native types for every kind, so the driver mostly renames them.
//! Auto-increment columns draw from a sequence created ahead of the table.
//! DuckDB has no triggers, so on-update policies are not maintained by the
//! engine; the driver logs a warning for each such column instead.
//!
//! Execution is left to the caller: run the compiled schema through any
//! [`tablecraft::StatementExecutor`].

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

use tablecraft::convert::{
    self, Converter, json_to_text, normalize_bigint, normalize_date, normalize_float32,
    normalize_float64, normalize_int32, normalize_int64, normalize_time, normalize_timestamp,
    normalize_uuid,
};
use tablecraft::{
    Column, ColumnKind, ColumnPhysical, ConfigurationError, DefaultValue, Driver, Table,
    quote_ident, quote_literal,
};
use tracing::warn;

pub const ENGINE: &str = "duckdb";

/// Name of the sequence backing an auto-increment column.
pub fn sequence_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_seq")
}

/// The built-in DuckDB driver.
pub fn driver() -> Driver {
    Driver::new(ENGINE)
        .with_resolver(ColumnKind::Int32, |c: &Column| {
            Ok(integer_column("int4", c).decode(Converter::new(normalize_int32)))
        })
        .with_resolver(ColumnKind::Int64, |c: &Column| {
            Ok(integer_column("int8", c).decode(Converter::new(normalize_int64)))
        })
        .with_resolver(ColumnKind::BigInt, |c: &Column| {
            Ok(ColumnPhysical::new("hugeint", c).decode(Converter::new(normalize_bigint)))
        })
        .with_resolver(ColumnKind::Float32, |c: &Column| {
            Ok(ColumnPhysical::new("real", c).decode(Converter::new(normalize_float32)))
        })
        .with_resolver(ColumnKind::Float64, |c: &Column| {
            Ok(ColumnPhysical::new("float8", c).decode(Converter::new(normalize_float64)))
        })
        .with_resolver(ColumnKind::Decimal, decimal_column)
        .with_resolver(ColumnKind::Uuid, |c: &Column| {
            Ok(ColumnPhysical::new("uuid", c).decode(Converter::new(normalize_uuid)))
        })
        .with_resolver(ColumnKind::String, |c: &Column| Ok(ColumnPhysical::new("text", c)))
        .with_resolver(ColumnKind::Varchar, |c: &Column| {
            let max_length = c.params().max_length.unwrap_or(255);
            Ok(ColumnPhysical::new(format!("varchar({max_length})"), c))
        })
        .with_resolver(ColumnKind::Boolean, |c: &Column| Ok(ColumnPhysical::new("boolean", c)))
        .with_resolver(ColumnKind::Datetime, |c: &Column| {
            Ok(ColumnPhysical::new("timestamptz", c).decode(Converter::new(normalize_timestamp)))
        })
        .with_resolver(ColumnKind::DatePart, |c: &Column| {
            Ok(ColumnPhysical::new("date", c).decode(Converter::new(normalize_date)))
        })
        .with_resolver(ColumnKind::TimePart, |c: &Column| {
            Ok(ColumnPhysical::new("time", c).decode(Converter::new(normalize_time)))
        })
        .with_resolver(ColumnKind::Json, |c: &Column| Ok(json_column(c)))
        .with_resolver(ColumnKind::JsonBinary, |c: &Column| Ok(json_column(c)))
        .with_default_hook(|_, default| match default {
            DefaultValue::Now => Some("current_timestamp".to_string()),
            DefaultValue::Generate => Some("gen_random_uuid()".to_string()),
            _ => None,
        })
        .with_after_hook(unmaintained_on_update)
}

fn integer_column(datatype: &str, c: &Column) -> ColumnPhysical {
    let physical = ColumnPhysical::new(datatype, c);
    if !c.params().auto_increment {
        return physical;
    }
    let sequence = sequence_name(c.table(), c.name());
    let default = format!("nextval({})", quote_literal(&sequence));
    physical
        .with_prepend(format!("create sequence {}", quote_ident(&sequence)))
        .with_column_hook(move |def| def.default_to(default.clone()))
}

fn decimal_column(c: &Column) -> Result<ColumnPhysical, ConfigurationError> {
    let (Some(precision), Some(scale)) = (c.params().precision, c.params().scale) else {
        return Err(ConfigurationError::MissingParameter {
            table: c.table().to_string(),
            column: c.name().to_string(),
            kind: c.kind().clone(),
            parameter: "precision",
        });
    };
    Ok(ColumnPhysical::new(format!("decimal({precision}, {scale})"), c)
        .decode(Converter::new(move |v| convert::normalize_decimal(v, precision, scale))))
}

/// JSON documents are written as serialized text and parsed back on read.
fn json_column(c: &Column) -> ColumnPhysical {
    let shape = c.params().shape.clone();
    ColumnPhysical::new("json", c)
        .encode(Converter::new(json_to_text))
        .decode(Converter::new(move |v| convert::normalize_json(v, shape.as_ref())))
}

fn unmaintained_on_update(tables: &[Table]) -> Vec<String> {
    for table in tables {
        for column in table.columns() {
            if let Some(policy) = column.params().on_update {
                warn!(
                    engine = ENGINE,
                    table = table.name(),
                    column = column.name(),
                    policy = policy.as_str(),
                    "on-update policy is not maintained by this engine"
                );
            }
        }
    }
    Vec::new()
}
