//! Column kinds mapped to SQLite storage classes.
//!
//! SQLite has five storage classes, so most kinds are stored as text in a
//! canonical form and parsed back on read. Booleans are stored as 0/1
//! integers and JSON as validated text.

use tablecraft::convert::{
    self, Converter, bigint_to_safe_integer, bool_to_int, date_to_text, decimal_to_text,
    int_to_bool, json_to_text, normalize_bigint, normalize_date, normalize_float32,
    normalize_float64, normalize_int32, normalize_int64, normalize_time, normalize_timestamp,
    normalize_uuid, time_to_text, timestamp_to_text, uuid_to_text,
};
use tablecraft::{
    Column, ColumnKind, ColumnPhysical, ConfigurationError, DefaultValue, Driver, quote_ident,
};

use crate::triggers::on_update_triggers;

pub const ENGINE: &str = "sqlite";

/// Current time in the canonical timestamp text form, millisecond precision.
pub const NOW_EXPRESSION: &str = "(strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))";

/// A random version 4 UUID in hyphenated lowercase text.
pub const UUID_EXPRESSION: &str = "(lower(hex(randomblob(4))) || '-' || lower(hex(randomblob(2))) \
     || '-4' || substr(lower(hex(randomblob(2))), 2) || '-' \
     || substr('89ab', 1 + (abs(random()) % 4), 1) || substr(lower(hex(randomblob(2))), 2) \
     || '-' || lower(hex(randomblob(6))))";

/// The built-in SQLite driver.
pub fn driver() -> Driver {
    Driver::new(ENGINE)
        .with_resolver(ColumnKind::Int32, |c: &Column| {
            integer_column(c, Converter::new(normalize_int32))
        })
        .with_resolver(ColumnKind::Int64, |c: &Column| {
            integer_column(c, Converter::new(normalize_int64))
        })
        // Text affinity keeps values beyond 64 bits exact.
        .with_resolver(ColumnKind::BigInt, |c: &Column| {
            Ok(text_column(c, bigint_to_safe_integer).decode(Converter::new(normalize_bigint)))
        })
        .with_resolver(ColumnKind::Float32, |c: &Column| {
            Ok(ColumnPhysical::new("real", c).decode(Converter::new(normalize_float32)))
        })
        .with_resolver(ColumnKind::Float64, |c: &Column| {
            Ok(ColumnPhysical::new("real", c).decode(Converter::new(normalize_float64)))
        })
        .with_resolver(ColumnKind::Decimal, |c: &Column| {
            let (precision, scale) = match (c.params().precision, c.params().scale) {
                (Some(p), Some(s)) => (p, s),
                _ => {
                    return Err(ConfigurationError::MissingParameter {
                        table: c.table().to_string(),
                        column: c.name().to_string(),
                        kind: c.kind().clone(),
                        parameter: "precision",
                    });
                }
            };
            Ok(text_column(c, decimal_to_text)
                .decode(Converter::new(move |v| convert::normalize_decimal(v, precision, scale))))
        })
        .with_resolver(ColumnKind::Uuid, |c: &Column| {
            Ok(text_column(c, uuid_to_text).decode(Converter::new(normalize_uuid)))
        })
        .with_resolver(ColumnKind::String, |c: &Column| Ok(ColumnPhysical::new("text", c)))
        .with_resolver(ColumnKind::Varchar, |c: &Column| Ok(ColumnPhysical::new("text", c)))
        .with_resolver(ColumnKind::Boolean, |c: &Column| {
            Ok(ColumnPhysical::new("integer", c)
                .encode(Converter::new(bool_to_int))
                .decode(Converter::new(int_to_bool)))
        })
        .with_resolver(ColumnKind::Datetime, |c: &Column| {
            Ok(text_column(c, timestamp_to_text).decode(Converter::new(normalize_timestamp)))
        })
        .with_resolver(ColumnKind::DatePart, |c: &Column| {
            Ok(text_column(c, date_to_text).decode(Converter::new(normalize_date)))
        })
        .with_resolver(ColumnKind::TimePart, |c: &Column| {
            Ok(text_column(c, time_to_text).decode(Converter::new(normalize_time)))
        })
        .with_resolver(ColumnKind::Json, |c: &Column| Ok(json_column(c)))
        .with_resolver(ColumnKind::JsonBinary, |c: &Column| Ok(json_column(c)))
        .with_default_hook(|column, default| match (default, column.kind()) {
            (DefaultValue::Now, ColumnKind::DatePart) => Some("(date('now'))".to_string()),
            (DefaultValue::Now, ColumnKind::TimePart) => Some("(time('now'))".to_string()),
            (DefaultValue::Now, _) => Some(NOW_EXPRESSION.to_string()),
            (DefaultValue::Generate, _) => Some(UUID_EXPRESSION.to_string()),
            _ => None,
        })
        .with_after_hook(on_update_triggers)
}

/// `integer`, with `autoincrement` when asked for. SQLite only allows that on
/// the primary key.
fn integer_column(c: &Column, decode: Converter) -> Result<ColumnPhysical, ConfigurationError> {
    let physical = ColumnPhysical::new("integer", c).decode(decode);
    if !c.params().auto_increment {
        return Ok(physical);
    }
    if !c.params().primary_key {
        return Err(ConfigurationError::ConflictingFlags {
            table: c.table().to_string(),
            column: c.name().to_string(),
            kind: c.kind().clone(),
            reason: "sqlite only supports autoincrement on the primary key".into(),
        });
    }
    Ok(physical.with_column_hook(|def| def.autoincrement()))
}

fn text_column(
    c: &Column,
    encode: fn(tablecraft::Value) -> Result<tablecraft::Value, tablecraft::ConversionIssue>,
) -> ColumnPhysical {
    ColumnPhysical::new("text", c).encode(Converter::new(encode))
}

fn json_column(c: &Column) -> ColumnPhysical {
    let shape = c.params().shape.clone();
    let top = shape.as_ref().and_then(|s| s.top_level());
    text_column(c, json_to_text)
        .decode(Converter::new(move |v| convert::normalize_json(v, shape.as_ref())))
        .with_column_hook(move |def| {
            let col = quote_ident(&def.name);
            let check = match top {
                Some(top) => format!(
                    "json_valid({col}) and json_type({col}) = '{}'",
                    top.json_type_name()
                ),
                None => format!("json_valid({col})"),
            };
            def.check(check)
        })
}
