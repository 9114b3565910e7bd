//! JSON transport encoding of canonical values.
//!
//! Integers beyond the safe-integer range of a JSON number are written as
//! strings so that clients parsing numbers as doubles lose nothing. Inbound,
//! either form is accepted.

use serde_json::Value as Json;

use crate::convert::{MAX_SAFE_INTEGER, canonical, parse_bigint};
use crate::schema::{Column, ColumnKind, Table};
use crate::time::{format_date, format_time, format_timestamp};
use crate::{ConversionError, ConversionIssue, Row, Value};

fn integer_to_json(n: i128) -> Json {
    if n.unsigned_abs() <= MAX_SAFE_INTEGER as u128 {
        Json::from(n as i64)
    } else {
        Json::String(n.to_string())
    }
}

/// Encode one canonical value.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => integer_to_json(i128::from(*n)),
        Value::BigInt(n) => integer_to_json(*n),
        Value::Float(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
        Value::Decimal(s) | Value::Text(s) => Json::String(s.clone()),
        Value::Uuid(u) => Json::String(u.hyphenated().to_string()),
        Value::Timestamp(dt) => Json::String(format_timestamp(dt)),
        Value::Date(d) => Json::String(format_date(d)),
        Value::Time(t) => Json::String(format_time(t)),
        Value::Json(j) => j.clone(),
    }
}

/// Decode one JSON value into the canonical domain of `column`.
pub fn value_from_json(column: &Column, json: Json) -> Result<Value, ConversionIssue> {
    if json.is_null() && !matches!(column.kind(), ColumnKind::Json | ColumnKind::JsonBinary) {
        return Ok(Value::Null);
    }
    let loose = match (column.kind(), json) {
        (ColumnKind::Json | ColumnKind::JsonBinary | ColumnKind::Custom(_), j) => Value::Json(j),
        (ColumnKind::Int32 | ColumnKind::Int64 | ColumnKind::BigInt, Json::Number(n)) => {
            match n.as_i64() {
                Some(i) => Value::Int(i),
                None => return Err(ConversionIssue::Malformed(format!("not an integer: {n}"))),
            }
        }
        (ColumnKind::Int32 | ColumnKind::Int64 | ColumnKind::BigInt, Json::String(s)) => {
            Value::BigInt(parse_bigint(&s)?)
        }
        (ColumnKind::Float32 | ColumnKind::Float64 | ColumnKind::Decimal, Json::Number(n)) => {
            match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            }
        }
        (ColumnKind::Boolean, Json::Bool(b)) => Value::Bool(b),
        (_, Json::String(s)) => Value::Text(s),
        (_, other) => {
            return Err(ConversionIssue::Malformed(format!(
                "unexpected json for {}: {other}",
                column.kind()
            )));
        }
    };
    if let ColumnKind::Custom(_) = column.kind() {
        return Ok(loose);
    }
    canonical(column).apply(loose)
}

/// Encode a row as a JSON object in column order.
pub fn row_to_json(row: &Row) -> Json {
    Json::Object(
        row.iter()
            .map(|(column, value)| (column.to_string(), value_to_json(value)))
            .collect(),
    )
}

impl serde::Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, &value_to_json(value))?;
        }
        map.end()
    }
}

/// Decode a JSON object into a row of canonical values for `table`.
///
/// Keys that name no column of the table are rejected.
pub fn row_from_json(table: &Table, json: Json) -> Result<Row, ConversionError> {
    let Json::Object(map) = json else {
        return Err(ConversionError::new(
            table.name(),
            "*",
            "row",
            ConversionIssue::TypeMismatch {
                expected: "object",
                found: "json",
            },
        ));
    };
    let mut row = Row::new();
    for (key, value) in map {
        let column = table.column(&key).ok_or_else(|| {
            ConversionError::new(table.name(), key.as_str(), "?", ConversionIssue::UnknownColumn)
        })?;
        let value = value_from_json(column, value).map_err(|issue| {
            ConversionError::new(table.name(), key.as_str(), column.kind().as_str(), issue)
        })?;
        row.set(key, value);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{self, define_table};
    use serde_json::json;

    fn table() -> Table {
        define_table(
            "ledger",
            [
                ("id", schema::int64()),
                ("balance", schema::bigint()),
                ("price", schema::decimal(10, 2)),
                ("at", schema::datetime()),
                ("meta", schema::json().nullable()),
                ("memo", schema::string().nullable()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_safe_integers_stay_numbers() {
        assert_eq!(value_to_json(&Value::Int(MAX_SAFE_INTEGER)), json!(9007199254740991i64));
        assert_eq!(value_to_json(&Value::Int(MAX_SAFE_INTEGER + 1)), json!("9007199254740992"));
        assert_eq!(
            value_to_json(&Value::BigInt(i128::MAX)),
            json!("170141183460469231731687303715884105727")
        );
    }

    #[test]
    fn test_row_round_trip() {
        let doc = json!({
            "id": "9007199254740993",
            "balance": "-170141183460469231731687303715884105728",
            "price": 12.5,
            "at": "2024-01-02T03:04:05.000006Z",
            "meta": null,
            "memo": null,
        });
        let row = row_from_json(&table(), doc).unwrap();
        assert_eq!(row.get("id"), Some(&Value::Int(9007199254740993)));
        assert_eq!(row.get("balance"), Some(&Value::BigInt(i128::MIN)));
        assert_eq!(row.get("price"), Some(&Value::Decimal("12.50".into())));
        assert_eq!(row.get("meta"), Some(&Value::Json(Json::Null)));
        assert_eq!(row.get("memo"), Some(&Value::Null));

        let back = row_to_json(&row);
        assert_eq!(back["id"], json!("9007199254740993"));
        assert_eq!(back["price"], json!("12.50"));
        assert_eq!(back["at"], json!("2024-01-02T03:04:05.000006Z"));
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let row = Row::new().with("b", 1i64).with("a", i128::MAX);
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"b":1,"a":"170141183460469231731687303715884105727"}"#
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = row_from_json(&table(), json!({"nope": 1})).unwrap_err();
        assert_eq!(err.issue, ConversionIssue::UnknownColumn);
    }

    #[test]
    fn test_fractional_integer_rejected() {
        let err = row_from_json(&table(), json!({"id": 1.5})).unwrap_err();
        assert!(matches!(err.issue, ConversionIssue::Malformed(_)));
    }
}
