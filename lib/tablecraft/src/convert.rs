//! Value converters and the reusable building blocks drivers compose them from.
//!
//! A column's `to` converter is normally [`canonical`] followed by an engine
//! encoder, and its `from` converter is the matching decoder. Every function
//! here is pure; `Null` never reaches a converter (the transform hook handles
//! it before dispatch).

use std::fmt;
use std::sync::Arc;

use chrono::SubsecRound;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::schema::{Column, ColumnKind, TextFormat};
use crate::time::{
    format_date, format_time, format_timestamp, parse_date, parse_time, parse_timestamp,
    truncate_micros,
};
use crate::{ConversionIssue, Shape, Value};

/// Largest integer a JSON number (IEEE-754 double) represents exactly.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

type ConvertFn = dyn Fn(Value) -> Result<Value, ConversionIssue> + Send + Sync;

/// A shareable, side-effect-free value conversion.
#[derive(Clone)]
pub struct Converter(Arc<ConvertFn>);

impl Converter {
    pub fn new(f: impl Fn(Value) -> Result<Value, ConversionIssue> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn identity() -> Self {
        Self::new(Ok)
    }

    pub fn apply(&self, value: Value) -> Result<Value, ConversionIssue> {
        (self.0)(value)
    }

    /// Run `self`, then `next` on its output.
    pub fn then(self, next: Converter) -> Self {
        Self::new(move |v| next.apply(self.apply(v)?))
    }

    /// Whether both handles share one underlying function.
    pub fn ptr_eq(&self, other: &Converter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Converter(..)")
    }
}

fn mismatch(expected: &'static str, found: &Value) -> ConversionIssue {
    ConversionIssue::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

/// Normalize a caller-supplied value into the canonical domain of `column`.
///
/// Accepts the loose inputs listed per kind (numeric text for decimals,
/// hyphenated text for UUIDs, RFC 3339 text for timestamps, ...). Custom kinds
/// pass through untouched.
pub fn canonical(column: &Column) -> Converter {
    let p = column.params();
    match column.kind() {
        ColumnKind::Int32 => Converter::new(normalize_int32),
        ColumnKind::Int64 => Converter::new(normalize_int64),
        ColumnKind::BigInt => Converter::new(normalize_bigint),
        ColumnKind::Float32 => Converter::new(normalize_float32),
        ColumnKind::Float64 => Converter::new(normalize_float64),
        ColumnKind::Decimal => {
            let (precision, scale) = (p.precision.unwrap_or(28), p.scale.unwrap_or(0));
            Converter::new(move |v| normalize_decimal(v, precision, scale))
        }
        ColumnKind::Uuid => Converter::new(normalize_uuid),
        ColumnKind::String | ColumnKind::Varchar => {
            let (max_length, format) = (p.max_length, p.text_format);
            Converter::new(move |v| normalize_text(v, max_length, format))
        }
        ColumnKind::Boolean => Converter::new(normalize_bool),
        ColumnKind::Datetime => Converter::new(normalize_timestamp),
        ColumnKind::DatePart => Converter::new(normalize_date),
        ColumnKind::TimePart => Converter::new(normalize_time),
        ColumnKind::Json | ColumnKind::JsonBinary => {
            let shape = p.shape.clone();
            Converter::new(move |v| normalize_json(v, shape.as_ref()))
        }
        ColumnKind::Custom(_) => Converter::identity(),
    }
}

pub fn normalize_int64(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Int(n) => Ok(Value::Int(n)),
        Value::BigInt(n) => i64::try_from(n)
            .map(Value::Int)
            .map_err(|_| ConversionIssue::OutOfRange(n.to_string())),
        other => Err(mismatch("int", &other)),
    }
}

pub fn normalize_int32(value: Value) -> Result<Value, ConversionIssue> {
    let Value::Int(n) = normalize_int64(value)? else {
        return Err(ConversionIssue::Malformed("int".into()));
    };
    if i32::try_from(n).is_err() {
        return Err(ConversionIssue::OutOfRange(n.to_string()));
    }
    Ok(Value::Int(n))
}

pub fn normalize_bigint(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::BigInt(n) => Ok(Value::BigInt(n)),
        Value::Int(n) => Ok(Value::BigInt(n.into())),
        Value::Text(s) | Value::Decimal(s) => parse_bigint(&s).map(Value::BigInt),
        other => Err(mismatch("bigint", &other)),
    }
}

/// Parse a base-10 integer, rejecting fractions and exponents.
pub fn parse_bigint(s: &str) -> Result<i128, ConversionIssue> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConversionIssue::Malformed(format!("not an integer: {s:?}")));
    }
    s.parse::<i128>()
        .map_err(|_| ConversionIssue::OutOfRange(s.to_string()))
}

pub fn normalize_float64(value: Value) -> Result<Value, ConversionIssue> {
    let n = match value {
        Value::Float(n) => n,
        Value::Int(n) => n as f64,
        other => return Err(mismatch("float", &other)),
    };
    if !n.is_finite() {
        return Err(ConversionIssue::OutOfRange(n.to_string()));
    }
    Ok(Value::Float(n))
}

/// Round to the nearest `f32`, the precision a single-precision column keeps.
pub fn normalize_float32(value: Value) -> Result<Value, ConversionIssue> {
    let Value::Float(n) = normalize_float64(value)? else {
        return Err(ConversionIssue::Malformed("float".into()));
    };
    if n.abs() > f64::from(f32::MAX) {
        return Err(ConversionIssue::OutOfRange(n.to_string()));
    }
    Ok(Value::Float(f64::from(n as f32)))
}

/// Rescale to exactly `scale` fractional digits.
///
/// Values needing more fractional digits, or more than `precision` digits in
/// total, are rejected rather than rounded.
pub fn normalize_decimal(value: Value, precision: u32, scale: u32) -> Result<Value, ConversionIssue> {
    let mut d = match &value {
        Value::Decimal(s) | Value::Text(s) => Decimal::from_str_exact(s.trim())
            .map_err(|_| ConversionIssue::Malformed(format!("not a decimal: {s:?}")))?,
        Value::Int(n) => Decimal::from(*n),
        Value::BigInt(n) => Decimal::try_from_i128_with_scale(*n, 0)
            .map_err(|_| ConversionIssue::OutOfRange(n.to_string()))?,
        Value::Float(n) if n.is_finite() => Decimal::try_from(*n)
            .map_err(|_| ConversionIssue::OutOfRange(n.to_string()))?,
        Value::Float(n) => return Err(ConversionIssue::OutOfRange(n.to_string())),
        other => return Err(mismatch("decimal", other)),
    }
    .normalize();

    if d.scale() > scale {
        return Err(ConversionIssue::OutOfRange(format!(
            "{d} has more than {scale} fractional digits"
        )));
    }
    d.rescale(scale);
    let digits = d.mantissa().unsigned_abs().to_string().len() as u32;
    if digits > precision {
        return Err(ConversionIssue::OutOfRange(format!(
            "{d} exceeds {precision} significant digits"
        )));
    }
    Ok(Value::Decimal(d.to_string()))
}

pub fn normalize_uuid(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Uuid(u) => Ok(Value::Uuid(u)),
        Value::Text(s) => Uuid::parse_str(&s)
            .map(Value::Uuid)
            .map_err(|_| ConversionIssue::Malformed(format!("not a uuid: {s:?}"))),
        other => Err(mismatch("uuid", &other)),
    }
}

pub fn normalize_text(
    value: Value,
    max_length: Option<u32>,
    format: Option<TextFormat>,
) -> Result<Value, ConversionIssue> {
    let Value::Text(mut s) = value else {
        return Err(mismatch("text", &value));
    };
    if let Some(TextFormat::Email) = format {
        s = s.trim().to_string();
        if !is_email(&s) {
            return Err(ConversionIssue::Malformed(format!("not an email address: {s:?}")));
        }
    }
    if let Some(max) = max_length {
        let len = s.chars().count();
        if len > max as usize {
            return Err(ConversionIssue::OutOfRange(format!(
                "{len} characters, at most {max} allowed"
            )));
        }
    }
    Ok(Value::Text(s))
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

pub fn normalize_bool(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(b)),
        other => Err(mismatch("bool", &other)),
    }
}

pub fn normalize_timestamp(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Timestamp(dt) => Ok(Value::Timestamp(truncate_micros(dt))),
        Value::Text(s) => parse_timestamp(&s)
            .map(|dt| Value::Timestamp(truncate_micros(dt)))
            .ok_or_else(|| ConversionIssue::Malformed(format!("not a timestamp: {s:?}"))),
        other => Err(mismatch("timestamp", &other)),
    }
}

pub fn normalize_date(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Date(d) => Ok(Value::Date(d)),
        Value::Timestamp(dt) => Ok(Value::Date(dt.date_naive())),
        Value::Text(s) => parse_date(&s)
            .map(Value::Date)
            .ok_or_else(|| ConversionIssue::Malformed(format!("not a date: {s:?}"))),
        other => Err(mismatch("date", &other)),
    }
}

/// Times of day are truncated to microseconds, like timestamps.
pub fn normalize_time(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Time(t) => Ok(Value::Time(t.trunc_subsecs(6))),
        Value::Text(s) => parse_time(&s)
            .map(|t| Value::Time(t.trunc_subsecs(6)))
            .ok_or_else(|| ConversionIssue::Malformed(format!("not a time: {s:?}"))),
        other => Err(mismatch("time", &other)),
    }
}

pub fn normalize_json(value: Value, shape: Option<&Shape>) -> Result<Value, ConversionIssue> {
    let doc = match value {
        Value::Json(j) => j,
        Value::Text(s) => serde_json::from_str(&s)
            .map_err(|e| ConversionIssue::Malformed(format!("invalid json: {e}")))?,
        other => return Err(mismatch("json", &other)),
    };
    if let Some(shape) = shape {
        shape.validate(&doc).map_err(ConversionIssue::ShapeMismatch)?;
    }
    Ok(Value::Json(doc))
}

// Text encodings shared by the engines that lack a native type.

pub fn bigint_to_decimal_text(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::BigInt(n) => Ok(Value::Decimal(n.to_string())),
        other => Err(mismatch("bigint", &other)),
    }
}

/// Machine integer inside the safe range, decimal text outside it.
pub fn bigint_to_safe_integer(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::BigInt(n) if n.unsigned_abs() <= MAX_SAFE_INTEGER as u128 => Ok(Value::Int(n as i64)),
        Value::BigInt(n) => Ok(Value::Text(n.to_string())),
        other => Err(mismatch("bigint", &other)),
    }
}

pub fn bool_to_int(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        other => Err(mismatch("bool", &other)),
    }
}

pub fn int_to_bool(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::Int(n) => Err(ConversionIssue::OutOfRange(n.to_string())),
        other => Err(mismatch("int", &other)),
    }
}

pub fn uuid_to_text(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Uuid(u) => Ok(Value::Text(u.hyphenated().to_string())),
        other => Err(mismatch("uuid", &other)),
    }
}

pub fn decimal_to_text(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Decimal(s) => Ok(Value::Text(s)),
        other => Err(mismatch("decimal", &other)),
    }
}

pub fn timestamp_to_text(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Timestamp(dt) => Ok(Value::Text(format_timestamp(&dt))),
        other => Err(mismatch("timestamp", &other)),
    }
}

pub fn date_to_text(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Date(d) => Ok(Value::Text(format_date(&d))),
        other => Err(mismatch("date", &other)),
    }
}

pub fn time_to_text(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Time(t) => Ok(Value::Text(format_time(&t))),
        other => Err(mismatch("time", &other)),
    }
}

pub fn json_to_text(value: Value) -> Result<Value, ConversionIssue> {
    match value {
        Value::Json(j) => Ok(Value::Text(j.to_string())),
        other => Err(mismatch("json", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{self, define_table};
    use serde_json::json;

    fn column(col: Column) -> Column {
        define_table("t", [("c", col)])
            .unwrap()
            .columns()
            .first()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_decimal_is_rescaled() {
        let to = canonical(&column(schema::decimal(10, 2)));
        assert_eq!(to.apply(Value::from("12.5")), Ok(Value::Decimal("12.50".into())));
        assert_eq!(to.apply(Value::Int(3)), Ok(Value::Decimal("3.00".into())));
        assert_eq!(to.apply(Value::Float(0.25)), Ok(Value::Decimal("0.25".into())));
        assert_eq!(to.apply(Value::from("1.500")), Ok(Value::Decimal("1.50".into())));
    }

    #[test]
    fn test_decimal_rejects_lossy_input() {
        let to = canonical(&column(schema::decimal(4, 2)));
        assert!(matches!(to.apply(Value::from("1.234")), Err(ConversionIssue::OutOfRange(_))));
        assert!(matches!(to.apply(Value::from("123.4")), Err(ConversionIssue::OutOfRange(_))));
        assert!(matches!(to.apply(Value::Float(f64::NAN)), Err(ConversionIssue::OutOfRange(_))));
        assert!(matches!(to.apply(Value::from("abc")), Err(ConversionIssue::Malformed(_))));
    }

    #[test]
    fn test_uuid_accepts_text() {
        let to = canonical(&column(schema::uuid()));
        let u = Uuid::new_v4();
        assert_eq!(to.apply(Value::Text(u.to_string())), Ok(Value::Uuid(u)));
        assert!(matches!(to.apply(Value::from("nope")), Err(ConversionIssue::Malformed(_))));
    }

    #[test]
    fn test_varchar_length_counts_chars() {
        let to = canonical(&column(schema::varchar(3)));
        assert!(to.apply(Value::from("äöü")).is_ok());
        assert!(matches!(to.apply(Value::from("abcd")), Err(ConversionIssue::OutOfRange(_))));
    }

    #[test]
    fn test_email_is_trimmed_and_checked() {
        let to = canonical(&column(schema::email()));
        assert_eq!(
            to.apply(Value::from("  a@example.com ")),
            Ok(Value::from("a@example.com"))
        );
        assert!(to.apply(Value::from("a@b")).is_err());
        assert!(to.apply(Value::from("a b@example.com")).is_err());
    }

    #[test]
    fn test_int32_range() {
        let to = canonical(&column(schema::int32()));
        assert_eq!(to.apply(Value::Int(7)), Ok(Value::Int(7)));
        assert!(matches!(
            to.apply(Value::Int(i64::from(i32::MAX) + 1)),
            Err(ConversionIssue::OutOfRange(_))
        ));
    }

    #[test]
    fn test_float32_keeps_single_precision() {
        let to = canonical(&column(schema::float32()));
        assert_eq!(to.apply(Value::Float(0.1)), Ok(Value::Float(f64::from(0.1f32))));
        assert_eq!(to.apply(Value::Int(3)), Ok(Value::Float(3.0)));
        assert!(matches!(
            to.apply(Value::Float(f64::from(f32::MAX) * 2.0)),
            Err(ConversionIssue::OutOfRange(_))
        ));
    }

    #[test]
    fn test_bigint_accepts_digit_text() {
        let to = canonical(&column(schema::bigint()));
        assert_eq!(
            to.apply(Value::from("-170141183460469231731687303715884105728")),
            Ok(Value::BigInt(i128::MIN))
        );
        assert!(matches!(to.apply(Value::from("1e3")), Err(ConversionIssue::Malformed(_))));
    }

    #[test]
    fn test_safe_integer_boundary() {
        assert_eq!(
            bigint_to_safe_integer(Value::BigInt(MAX_SAFE_INTEGER.into())),
            Ok(Value::Int(MAX_SAFE_INTEGER))
        );
        assert_eq!(
            bigint_to_safe_integer(Value::BigInt(i128::from(MAX_SAFE_INTEGER) + 1)),
            Ok(Value::Text("9007199254740992".into()))
        );
        assert_eq!(
            bigint_to_safe_integer(Value::BigInt(-i128::from(MAX_SAFE_INTEGER) - 1)),
            Ok(Value::Text("-9007199254740992".into()))
        );
    }

    #[test]
    fn test_json_shape_checked() {
        let shape = Shape::object([("a", Shape::Integer)]);
        let to = canonical(&column(schema::json().shape(shape)));
        assert_eq!(to.apply(Value::from(r#"{"a":1}"#)), Ok(Value::Json(json!({"a": 1}))));
        assert!(matches!(
            to.apply(Value::Json(json!({"a": "x"}))),
            Err(ConversionIssue::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_then_composes_in_order() {
        let to = Converter::new(normalize_bool).then(Converter::new(bool_to_int));
        assert_eq!(to.apply(Value::Bool(true)), Ok(Value::Int(1)));
        assert!(to.apply(Value::Int(1)).is_err());
    }
}
