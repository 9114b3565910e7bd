//! Column kinds mapped to PostgreSQL types.

use tablecraft::convert::{
    self, Converter, bigint_to_decimal_text, normalize_bigint, normalize_bool, normalize_date,
    normalize_float32, normalize_float64, normalize_int32, normalize_int64, normalize_time,
    normalize_timestamp, normalize_uuid,
};
use tablecraft::{
    Column, ColumnKind, ColumnPhysical, ConfigurationError, CreateTable, DefaultValue, Driver,
    quote_ident,
};

use crate::triggers::on_update_triggers;

pub const ENGINE: &str = "postgres";

/// The built-in PostgreSQL driver.
///
/// Every kind maps to a native type. Auto-increment integers become
/// `serial`/`bigserial`, `bigint` is stored as `numeric`, and JSON columns with
/// a top-level shape get a table-level `check` on `json_typeof`.
pub fn driver() -> Driver {
    Driver::new(ENGINE)
        .with_resolver(ColumnKind::Int32, |c: &Column| {
            let datatype = if c.params().auto_increment { "serial" } else { "integer" };
            Ok(ColumnPhysical::new(datatype, c).decode(Converter::new(normalize_int32)))
        })
        .with_resolver(ColumnKind::Int64, |c: &Column| {
            let datatype = if c.params().auto_increment { "bigserial" } else { "bigint" };
            Ok(ColumnPhysical::new(datatype, c).decode(Converter::new(normalize_int64)))
        })
        .with_resolver(ColumnKind::BigInt, |c: &Column| {
            Ok(ColumnPhysical::new("numeric", c)
                .encode(Converter::new(bigint_to_decimal_text))
                .decode(Converter::new(normalize_bigint)))
        })
        .with_resolver(ColumnKind::Float32, |c: &Column| {
            Ok(ColumnPhysical::new("real", c).decode(Converter::new(normalize_float32)))
        })
        .with_resolver(ColumnKind::Float64, |c: &Column| {
            Ok(ColumnPhysical::new("double precision", c).decode(Converter::new(normalize_float64)))
        })
        .with_resolver(ColumnKind::Decimal, |c: &Column| {
            let (precision, scale) = decimal_params(c)?;
            Ok(ColumnPhysical::new(format!("decimal({precision}, {scale})"), c)
                .decode(Converter::new(move |v| convert::normalize_decimal(v, precision, scale))))
        })
        .with_resolver(ColumnKind::Uuid, |c: &Column| {
            Ok(ColumnPhysical::new("uuid", c).decode(Converter::new(normalize_uuid)))
        })
        .with_resolver(ColumnKind::String, |c: &Column| {
            Ok(ColumnPhysical::new("text", c))
        })
        .with_resolver(ColumnKind::Varchar, |c: &Column| {
            let max_length = c.params().max_length.unwrap_or(255);
            Ok(ColumnPhysical::new(format!("varchar({max_length})"), c))
        })
        .with_resolver(ColumnKind::Boolean, |c: &Column| {
            Ok(ColumnPhysical::new("boolean", c).decode(Converter::new(normalize_bool)))
        })
        .with_resolver(ColumnKind::Datetime, |c: &Column| {
            Ok(ColumnPhysical::new("timestamptz", c).decode(Converter::new(normalize_timestamp)))
        })
        .with_resolver(ColumnKind::DatePart, |c: &Column| {
            Ok(ColumnPhysical::new("date", c).decode(Converter::new(normalize_date)))
        })
        .with_resolver(ColumnKind::TimePart, |c: &Column| {
            Ok(ColumnPhysical::new("time", c).decode(Converter::new(normalize_time)))
        })
        .with_resolver(ColumnKind::Json, |c: &Column| Ok(json_column("json", "json_typeof", c)))
        .with_resolver(ColumnKind::JsonBinary, |c: &Column| {
            Ok(json_column("jsonb", "jsonb_typeof", c))
        })
        .with_default_hook(|_, default| match default {
            DefaultValue::Now => Some("now()".to_string()),
            DefaultValue::Generate => Some("gen_random_uuid()".to_string()),
            _ => None,
        })
        .with_after_hook(on_update_triggers)
}

fn decimal_params(c: &Column) -> Result<(u32, u32), ConfigurationError> {
    match (c.params().precision, c.params().scale) {
        (Some(precision), Some(scale)) => Ok((precision, scale)),
        (precision, _) => Err(ConfigurationError::MissingParameter {
            table: c.table().to_string(),
            column: c.name().to_string(),
            kind: c.kind().clone(),
            parameter: if precision.is_none() { "precision" } else { "scale" },
        }),
    }
}

fn json_column(datatype: &str, typeof_fn: &'static str, c: &Column) -> ColumnPhysical {
    let shape = c.params().shape.clone();
    let physical = ColumnPhysical::new(datatype, c)
        .decode(Converter::new(move |v| convert::normalize_json(v, shape.as_ref())));
    let Some(top) = c.params().shape.as_ref().and_then(|s| s.top_level()) else {
        return physical;
    };
    let column = quote_ident(c.name());
    physical.with_table_hook(move |create: &mut CreateTable| {
        create.add_constraint(format!(
            "check ({typeof_fn}({column}) = '{}')",
            top.json_type_name()
        ));
    })
}
