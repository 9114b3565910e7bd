//! Typed row structs.
//!
//! Add `#[derive(TableRow)]` with `#[table_row(table = "...")]` to a struct
//! whose fields mirror a table's columns to move between the struct and the
//! untyped [`Row`] the query layer works with.

use crate::{ConversionError, Row};

/// A hand-written, statically typed view of one table's rows.
///
/// # Example
///
/// ```text
/// #[derive(TableRow)]
/// #[table_row(table = "person")]
/// pub struct Person {
///     #[column(read_only)]
///     pub id: i64,
///     pub first_name: String,
///     #[column(name = "supervisor_id")]
///     pub supervisor: Option<i64>,
///     #[column(read_only)]
///     pub created_at: DateTime<Utc>,
/// }
/// ```
///
/// Field names are column names unless `#[column(name = "...")]` says
/// otherwise. `#[column(read_only)]` fields are left out of
/// [`insertable_row`](TableRow::insertable_row).
pub trait TableRow: Sized + Send + Sync {
    fn table_name() -> &'static str;

    /// Column names in field order.
    fn columns() -> &'static [&'static str];

    /// Every field as a column value.
    fn to_row(&self) -> Row;

    /// Only the fields a caller may supply on insert.
    fn insertable_row(&self) -> Row;

    /// Build from a row of canonical values. Missing columns read as null.
    fn from_row(row: Row) -> Result<Self, ConversionError>;
}
