//! Statement text for the row helpers the backend pools expose.
//!
//! Only the shapes the pools need are covered: insert (optionally returning
//! the stored row), update filtered by key columns, and select-all. Parameter
//! syntax differs per engine and is supplied through [`ParamStyle`].

use crate::ddl::quote_ident;
use crate::schema::{Column, ColumnKind, Table};
use crate::transform::TransformHook;
use crate::{ConversionError, ConversionIssue, Row, Session, StorageError, Value, WriteKind};

/// Engine-specific parameter and projection syntax.
pub trait ParamStyle {
    /// Placeholder for the `index`th parameter (1-based), bound for `column`.
    fn param(&self, index: usize, column: &Column) -> String;

    /// Expression selecting `column` in a result set.
    fn select_expr(&self, column: &Column) -> String {
        quote_ident(column.name())
    }
}

fn select_list(style: &dyn ParamStyle, columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| style.select_expr(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `insert into "t" ("a", "b") values (...)`, optionally `returning` every column.
pub fn insert_sql(style: &dyn ParamStyle, table: &Table, columns: &[&Column], returning: bool) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(c.name())).collect();
    let params: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| style.param(i + 1, c))
        .collect();
    let mut sql = if columns.is_empty() {
        format!("insert into {} default values", quote_ident(table.name()))
    } else {
        format!(
            "insert into {} ({}) values ({})",
            quote_ident(table.name()),
            names.join(", "),
            params.join(", ")
        )
    };
    if returning {
        sql.push_str(" returning ");
        sql.push_str(&select_list(style, table.columns()));
    }
    sql
}

/// `update "t" set ... where ...`; parameters are numbered set columns first.
pub fn update_sql(style: &dyn ParamStyle, table: &Table, set: &[&Column], keys: &[&Column]) -> String {
    let assignments: Vec<String> = set
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", quote_ident(c.name()), style.param(i + 1, c)))
        .collect();
    let mut sql = format!(
        "update {} set {}",
        quote_ident(table.name()),
        assignments.join(", ")
    );
    if !keys.is_empty() {
        let filters: Vec<String> = keys
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = {}", quote_ident(c.name()), style.param(set.len() + i + 1, c)))
            .collect();
        sql.push_str(" where ");
        sql.push_str(&filters.join(" and "));
    }
    sql
}

/// `select <every column> from "t"`.
pub fn select_sql(style: &dyn ParamStyle, table: &Table) -> String {
    format!(
        "select {} from {}",
        select_list(style, table.columns()),
        quote_ident(table.name())
    )
}

/// A storage value and the kind of the column it is bound for.
///
/// Backends need the kind to pick a typed null and the right encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub value: Value,
    pub kind: ColumnKind,
}

/// Statement text plus its parameters, already in storage form.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub sql: String,
    pub params: Vec<BoundValue>,
}

fn table<'a>(session: &'a Session, name: &str) -> Result<&'a Table, ConversionError> {
    session
        .table(name)
        .ok_or_else(|| ConversionError::new(name, "*", "?", ConversionIssue::UnknownTable))
}

fn bind_row<'a>(table: &'a Table, row: Row) -> (Vec<&'a Column>, Vec<BoundValue>) {
    let mut columns = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());
    for (name, value) in row {
        // The transform hook has already rejected unknown columns.
        if let Some(column) = table.column(&name) {
            params.push(BoundValue {
                value,
                kind: column.kind().clone(),
            });
            columns.push(column);
        }
    }
    (columns, params)
}

/// Convert `row` through the session's transforms and build its insert.
pub fn prepare_insert(
    session: &Session,
    style: &dyn ParamStyle,
    table_name: &str,
    row: Row,
    returning: bool,
) -> Result<Prepared, StorageError> {
    let table = table(session, table_name)?;
    let stored = session
        .transforms()
        .rewrite_write(table_name, WriteKind::Insert, row)?;
    let (columns, params) = bind_row(table, stored);
    Ok(Prepared {
        sql: insert_sql(style, table, &columns, returning),
        params,
    })
}

/// Build an update setting `set` on the rows matching every value in `keys`.
///
/// `keys` must carry every primary-key and update-key column, so a writer
/// holding a stale row version matches nothing. Key values are converted but
/// not checked for writability.
pub fn prepare_update(
    session: &Session,
    style: &dyn ParamStyle,
    table_name: &str,
    set: Row,
    keys: Row,
) -> Result<Prepared, StorageError> {
    let table = table(session, table_name)?;
    if set.is_empty() {
        return Err(ConversionError::new(table_name, "*", "?", ConversionIssue::EmptyUpdate).into());
    }
    let missing = table
        .primary_key_columns()
        .chain(table.update_key_columns())
        .find(|c| keys.get(c.name()).is_none());
    if let Some(column) = missing {
        return Err(ConversionError::new(
            table_name,
            column.name(),
            column.kind().as_str(),
            ConversionIssue::MissingUpdateKey,
        )
        .into());
    }
    if keys.is_empty() {
        return Err(
            ConversionError::new(table_name, "*", "?", ConversionIssue::MissingUpdateKey).into(),
        );
    }
    let transforms = session.transforms();
    let stored_set = transforms.rewrite_write(table_name, WriteKind::Update, set)?;
    let mut stored_keys = Row::new();
    for (column, value) in keys {
        let value = transforms.to_storage(table_name, &column, value)?;
        stored_keys.set(column, value);
    }
    let (set_columns, mut params) = bind_row(table, stored_set);
    let (key_columns, key_params) = bind_row(table, stored_keys);
    params.extend(key_params);
    Ok(Prepared {
        sql: update_sql(style, table, &set_columns, &key_columns),
        params,
    })
}

pub fn prepare_select(
    session: &Session,
    style: &dyn ParamStyle,
    table_name: &str,
) -> Result<String, StorageError> {
    Ok(select_sql(style, table(session, table_name)?))
}
