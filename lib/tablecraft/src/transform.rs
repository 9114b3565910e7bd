//! The value transform pipeline.
//!
//! A [`TransformMap`] holds, for every table and column, the `to`/`from`
//! converter pair its driver resolved. It is built once per session and
//! applied by the query layer through the [`TransformHook`] interface.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::convert::Converter;
use crate::registry::Driver;
use crate::schema::{ColumnKind, Table};
use crate::{ConfigurationError, ConversionError, ConversionIssue, Row, Value, WriteKind};

/// Converters and write permissions for one column.
#[derive(Debug, Clone)]
pub struct ColumnTransform {
    pub kind: ColumnKind,
    pub nullable: bool,
    pub not_insertable: bool,
    pub not_updatable: bool,
    pub to: Converter,
    pub from: Converter,
}

impl ColumnTransform {
    fn writable(&self, write: WriteKind) -> bool {
        match write {
            WriteKind::Insert => !self.not_insertable,
            WriteKind::Update => !self.not_updatable,
        }
    }
}

/// Rewrites values crossing the query boundary.
pub trait TransformHook: Send + Sync {
    /// Convert every value of an outgoing insert or update to its storage form.
    fn rewrite_write(&self, table: &str, write: WriteKind, row: Row) -> Result<Row, ConversionError>;

    /// Convert every field of a row read back from storage.
    fn rewrite_row(&self, table: &str, row: Row) -> Result<Row, ConversionError>;
}

/// Per-table, per-column converter pairs for one engine.
#[derive(Debug, Clone)]
pub struct TransformMap {
    engine: String,
    tables: HashMap<String, HashMap<String, ColumnTransform>>,
}

impl TransformMap {
    /// Resolve every column of every table and keep its converter pair.
    ///
    /// Pairs already resolved through `driver` are reused.
    pub fn build(tables: &[Table], driver: &Driver) -> Result<Self, ConfigurationError> {
        let mut map = HashMap::with_capacity(tables.len());
        let mut reused = 0usize;

        for table in tables {
            let mut columns = HashMap::with_capacity(table.columns().len());
            for column in table.columns() {
                let ((to, from), hit) = driver.converters(column)?;
                reused += usize::from(hit);

                let p = column.params();
                columns.insert(
                    column.name().to_string(),
                    ColumnTransform {
                        kind: column.kind().clone(),
                        nullable: p.nullable,
                        not_insertable: p.not_insertable,
                        not_updatable: p.not_updatable,
                        to,
                        from,
                    },
                );
            }
            map.insert(table.name().to_string(), columns);
        }

        debug!(engine = driver.engine(), tables = map.len(), reused, "built transform map");
        Ok(Self {
            engine: driver.engine().to_string(),
            tables: map,
        })
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnTransform> {
        self.tables.get(table)?.get(column)
    }

    fn lookup(&self, table: &str, column: &str) -> Result<&ColumnTransform, ConversionError> {
        let columns = self.tables.get(table).ok_or_else(|| {
            ConversionError::new(table, column, "?", ConversionIssue::UnknownTable)
        })?;
        columns.get(column).ok_or_else(|| {
            ConversionError::new(table, column, "?", ConversionIssue::UnknownColumn)
        })
    }

    /// Convert one value to its storage form without write-permission checks.
    ///
    /// Used for values that only appear in filters, such as update keys in a
    /// `where` clause.
    pub fn to_storage(&self, table: &str, column: &str, value: Value) -> Result<Value, ConversionError> {
        let transform = self.lookup(table, column)?;
        apply(&transform.to, transform, table, column, value, true)
    }

    /// Convert one stored value back to its canonical form.
    pub fn from_storage(&self, table: &str, column: &str, value: Value) -> Result<Value, ConversionError> {
        let transform = self.lookup(table, column)?;
        apply(&transform.from, transform, table, column, value, false)
    }
}

fn apply(
    converter: &Converter,
    transform: &ColumnTransform,
    table: &str,
    column: &str,
    value: Value,
    writing: bool,
) -> Result<Value, ConversionError> {
    if value.is_null() {
        // Reads pass null through: outer joins yield nulls for any column.
        return if transform.nullable || !writing {
            Ok(Value::Null)
        } else {
            Err(ConversionError::new(
                table,
                column,
                transform.kind.as_str(),
                ConversionIssue::NullNotAllowed,
            ))
        };
    }
    converter.apply(value).map_err(|issue| {
        trace!(table, column, kind = %transform.kind, %issue, "conversion failed");
        ConversionError::new(table, column, transform.kind.as_str(), issue)
    })
}

impl TransformHook for TransformMap {
    fn rewrite_write(&self, table: &str, write: WriteKind, row: Row) -> Result<Row, ConversionError> {
        let mut out = Row::new();
        for (column, value) in row {
            let transform = self.lookup(table, &column)?;
            if !transform.writable(write) {
                return Err(ConversionError::new(
                    table,
                    column,
                    transform.kind.as_str(),
                    ConversionIssue::NotWritable(write),
                ));
            }
            let stored = apply(&transform.to, transform, table, &column, value, true)?;
            out.set(column, stored);
        }
        Ok(out)
    }

    /// Fields that match no known column, such as computed expressions, pass
    /// through unchanged.
    fn rewrite_row(&self, table: &str, row: Row) -> Result<Row, ConversionError> {
        let Some(columns) = self.tables.get(table) else {
            return Err(ConversionError::new(table, "*", "?", ConversionIssue::UnknownTable));
        };
        let mut out = Row::new();
        for (column, value) in row {
            let value = match columns.get(&column) {
                Some(transform) => apply(&transform.from, transform, table, &column, value, false)?,
                None => value,
            };
            out.set(column, value);
        }
        Ok(out)
    }
}
