//! Dialect-independent table and column definitions.
//!
//! Tables are built once from static configuration with [`define_table`] and
//! are read-only afterwards. Each column carries its [`ColumnKind`] and a
//! [`ColumnParams`] record; the column and table names are written into the
//! record when the table is defined so later stages never need them passed
//! separately.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::{ConfigurationError, Shape, Value};

/// Logical column kind. Drivers map each kind to a physical type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Int32,
    Int64,
    BigInt,
    Float32,
    Float64,
    Decimal,
    Uuid,
    String,
    Varchar,
    Boolean,
    Datetime,
    DatePart,
    TimePart,
    Json,
    JsonBinary,
    /// A project-specific kind, resolved by a caller-registered resolver.
    Custom(Cow<'static, str>),
}

impl ColumnKind {
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        ColumnKind::Custom(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            ColumnKind::Int32 => "int32",
            ColumnKind::Int64 => "int64",
            ColumnKind::BigInt => "bigint",
            ColumnKind::Float32 => "float32",
            ColumnKind::Float64 => "float64",
            ColumnKind::Decimal => "decimal",
            ColumnKind::Uuid => "uuid",
            ColumnKind::String => "string",
            ColumnKind::Varchar => "varchar",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Datetime => "datetime",
            ColumnKind::DatePart => "date-part",
            ColumnKind::TimePart => "time-part",
            ColumnKind::Json => "json",
            ColumnKind::JsonBinary => "json-binary",
            ColumnKind::Custom(name) => name,
        }
    }

    fn is_integer(&self) -> bool {
        matches!(self, ColumnKind::Int32 | ColumnKind::Int64)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-specific SQL for a default, computed from the engine name.
#[derive(Clone)]
pub struct DefaultExpression(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl DefaultExpression {
    pub fn new(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn render(&self, engine: &str) -> String {
        (self.0)(engine)
    }
}

impl fmt::Debug for DefaultExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultExpression(..)")
    }
}

/// How a column's default is produced.
#[derive(Debug, Clone)]
pub enum DefaultValue {
    /// A constant rendered as a SQL literal.
    Literal(Value),
    /// The engine's current timestamp.
    Now,
    /// A freshly generated UUID.
    Generate,
    Expression(DefaultExpression),
}

/// Column maintenance performed by the engine whenever a row is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnUpdate {
    SetTimestamp,
    Increment,
    Regenerate,
}

impl OnUpdate {
    pub fn as_str(self) -> &'static str {
        match self {
            OnUpdate::SetTimestamp => "set_timestamp",
            OnUpdate::Increment => "increment",
            OnUpdate::Regenerate => "regenerate",
        }
    }
}

/// Extra validation applied to text columns by the inbound converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// Flags and parameters attached to a column.
#[derive(Debug, Clone, Default)]
pub struct ColumnParams {
    /// Assigned by [`define_table`].
    pub name: String,
    /// Assigned by [`define_table`].
    pub table: String,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
    /// Participates in optimistic-concurrency `WHERE` clauses.
    pub update_key: bool,
    pub not_insertable: bool,
    pub not_updatable: bool,
    pub auto_increment: bool,
    pub default: Option<DefaultValue>,
    pub foreign_key: Option<ForeignKey>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub max_length: Option<u32>,
    pub shape: Option<Shape>,
    pub on_update: Option<OnUpdate>,
    pub text_format: Option<TextFormat>,
}

/// A column definition: a kind plus its parameters.
#[derive(Debug, Clone)]
pub struct Column {
    kind: ColumnKind,
    params: ColumnParams,
}

impl Column {
    pub fn new(kind: ColumnKind) -> Self {
        Self {
            kind,
            params: ColumnParams::default(),
        }
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn params(&self) -> &ColumnParams {
        &self.params
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub fn table(&self) -> &str {
        &self.params.table
    }

    pub fn nullable(mut self) -> Self {
        self.params.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.params.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.params.primary_key = true;
        self
    }

    pub fn update_key(mut self) -> Self {
        self.params.update_key = true;
        self
    }

    pub fn not_insertable(mut self) -> Self {
        self.params.not_insertable = true;
        self
    }

    pub fn not_updatable(mut self) -> Self {
        self.params.not_updatable = true;
        self
    }

    /// Shorthand for `not_insertable().not_updatable()`.
    pub fn read_only(self) -> Self {
        self.not_insertable().not_updatable()
    }

    pub fn auto_increment(mut self) -> Self {
        self.params.auto_increment = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.params.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_now(mut self) -> Self {
        self.params.default = Some(DefaultValue::Now);
        self
    }

    pub fn default_generate(mut self) -> Self {
        self.params.default = Some(DefaultValue::Generate);
        self
    }

    pub fn default_expression(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.params.default = Some(DefaultValue::Expression(DefaultExpression::new(f)));
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.params.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.params.scale = Some(scale);
        self
    }

    pub fn max_length(mut self, max_length: u32) -> Self {
        self.params.max_length = Some(max_length);
        self
    }

    pub fn shape(mut self, shape: Shape) -> Self {
        self.params.shape = Some(shape);
        self
    }

    pub fn on_update(mut self, on_update: OnUpdate) -> Self {
        self.params.on_update = Some(on_update);
        self
    }

    pub fn text_format(mut self, format: TextFormat) -> Self {
        self.params.text_format = Some(format);
        self
    }

    fn conflict(&self, reason: impl Into<String>) -> ConfigurationError {
        ConfigurationError::ConflictingFlags {
            table: self.params.table.clone(),
            column: self.params.name.clone(),
            kind: self.kind.clone(),
            reason: reason.into(),
        }
    }

    fn missing(&self, parameter: &'static str) -> ConfigurationError {
        ConfigurationError::MissingParameter {
            table: self.params.table.clone(),
            column: self.params.name.clone(),
            kind: self.kind.clone(),
            parameter,
        }
    }

    /// Apply implied flags, then reject contradictory ones.
    fn validate(&mut self) -> Result<(), ConfigurationError> {
        if self.params.auto_increment && self.params.primary_key {
            self.params.not_insertable = true;
            self.params.not_updatable = true;
        }

        let p = &self.params;
        if p.primary_key && p.nullable {
            return Err(self.conflict("a primary key cannot be nullable"));
        }
        if p.update_key && !(p.not_insertable && p.not_updatable) {
            return Err(self.conflict("an update key must be not-insertable and not-updatable"));
        }
        if p.auto_increment && !self.kind.is_integer() {
            return Err(self.conflict("auto-increment requires an integer kind"));
        }
        if p.auto_increment && p.default.is_some() {
            return Err(self.conflict("auto-increment columns cannot declare a default"));
        }

        match self.kind {
            ColumnKind::Decimal => {
                let precision = p.precision.ok_or_else(|| self.missing("precision"))?;
                let scale = p.scale.ok_or_else(|| self.missing("scale"))?;
                if precision == 0 || scale > precision {
                    return Err(self.conflict(format!(
                        "decimal({precision}, {scale}) needs 0 <= scale <= precision and precision > 0"
                    )));
                }
            }
            ColumnKind::Varchar => {
                if p.max_length.ok_or_else(|| self.missing("max-length"))? == 0 {
                    return Err(self.conflict("max-length must be positive"));
                }
            }
            _ => {}
        }

        match (p.on_update, &self.kind) {
            (None, _)
            | (Some(OnUpdate::SetTimestamp), ColumnKind::Datetime)
            | (Some(OnUpdate::Increment), ColumnKind::Int32 | ColumnKind::Int64)
            | (Some(OnUpdate::Regenerate), ColumnKind::Uuid) => Ok(()),
            (Some(on_update), _) => Err(self.conflict(format!(
                "on-update {} does not apply to this kind",
                on_update.as_str()
            ))),
        }
    }
}

pub fn int32() -> Column {
    Column::new(ColumnKind::Int32)
}

pub fn int64() -> Column {
    Column::new(ColumnKind::Int64)
}

/// Arbitrary-precision integer (held as `i128` in memory).
pub fn bigint() -> Column {
    Column::new(ColumnKind::BigInt)
}

pub fn float32() -> Column {
    Column::new(ColumnKind::Float32)
}

pub fn float64() -> Column {
    Column::new(ColumnKind::Float64)
}

pub fn decimal(precision: u32, scale: u32) -> Column {
    Column::new(ColumnKind::Decimal)
        .precision(precision)
        .scale(scale)
}

pub fn uuid() -> Column {
    Column::new(ColumnKind::Uuid)
}

pub fn string() -> Column {
    Column::new(ColumnKind::String)
}

pub fn varchar(max_length: u32) -> Column {
    Column::new(ColumnKind::Varchar).max_length(max_length)
}

pub fn boolean() -> Column {
    Column::new(ColumnKind::Boolean)
}

pub fn datetime() -> Column {
    Column::new(ColumnKind::Datetime)
}

pub fn date_part() -> Column {
    Column::new(ColumnKind::DatePart)
}

pub fn time_part() -> Column {
    Column::new(ColumnKind::TimePart)
}

pub fn json() -> Column {
    Column::new(ColumnKind::Json)
}

pub fn json_binary() -> Column {
    Column::new(ColumnKind::JsonBinary)
}

pub fn custom(kind: impl Into<Cow<'static, str>>) -> Column {
    Column::new(ColumnKind::custom(kind))
}

/// Auto-incrementing 64-bit primary key.
pub fn pk_auto_increment() -> Column {
    int64().primary_key().auto_increment().read_only()
}

/// Optimistic-concurrency counter, starting at 1 and bumped on every update.
pub fn row_version() -> Column {
    int64()
        .update_key()
        .read_only()
        .default_value(1i64)
        .on_update(OnUpdate::Increment)
}

/// Optimistic-concurrency token, a random UUID replaced on every update.
pub fn concurrency_stamp() -> Column {
    uuid()
        .update_key()
        .read_only()
        .default_generate()
        .on_update(OnUpdate::Regenerate)
}

pub fn created_at() -> Column {
    datetime().read_only().default_now()
}

pub fn updated_at() -> Column {
    datetime()
        .read_only()
        .default_now()
        .on_update(OnUpdate::SetTimestamp)
}

/// Email address: `varchar(320)` checked for `local@domain` on write.
pub fn email() -> Column {
    varchar(320).text_format(TextFormat::Email)
}

/// A column referencing `target.column`, copying its kind and value shape.
///
/// Fails if the referenced column does not exist.
pub fn foreign_key(target: &Table, column: &str) -> Result<Column, ConfigurationError> {
    let referenced = target
        .column(column)
        .ok_or_else(|| ConfigurationError::UnknownColumn {
            table: target.name().to_string(),
            column: column.to_string(),
        })?;
    let rp = referenced.params();
    let mut col = Column::new(referenced.kind().clone());
    col.params.precision = rp.precision;
    col.params.scale = rp.scale;
    col.params.max_length = rp.max_length;
    col.params.shape = rp.shape.clone();
    col.params.text_format = rp.text_format;
    col.params.foreign_key = Some(ForeignKey {
        table: target.name().to_string(),
        column: column.to_string(),
    });
    Ok(col)
}

/// Tag an existing column as referencing `table.column` without looking the
/// target up.
///
/// This is the escape hatch for self-referencing tables, where the target is
/// not defined yet. The reference is checked later, when the whole table set
/// is assembled (see [`validate_foreign_keys`]).
pub fn foreign_key_untyped(
    mut column: Column,
    table: impl Into<String>,
    target_column: impl Into<String>,
) -> Column {
    column.params.foreign_key = Some(ForeignKey {
        table: table.into(),
        column: target_column.into(),
    });
    column
}

/// A named, ordered set of columns.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

/// Define a table, injecting names into each column and validating flags.
pub fn define_table<N, I, K>(name: N, columns: I) -> Result<Table, ConfigurationError>
where
    N: Into<String>,
    I: IntoIterator<Item = (K, Column)>,
    K: Into<String>,
{
    let name = name.into();
    let mut seen = HashSet::new();
    let mut defined = Vec::new();

    for (column_name, mut column) in columns {
        let column_name = column_name.into();
        if !seen.insert(column_name.clone()) {
            return Err(ConfigurationError::DuplicateColumn {
                table: name,
                column: column_name,
            });
        }
        column.params.name = column_name;
        column.params.table = name.clone();
        column.validate()?;
        defined.push(column);
    }

    let table = Table {
        name,
        columns: defined,
    };
    table.validate_self_references()?;
    Ok(table)
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.params.primary_key)
    }

    /// Columns a caller may supply on insert.
    pub fn insert_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.params.not_insertable)
    }

    /// Columns whose current value must appear in an update's `WHERE` clause.
    pub fn update_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.params.update_key)
    }

    /// Columns a caller may change on update.
    pub fn patch_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.params.not_updatable)
    }

    fn validate_self_references(&self) -> Result<(), ConfigurationError> {
        for column in &self.columns {
            if let Some(fk) = &column.params.foreign_key {
                if fk.table == self.name {
                    check_reference(column, fk, self)?;
                }
            }
        }
        Ok(())
    }
}

fn check_reference(
    column: &Column,
    fk: &ForeignKey,
    target: &Table,
) -> Result<(), ConfigurationError> {
    let referenced =
        target
            .column(&fk.column)
            .ok_or_else(|| ConfigurationError::UnknownForeignKeyTarget {
                table: column.table().to_string(),
                column: column.name().to_string(),
                target_table: fk.table.clone(),
                target_column: fk.column.clone(),
            })?;
    if referenced.kind() != column.kind() {
        return Err(ConfigurationError::ForeignKeyKindMismatch {
            table: column.table().to_string(),
            column: column.name().to_string(),
            kind: column.kind().clone(),
            target_table: fk.table.clone(),
            target_column: fk.column.clone(),
            target_kind: referenced.kind().clone(),
        });
    }
    Ok(())
}

/// Check table-name uniqueness and every foreign key against the full set.
pub fn validate_foreign_keys(tables: &[Table]) -> Result<(), ConfigurationError> {
    let mut names = HashSet::new();
    for table in tables {
        if !names.insert(table.name()) {
            return Err(ConfigurationError::DuplicateTable {
                table: table.name().to_string(),
            });
        }
    }

    for table in tables {
        for column in table.columns() {
            let Some(fk) = &column.params.foreign_key else {
                continue;
            };
            let target = tables.iter().find(|t| t.name() == fk.table).ok_or_else(|| {
                ConfigurationError::UnknownForeignKeyTarget {
                    table: table.name().to_string(),
                    column: column.name().to_string(),
                    target_table: fk.table.clone(),
                    target_column: fk.column.clone(),
                }
            })?;
            check_reference(column, fk, target)?;
        }
    }
    Ok(())
}
