use thiserror::Error;

use crate::schema::ColumnKind;

/// A mistake in the table definitions or in the driver wiring.
///
/// Always fatal: detected while defining tables, assembling a session or
/// compiling DDL, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{engine}: no resolver for column kind {kind} ({table}.{column})")]
    UnknownColumnKind {
        engine: String,
        table: String,
        column: String,
        kind: ColumnKind,
    },

    #[error("{table}.{column} ({kind}): conflicting flags: {reason}")]
    ConflictingFlags {
        table: String,
        column: String,
        kind: ColumnKind,
        reason: String,
    },

    #[error("{table}.{column} ({kind}): missing parameter `{parameter}`")]
    MissingParameter {
        table: String,
        column: String,
        kind: ColumnKind,
        parameter: &'static str,
    },

    #[error("{table}.{column}: column defined more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("{table}.{column}: no such column")]
    UnknownColumn { table: String, column: String },

    #[error("{table}: table defined more than once")]
    DuplicateTable { table: String },

    #[error("{table}.{column}: foreign key target {target_table}.{target_column} does not exist")]
    UnknownForeignKeyTarget {
        table: String,
        column: String,
        target_table: String,
        target_column: String,
    },

    #[error(
        "{table}.{column} ({kind}): foreign key target {target_table}.{target_column} has kind {target_kind}"
    )]
    ForeignKeyKindMismatch {
        table: String,
        column: String,
        kind: ColumnKind,
        target_table: String,
        target_column: String,
        target_kind: ColumnKind,
    },

    #[error("{engine}: {table}.{column} ({kind}) is not supported: {reason}")]
    Unsupported {
        engine: String,
        table: String,
        column: String,
        kind: ColumnKind,
        reason: String,
    },
}

/// Which write path a value was headed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    Insert,
    Update,
}

impl std::fmt::Display for WriteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteKind::Insert => f.write_str("insert"),
            WriteKind::Update => f.write_str("update"),
        }
    }
}

/// Why a single value could not be converted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionIssue {
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("malformed: {0}")]
    Malformed(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("null is not allowed")]
    NullNotAllowed,

    #[error("column cannot be written on {0}")]
    NotWritable(WriteKind),

    #[error("unknown column")]
    UnknownColumn,

    #[error("key column missing from the update filter")]
    MissingUpdateKey,

    #[error("update sets no columns")]
    EmptyUpdate,

    #[error("unknown table")]
    UnknownTable,
}

/// A value outside its column's domain, with enough context to find the column.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{table}.{column} ({kind}): {issue}")]
pub struct ConversionError {
    pub table: String,
    pub column: String,
    pub kind: String,
    pub issue: ConversionIssue,
}

impl ConversionError {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        kind: impl Into<String>,
        issue: ConversionIssue,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            kind: kind.into(),
            issue,
        }
    }
}

/// The storage engine rejected a DDL statement.
///
/// The engine error is kept as-is; only the artifact and the statement's
/// position in its execution order are added.
#[derive(Error, Debug)]
#[error("{artifact}: statement #{statement} failed: {source}")]
pub struct ExecutionError<E>
where
    E: std::error::Error + 'static,
{
    pub artifact: String,
    pub statement: usize,
    pub sql: String,
    #[source]
    pub source: E,
}

/// Umbrella error for query-layer calls made through a backend pool.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A DDL statement failed while creating tables; the engine error is the source.
    #[error("{artifact}: statement #{statement} failed: {source}")]
    Execution {
        artifact: String,
        statement: usize,
        sql: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Storage error: {0}")]
    Engine(String),
}

impl<E> From<ExecutionError<E>> for StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: ExecutionError<E>) -> Self {
        StorageError::Execution {
            artifact: e.artifact,
            statement: e.statement,
            sql: e.sql,
            source: Box::new(e.source),
        }
    }
}
