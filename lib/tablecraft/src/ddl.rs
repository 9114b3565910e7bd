//! DDL compilation: table definitions plus a driver in, ordered SQL out.
//!
//! Each table compiles to a [`DdlArtifact`] holding the statements that must
//! run before its `create table`, the `create table` itself, and the
//! statements that must run after it. Driver-wide statements produced by the
//! driver's after hook are kept separately on the [`CompiledSchema`].
//!
//! Output is all lowercase and fully deterministic: compiling the same tables
//! with the same driver twice yields identical text.

use tracing::{debug, info};

use crate::executor::StatementExecutor;
use crate::registry::{ColumnPhysical, Driver};
use crate::schema::{Column, DefaultValue, Table, validate_foreign_keys};
use crate::{ConfigurationError, ExecutionError, Value};

/// Name given to the driver-wide statements in execution errors.
pub const AFTER_ARTIFACT: &str = "<after>";

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One column clause of a `create table` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub datatype: String,
    pub default: Option<String>,
    pub not_null: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub checks: Vec<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datatype: datatype.into(),
            default: None,
            not_null: false,
            unique: false,
            primary_key: false,
            autoincrement: false,
            checks: Vec::new(),
        }
    }

    pub fn default_to(mut self, sql: impl Into<String>) -> Self {
        self.default = Some(sql.into());
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    pub fn check(mut self, expression: impl Into<String>) -> Self {
        self.checks.push(expression.into());
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.datatype);
        if let Some(default) = &self.default {
            sql.push_str(" default ");
            sql.push_str(default);
        }
        if self.not_null {
            sql.push_str(" not null");
        }
        if self.unique {
            sql.push_str(" unique");
        }
        if self.primary_key {
            sql.push_str(" primary key");
        }
        if self.autoincrement {
            sql.push_str(" autoincrement");
        }
        for check in &self.checks {
            sql.push_str(" check (");
            sql.push_str(check);
            sql.push(')');
        }
        sql
    }
}

/// A `create table` statement under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable {
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    /// Table-level clauses, rendered after the columns in insertion order.
    pub constraints: Vec<String>,
}

impl CreateTable {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn add_constraint(&mut self, sql: impl Into<String>) {
        self.constraints.push(sql.into());
    }

    pub fn to_sql(&self) -> String {
        let body: Vec<String> = self
            .columns
            .iter()
            .map(ColumnDefinition::to_sql)
            .chain(self.constraints.iter().cloned())
            .collect();
        format!(
            "create table {} ({})",
            quote_ident(&self.table),
            body.join(", ")
        )
    }
}

/// Compiled statements for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlArtifact {
    pub table: String,
    pub prepend: Vec<String>,
    pub create: CreateTable,
    pub append: Vec<String>,
}

impl DdlArtifact {
    /// Statements in execution order: prepend, create, append.
    pub fn statements(&self) -> Vec<String> {
        let mut statements = self.prepend.clone();
        statements.push(self.create.to_sql());
        statements.extend(self.append.iter().cloned());
        statements
    }

    /// Run the statements one at a time, stopping at the first failure.
    ///
    /// Nothing already executed is rolled back; wrap the call in a
    /// transaction if that matters.
    pub async fn execute<E>(&self, executor: &E) -> Result<(), ExecutionError<E::Error>>
    where
        E: StatementExecutor + ?Sized,
    {
        run_statements(&self.table, &self.statements(), executor).await
    }
}

/// The DDL for a whole table set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSchema {
    pub engine: String,
    /// One artifact per table, in declaration order.
    pub artifacts: Vec<DdlArtifact>,
    /// Cross-table statements from the driver's after hook.
    pub after: Vec<String>,
}

impl CompiledSchema {
    pub fn artifact(&self, table: &str) -> Option<&DdlArtifact> {
        self.artifacts.iter().find(|a| a.table == table)
    }

    /// Every statement, artifacts first, then the after statements.
    pub fn statements(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .flat_map(DdlArtifact::statements)
            .chain(self.after.iter().cloned())
            .collect()
    }

    pub async fn execute<E>(&self, executor: &E) -> Result<(), ExecutionError<E::Error>>
    where
        E: StatementExecutor + ?Sized,
    {
        for artifact in &self.artifacts {
            artifact.execute(executor).await?;
        }
        run_statements(AFTER_ARTIFACT, &self.after, executor).await
    }
}

async fn run_statements<E>(
    artifact: &str,
    statements: &[String],
    executor: &E,
) -> Result<(), ExecutionError<E::Error>>
where
    E: StatementExecutor + ?Sized,
{
    for (index, sql) in statements.iter().enumerate() {
        info!(artifact, statement = index, "executing ddl");
        executor
            .execute(sql)
            .await
            .map_err(|source| ExecutionError {
                artifact: artifact.to_string(),
                statement: index,
                sql: sql.clone(),
                source,
            })?;
    }
    Ok(())
}

/// Compile every table for `driver`.
///
/// Fails without producing any DDL if a foreign key dangles or any column's
/// kind has no resolver.
pub fn compile(tables: &[Table], driver: &Driver) -> Result<CompiledSchema, ConfigurationError> {
    validate_foreign_keys(tables)?;
    let artifacts = tables
        .iter()
        .map(|table| compile_table(table, driver))
        .collect::<Result<Vec<_>, _>>()?;
    let after = driver.after_statements(tables);
    debug!(
        engine = driver.engine(),
        tables = artifacts.len(),
        after = after.len(),
        "compiled schema"
    );
    Ok(CompiledSchema {
        engine: driver.engine().to_string(),
        artifacts,
        after,
    })
}

fn compile_table(table: &Table, driver: &Driver) -> Result<DdlArtifact, ConfigurationError> {
    let mut create = CreateTable::new(table.name());
    let mut prepend = Vec::new();
    let mut append = Vec::new();

    for column in table.columns() {
        let physical = driver.resolve(column)?;
        let p = column.params();

        let mut definition = ColumnDefinition::new(column.name(), physical.datatype.clone());
        definition.not_null = !p.nullable;
        definition.unique = p.unique;
        definition.primary_key = p.primary_key;
        definition.default = render_default(driver, column, &physical)?;
        if let Some(hook) = &physical.column_hook {
            definition = hook(definition);
        }
        create.columns.push(definition);

        if let Some(fk) = &p.foreign_key {
            create.add_constraint(format!(
                "constraint {} foreign key ({}) references {} ({})",
                quote_ident(&format!(
                    "FOREIGN_KEY_{}_{}_TO_{}_{}",
                    table.name(),
                    column.name(),
                    fk.table,
                    fk.column
                )),
                quote_ident(column.name()),
                quote_ident(&fk.table),
                quote_ident(&fk.column),
            ));
        }
        if let Some(hook) = &physical.table_hook {
            hook(&mut create);
        }

        prepend.extend(physical.prepend);
        append.extend(physical.append);
    }

    debug!(
        table = table.name(),
        columns = create.columns.len(),
        prepend = prepend.len(),
        append = append.len(),
        "compiled table"
    );
    Ok(DdlArtifact {
        table: table.name().to_string(),
        prepend,
        create,
        append,
    })
}

/// The `default` clause for a column, if it declares one.
///
/// The driver's default hook gets the first look. Literals otherwise go
/// through the column's `to` converter so they are stored exactly as a
/// written value would be.
fn render_default(
    driver: &Driver,
    column: &Column,
    physical: &ColumnPhysical,
) -> Result<Option<String>, ConfigurationError> {
    let Some(default) = &column.params().default else {
        return Ok(None);
    };
    if let Some(sql) = driver.translate_default(column, default) {
        return Ok(Some(sql));
    }
    match default {
        DefaultValue::Literal(Value::Null) => Ok(Some(Value::Null.to_sql_literal())),
        DefaultValue::Literal(value) => {
            let stored = physical.to.apply(value.clone()).map_err(|issue| {
                ConfigurationError::ConflictingFlags {
                    table: column.table().to_string(),
                    column: column.name().to_string(),
                    kind: column.kind().clone(),
                    reason: format!("default value is outside the column's domain: {issue}"),
                }
            })?;
            Ok(Some(stored.to_sql_literal()))
        }
        DefaultValue::Expression(expression) => Ok(Some(expression.render(driver.engine()))),
        DefaultValue::Now | DefaultValue::Generate => Err(ConfigurationError::Unsupported {
            engine: driver.engine().to_string(),
            table: column.table().to_string(),
            column: column.name().to_string(),
            kind: column.kind().clone(),
            reason: "driver has no translation for this default policy".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::schema::{self, ColumnKind, define_table, foreign_key};

    fn driver() -> Driver {
        Driver::new("test")
            .with_resolver(ColumnKind::Int64, |c: &Column| {
                let mut physical = ColumnPhysical::new("integer", c);
                if c.params().auto_increment {
                    let seq = format!("{}_{}_seq", c.table(), c.name());
                    physical = physical
                        .with_prepend(format!("create sequence {}", quote_ident(&seq)))
                        .with_column_hook(move |def| def.default_to(format!("nextval('{seq}')")));
                }
                Ok(physical)
            })
            .with_resolver(ColumnKind::String, |c: &Column| Ok(ColumnPhysical::new("text", c)))
            .with_resolver(ColumnKind::Datetime, |c: &Column| {
                Ok(ColumnPhysical::new("timestamp", c))
            })
            .with_default_hook(|_, default| match default {
                DefaultValue::Now => Some("current_timestamp".into()),
                _ => None,
            })
    }

    fn person() -> Table {
        define_table(
            "person",
            [
                ("id", schema::pk_auto_increment()),
                ("name", schema::string().unique()),
                ("nickname", schema::string().nullable().default_value("it's me")),
                ("created_at", schema::created_at()),
            ],
        )
        .unwrap()
    }

    #[derive(Debug, thiserror::Error)]
    #[error("rejected: {0}")]
    struct Rejected(String);

    #[derive(Default)]
    struct Recorder {
        executed: Mutex<Vec<String>>,
        reject_containing: Option<&'static str>,
    }

    #[async_trait]
    impl StatementExecutor for Recorder {
        type Error = Rejected;

        async fn execute(&self, sql: &str) -> Result<u64, Rejected> {
            if self.reject_containing.is_some_and(|needle| sql.contains(needle)) {
                return Err(Rejected(sql.to_string()));
            }
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(0)
        }
    }

    #[test]
    fn test_create_table_text() {
        let schema = compile(&[person()], &driver()).unwrap();
        let artifact = schema.artifact("person").unwrap();
        assert_eq!(
            artifact.create.to_sql(),
            "create table \"person\" (\
             \"id\" integer default nextval('person_id_seq') not null primary key, \
             \"name\" text not null unique, \
             \"nickname\" text default 'it''s me', \
             \"created_at\" timestamp default current_timestamp not null)"
        );
        assert_eq!(artifact.prepend, vec!["create sequence \"person_id_seq\""]);
    }

    #[test]
    fn test_sequence_precedes_create_table() {
        let schema = compile(&[person()], &driver()).unwrap();
        let statements = schema.artifact("person").unwrap().statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("create sequence"));
        assert!(statements[1].starts_with("create table"));
    }

    #[test]
    fn test_foreign_key_constraint_on_owning_table() {
        let person = person();
        let pet = define_table(
            "pet",
            [
                ("name", schema::string()),
                ("owner_id", foreign_key(&person, "id").unwrap()),
            ],
        )
        .unwrap();
        let schema = compile(&[person, pet], &driver()).unwrap();
        assert!(
            schema
                .artifact("person")
                .unwrap()
                .create
                .constraints
                .is_empty()
        );
        assert_eq!(
            schema.artifact("pet").unwrap().create.to_sql(),
            "create table \"pet\" (\"name\" text not null, \"owner_id\" integer not null, \
             constraint \"FOREIGN_KEY_pet_owner_id_TO_person_id\" foreign key (\"owner_id\") \
             references \"person\" (\"id\"))"
        );
    }

    #[test]
    fn test_unknown_kind_produces_nothing() {
        let ok = person();
        let bad = define_table("flags", [("on", schema::boolean())]).unwrap();
        let err = compile(&[ok, bad], &driver()).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownColumnKind { ref table, .. } if table == "flags"));
    }

    #[test]
    fn test_generate_without_translation_is_unsupported() {
        let table = define_table("t", [("token", schema::string().default_generate())]).unwrap();
        assert!(matches!(
            compile(&[table], &driver()),
            Err(ConfigurationError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let first = compile(&[person()], &driver()).unwrap();
        let second = compile(&[person()], &driver()).unwrap();
        assert_eq!(first.statements(), second.statements());
    }

    #[test]
    fn test_after_hook_runs_once_for_the_batch() {
        let driver = driver().with_after_hook(|tables| {
            vec![format!("-- {} tables", tables.len())]
        });
        let other = define_table("other", [("x", schema::string())]).unwrap();
        let schema = compile(&[person(), other], &driver).unwrap();
        assert_eq!(schema.after, vec!["-- 2 tables"]);
    }

    #[tokio::test]
    async fn test_execute_runs_in_order() {
        let schema = compile(&[person()], &driver()).unwrap();
        let recorder = Recorder::default();
        schema.execute(&recorder).await.unwrap();
        assert_eq!(*recorder.executed.lock().unwrap(), schema.statements());
    }

    #[tokio::test]
    async fn test_execute_stops_at_first_failure() {
        let schema = compile(&[person()], &driver()).unwrap();
        let recorder = Recorder {
            reject_containing: Some("create table"),
            ..Default::default()
        };
        let err = schema.execute(&recorder).await.unwrap_err();
        assert_eq!(err.artifact, "person");
        assert_eq!(err.statement, 1);
        assert!(err.sql.starts_with("create table"));
        assert_eq!(recorder.executed.lock().unwrap().len(), 1);
    }
}
