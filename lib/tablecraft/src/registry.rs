//! Per-engine driver descriptors: column kind to physical column.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::convert::{Converter, canonical};
use crate::ddl::{ColumnDefinition, CreateTable};
use crate::schema::{Column, ColumnKind, DefaultValue, Table};
use crate::ConfigurationError;

pub type ColumnHook = Arc<dyn Fn(ColumnDefinition) -> ColumnDefinition + Send + Sync>;
pub type TableHook = Arc<dyn Fn(&mut CreateTable) + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&[Table]) -> Vec<String> + Send + Sync>;
pub type DefaultHook = Arc<dyn Fn(&Column, &DefaultValue) -> Option<String> + Send + Sync>;

/// Everything an engine needs to materialize one column.
#[derive(Clone)]
pub struct ColumnPhysical {
    /// Type name or raw SQL type expression.
    pub datatype: String,
    pub column_hook: Option<ColumnHook>,
    pub table_hook: Option<TableHook>,
    /// Statements that must run before `create table`.
    pub prepend: Vec<String>,
    /// Statements that must run after `create table`.
    pub append: Vec<String>,
    pub to: Converter,
    pub from: Converter,
}

impl ColumnPhysical {
    /// A physical column whose converters only normalize to the canonical domain.
    pub fn new(datatype: impl Into<String>, column: &Column) -> Self {
        Self {
            datatype: datatype.into(),
            column_hook: None,
            table_hook: None,
            prepend: Vec::new(),
            append: Vec::new(),
            to: canonical(column),
            from: Converter::identity(),
        }
    }

    pub fn with_column_hook(
        mut self,
        hook: impl Fn(ColumnDefinition) -> ColumnDefinition + Send + Sync + 'static,
    ) -> Self {
        self.column_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_table_hook(mut self, hook: impl Fn(&mut CreateTable) + Send + Sync + 'static) -> Self {
        self.table_hook = Some(Arc::new(hook));
        self
    }

    pub fn with_prepend(mut self, sql: impl Into<String>) -> Self {
        self.prepend.push(sql.into());
        self
    }

    pub fn with_append(mut self, sql: impl Into<String>) -> Self {
        self.append.push(sql.into());
        self
    }

    /// Append an engine encoder after the canonical normalization.
    pub fn encode(mut self, encoder: Converter) -> Self {
        self.to = self.to.then(encoder);
        self
    }

    pub fn decode(mut self, decoder: Converter) -> Self {
        self.from = decoder;
        self
    }
}

impl fmt::Debug for ColumnPhysical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnPhysical")
            .field("datatype", &self.datatype)
            .field("column_hook", &self.column_hook.is_some())
            .field("table_hook", &self.table_hook.is_some())
            .field("prepend", &self.prepend)
            .field("append", &self.append)
            .finish_non_exhaustive()
    }
}

/// Maps one column (kind, parameters, names) to its physical description.
pub trait Resolver: Send + Sync {
    fn resolve(&self, column: &Column) -> Result<ColumnPhysical, ConfigurationError>;
}

impl<F> Resolver for F
where
    F: Fn(&Column) -> Result<ColumnPhysical, ConfigurationError> + Send + Sync,
{
    fn resolve(&self, column: &Column) -> Result<ColumnPhysical, ConfigurationError> {
        self(column)
    }
}

// Keyed by table, column and a rendering of the column's kind and
// parameters, so a changed definition never hits a stale entry.
type ConverterKey = (String, String, String);
type ConverterCache = Mutex<HashMap<ConverterKey, (Converter, Converter)>>;

/// A driver descriptor: engine name, resolvers per kind, and optional hooks.
///
/// Drivers are immutable once shared. Converter pairs resolved through a
/// driver are cached on it and shared by its clones; each `with_*`/`merge`
/// call starts an empty cache, and the cache is freed with the last clone.
#[derive(Clone)]
pub struct Driver {
    engine: String,
    resolvers: HashMap<ColumnKind, Arc<dyn Resolver>>,
    after_hook: Option<AfterHook>,
    default_hook: Option<DefaultHook>,
    converters: Arc<ConverterCache>,
}

impl Driver {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            resolvers: HashMap::new(),
            after_hook: None,
            default_hook: None,
            converters: Arc::default(),
        }
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Register a resolver function, replacing any existing one for `kind`.
    pub fn with_resolver<F>(self, kind: ColumnKind, resolver: F) -> Self
    where
        F: Fn(&Column) -> Result<ColumnPhysical, ConfigurationError> + Send + Sync + 'static,
    {
        self.with_shared_resolver(kind, Arc::new(resolver))
    }

    pub fn with_shared_resolver(mut self, kind: ColumnKind, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.insert(kind, resolver);
        self.converters = Arc::default();
        self
    }

    /// Whole-batch hook run once after every table compiled.
    pub fn with_after_hook(
        mut self,
        hook: impl Fn(&[Table]) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.after_hook = Some(Arc::new(hook));
        self.converters = Arc::default();
        self
    }

    /// Translator for generic default policies (`now`, `generate`).
    ///
    /// Returning `None` leaves the default to the built-in rendering.
    pub fn with_default_hook(
        mut self,
        hook: impl Fn(&Column, &DefaultValue) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.default_hook = Some(Arc::new(hook));
        self.converters = Arc::default();
        self
    }

    /// Layer `overrides` on top of this driver.
    ///
    /// Resolvers and hooks present in `overrides` win; the engine name is kept.
    pub fn merge(mut self, overrides: Driver) -> Self {
        self.resolvers.extend(overrides.resolvers);
        if overrides.after_hook.is_some() {
            self.after_hook = overrides.after_hook;
        }
        if overrides.default_hook.is_some() {
            self.default_hook = overrides.default_hook;
        }
        self.converters = Arc::default();
        self
    }

    /// Resolve a column to its physical description for this engine.
    pub fn resolve(&self, column: &Column) -> Result<ColumnPhysical, ConfigurationError> {
        let resolver = self.resolvers.get(column.kind()).ok_or_else(|| {
            ConfigurationError::UnknownColumnKind {
                engine: self.engine.clone(),
                table: column.table().to_string(),
                column: column.name().to_string(),
                kind: column.kind().clone(),
            }
        })?;
        resolver.resolve(column)
    }

    /// The `to`/`from` pair for `column`, resolved once and then reused.
    ///
    /// The flag is true when the pair came from the cache.
    pub(crate) fn converters(
        &self,
        column: &Column,
    ) -> Result<((Converter, Converter), bool), ConfigurationError> {
        let key = (
            column.table().to_string(),
            column.name().to_string(),
            format!("{:?}/{:?}", column.kind(), column.params()),
        );
        let cached = self
            .converters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
            .cloned();
        if let Some(pair) = cached {
            return Ok((pair, true));
        }
        let physical = self.resolve(column)?;
        let pair = (physical.to, physical.from);
        self.converters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, pair.clone());
        Ok((pair, false))
    }

    #[cfg(test)]
    pub(crate) fn cached_converters(&self) -> usize {
        self.converters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub(crate) fn after_statements(&self, tables: &[Table]) -> Vec<String> {
        self.after_hook
            .as_ref()
            .map(|hook| hook(tables))
            .unwrap_or_default()
    }

    pub(crate) fn translate_default(&self, column: &Column, default: &DefaultValue) -> Option<String> {
        self.default_hook.as_ref().and_then(|hook| hook(column, default))
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.resolvers.keys().map(ColumnKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("Driver")
            .field("engine", &self.engine)
            .field("kinds", &kinds)
            .field("after_hook", &self.after_hook.is_some())
            .field("default_hook", &self.default_hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{self, define_table};
    use crate::Value;

    fn text_driver() -> Driver {
        Driver::new("test")
            .with_resolver(ColumnKind::String, |c: &Column| Ok(ColumnPhysical::new("text", c)))
            .with_resolver(ColumnKind::Int64, |c: &Column| Ok(ColumnPhysical::new("integer", c)))
    }

    #[test]
    fn test_unknown_kind_fails_closed() {
        let table = define_table("t", [("flag", schema::boolean())]).unwrap();
        let err = text_driver().resolve(&table.columns()[0]).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownColumnKind {
                engine: "test".into(),
                table: "t".into(),
                column: "flag".into(),
                kind: ColumnKind::Boolean,
            }
        );
    }

    #[test]
    fn test_merge_is_last_write_wins() {
        let overrides = Driver::new("ignored")
            .with_resolver(ColumnKind::String, |c: &Column| Ok(ColumnPhysical::new("varchar", c)))
            .with_resolver(ColumnKind::custom("money"), |c: &Column| {
                Ok(ColumnPhysical::new("numeric(19, 4)", c))
            });
        let driver = text_driver().merge(overrides);
        assert_eq!(driver.engine(), "test");

        let table = define_table(
            "t",
            [
                ("name", schema::string()),
                ("id", schema::int64()),
                ("price", schema::custom("money")),
            ],
        )
        .unwrap();
        let datatypes: Vec<_> = table
            .columns()
            .iter()
            .map(|c| driver.resolve(c).unwrap().datatype)
            .collect();
        assert_eq!(datatypes, vec!["varchar", "integer", "numeric(19, 4)"]);
    }

    #[test]
    fn test_converter_cache_belongs_to_the_driver() {
        let table = define_table("t", [("name", schema::string()), ("id", schema::int64())]).unwrap();
        let a = text_driver();
        let b = a.clone();
        for column in table.columns() {
            let (_, reused) = a.converters(column).unwrap();
            assert!(!reused);
        }
        assert_eq!(b.cached_converters(), 2);
        let (_, reused) = b.converters(&table.columns()[0]).unwrap();
        assert!(reused);

        // A derived driver may resolve differently, so it starts empty.
        let c = b.with_after_hook(|_| Vec::new());
        assert_eq!(c.cached_converters(), 0);
        assert_eq!(a.cached_converters(), 2);

        // Rebuilding drivers does not accumulate entries anywhere else.
        for _ in 0..3 {
            let fresh = text_driver();
            fresh.converters(&table.columns()[0]).unwrap();
            assert_eq!(fresh.cached_converters(), 1);
        }
    }

    #[test]
    fn test_physical_encode_follows_canonical() {
        let table = define_table("t", [("flag", schema::boolean())]).unwrap();
        let physical = ColumnPhysical::new("integer", &table.columns()[0])
            .encode(Converter::new(crate::convert::bool_to_int));
        assert_eq!(physical.to.apply(Value::Bool(false)), Ok(Value::Int(0)));
    }
}
