//! Session assembly and backend connection traits.
//!
//! - `SessionConfig`: the tables and the driver, given once
//! - `Session`: validated tables with their compiled DDL and transform map
//! - `SessionConnection`: connecting a backend pool and creating the tables

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::ddl::{CompiledSchema, compile};
use crate::executor::StatementExecutor;
use crate::registry::Driver;
use crate::schema::Table;
use crate::transform::TransformMap;
use crate::{ConfigurationError, ExecutionError, StorageError};

/// Connection configuration for database backends.
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    /// Connect using a database URL string.
    Url(String),
}

impl From<&str> for ConnectionConfig {
    fn from(url: &str) -> Self {
        ConnectionConfig::Url(url.to_string())
    }
}

impl From<String> for ConnectionConfig {
    fn from(url: String) -> Self {
        ConnectionConfig::Url(url)
    }
}

impl From<&String> for ConnectionConfig {
    fn from(url: &String) -> Self {
        ConnectionConfig::Url(url.clone())
    }
}

/// Everything a session is assembled from.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tables: Vec<Table>,
    pub driver: Driver,
}

/// A validated table set bound to one driver.
///
/// Holds the compiled DDL and the transform map for the lifetime of the
/// session; both are immutable and cheap to share.
#[derive(Debug, Clone)]
pub struct Session {
    tables: Arc<[Table]>,
    driver: Driver,
    schema: Arc<CompiledSchema>,
    transforms: Arc<TransformMap>,
}

impl Session {
    /// Validate the configuration eagerly and build the DDL and transforms.
    ///
    /// Fails on dangling foreign keys (including self-references declared
    /// untyped), duplicate table names and kinds the driver cannot resolve.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigurationError> {
        let SessionConfig { tables, driver } = config;
        let schema = compile(&tables, &driver)?;
        let transforms = TransformMap::build(&tables, &driver)?;
        info!(engine = driver.engine(), tables = tables.len(), "session assembled");
        Ok(Self {
            tables: tables.into(),
            driver,
            schema: Arc::new(schema),
            transforms: Arc::new(transforms),
        })
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    pub fn transforms(&self) -> &Arc<TransformMap> {
        &self.transforms
    }

    /// Run the compiled DDL through `executor`.
    pub async fn create_tables<E>(&self, executor: &E) -> Result<(), ExecutionError<E::Error>>
    where
        E: StatementExecutor + ?Sized,
    {
        self.schema.execute(executor).await
    }
}

/// A backend pool bound to a session.
#[async_trait]
pub trait SessionConnection: Sized + Send + Sync {
    /// Connect to the database using the provided configuration.
    async fn connect(
        config: impl Into<ConnectionConfig> + Send,
        session: Session,
    ) -> Result<Self, StorageError>;

    /// Create the session's tables.
    async fn initialize(&self) -> Result<(), StorageError>;
}
