//! SQLite pool: DDL execution and row helpers.

const DEFAULT_MAX_CONNECTIONS: u32 = 4;

use std::ops::Deref;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use tablecraft::query::{self, Prepared};
use tablecraft::{
    ConnectionConfig, Row, Session, SessionConnection, StatementExecutor, StorageError,
    TransformHook,
};
use tracing::debug;

use crate::bind::{SqliteParams, bind_all, extract_row};

fn engine_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Engine(e.to_string())
}

/// Wrapper around sqlx::SqlitePool that implements StatementExecutor.
#[derive(Clone, Debug)]
pub struct SqlitePool(sqlx::SqlitePool);

impl SqlitePool {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self(pool)
    }

    /// Connect to a SQLite database.
    ///
    /// In-memory databases are private to a connection, so those get a pool
    /// of one.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let max_connections = if url.contains(":memory:") || url.contains("mode=memory") {
            1
        } else {
            DEFAULT_MAX_CONNECTIONS
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(engine_error)?;
        Ok(Self(pool))
    }

    pub fn inner(&self) -> &sqlx::SqlitePool {
        &self.0
    }
}

impl Deref for SqlitePool {
    type Target = sqlx::SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl StatementExecutor for SqlitePool {
    type Error = sqlx::Error;

    async fn execute(&self, sql: &str) -> Result<u64, Self::Error> {
        let result = sqlx::raw_sql(sql).execute(&self.0).await?;
        Ok(result.rows_affected())
    }
}

/// A pool bound to a session.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    session: Session,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, session: Session) -> Self {
        Self { pool, session }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn run(&self, prepared: Prepared) -> Result<u64, StorageError> {
        debug!(sql = %prepared.sql, params = prepared.params.len(), "executing");
        let args = bind_all(&prepared.params)?;
        let result = sqlx::query_with(&prepared.sql, args)
            .execute(&self.pool.0)
            .await
            .map_err(engine_error)?;
        Ok(result.rows_affected())
    }

    fn read_row(&self, table: &str, row: &SqliteRow) -> Result<Row, StorageError> {
        let stored = extract_row(row)?;
        Ok(self.session.transforms().rewrite_row(table, stored)?)
    }

    pub async fn insert(&self, table: &str, row: Row) -> Result<u64, StorageError> {
        let prepared = query::prepare_insert(&self.session, &SqliteParams, table, row, false)?;
        self.run(prepared).await
    }

    /// Insert one row and read it back with engine defaults filled in.
    pub async fn insert_returning(&self, table: &str, row: Row) -> Result<Row, StorageError> {
        let prepared = query::prepare_insert(&self.session, &SqliteParams, table, row, true)?;
        debug!(sql = %prepared.sql, "executing");
        let args = bind_all(&prepared.params)?;
        let stored = sqlx::query_with(&prepared.sql, args)
            .fetch_one(&self.pool.0)
            .await
            .map_err(engine_error)?;
        self.read_row(table, &stored)
    }

    pub async fn update(&self, table: &str, set: Row, keys: Row) -> Result<u64, StorageError> {
        let prepared = query::prepare_update(&self.session, &SqliteParams, table, set, keys)?;
        self.run(prepared).await
    }

    pub async fn select_all(&self, table: &str) -> Result<Vec<Row>, StorageError> {
        let sql = query::prepare_select(&self.session, &SqliteParams, table)?;
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.0)
            .await
            .map_err(engine_error)?;
        rows.iter().map(|row| self.read_row(table, row)).collect()
    }
}

#[async_trait]
impl SessionConnection for SqliteStore {
    async fn connect(
        config: impl Into<ConnectionConfig> + Send,
        session: Session,
    ) -> Result<Self, StorageError> {
        match config.into() {
            ConnectionConfig::Url(url) => Ok(Self::new(SqlitePool::connect(&url).await?, session)),
        }
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(self.session.create_tables(&self.pool).await?)
    }
}
