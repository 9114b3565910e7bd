//! PostgreSQL pool: DDL execution and row helpers.

const DEFAULT_MAX_CONNECTIONS: u32 = 16;

use std::ops::Deref;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use tablecraft::query::{self, Prepared};
use tablecraft::{
    ConnectionConfig, Row, Session, SessionConnection, StatementExecutor, StorageError,
    TransformHook,
};
use tracing::debug;

use crate::bind::{PgParams, bind_all, extract_row};

fn engine_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Engine(e.to_string())
}

/// Wrapper around sqlx::PgPool that implements StatementExecutor.
#[derive(Clone, Debug)]
pub struct PgPool(sqlx::PgPool);

impl PgPool {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self(pool)
    }

    /// Connect to a PostgreSQL database.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(url)
            .await
            .map_err(engine_error)?;
        Ok(Self(pool))
    }

    pub fn inner(&self) -> &sqlx::PgPool {
        &self.0
    }
}

impl Deref for PgPool {
    type Target = sqlx::PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl StatementExecutor for PgPool {
    type Error = sqlx::Error;

    async fn execute(&self, sql: &str) -> Result<u64, Self::Error> {
        // Function bodies contain `;`, so statements go through the simple protocol.
        let result = sqlx::raw_sql(sql).execute(&self.0).await?;
        Ok(result.rows_affected())
    }
}

/// A pool bound to a session: rows go through the session's transforms on
/// the way in and out.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
    session: Session,
}

impl PgStore {
    pub fn new(pool: PgPool, session: Session) -> Self {
        Self { pool, session }
    }

    pub fn pool(&self) -> &PgPool {
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

    fn read_row(&self, table: &str, row: &sqlx::postgres::PgRow) -> Result<Row, StorageError> {
        let stored = extract_row(row)?;
        Ok(self.session.transforms().rewrite_row(table, stored)?)
    }

    /// Insert one row; returns the number of rows affected.
    pub async fn insert(&self, table: &str, row: Row) -> Result<u64, StorageError> {
        let prepared = query::prepare_insert(&self.session, &PgParams, table, row, false)?;
        self.run(prepared).await
    }

    /// Insert one row and read it back, engine defaults included.
    pub async fn insert_returning(&self, table: &str, row: Row) -> Result<Row, StorageError> {
        let prepared = query::prepare_insert(&self.session, &PgParams, table, row, true)?;
        debug!(sql = %prepared.sql, "executing");
        let args = bind_all(&prepared.params)?;
        let stored = sqlx::query_with(&prepared.sql, args)
            .fetch_one(&self.pool.0)
            .await
            .map_err(engine_error)?;
        self.read_row(table, &stored)
    }

    /// Update the rows matching every value in `keys`.
    pub async fn update(&self, table: &str, set: Row, keys: Row) -> Result<u64, StorageError> {
        let prepared = query::prepare_update(&self.session, &PgParams, table, set, keys)?;
        self.run(prepared).await
    }

    pub async fn select_all(&self, table: &str) -> Result<Vec<Row>, StorageError> {
        let sql = query::prepare_select(&self.session, &PgParams, table)?;
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.0)
            .await
            .map_err(engine_error)?;
        rows.iter().map(|row| self.read_row(table, row)).collect()
    }
}

#[async_trait]
impl SessionConnection for PgStore {
    async fn connect(
        config: impl Into<ConnectionConfig> + Send,
        session: Session,
    ) -> Result<Self, StorageError> {
        match config.into() {
            ConnectionConfig::Url(url) => Ok(Self::new(PgPool::connect(&url).await?, session)),
        }
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(self.session.create_tables(&self.pool).await?)
    }
}
