//! PostgreSQL driver for tablecraft.
//!
//! Provides the built-in PostgreSQL [`driver`] and a sqlx-backed pool that
//! runs compiled DDL and moves rows through a session's transforms.
//!
//! # Usage
//!
//! ```text
//! use tablecraft::{Session, SessionConfig, SessionConnection, define_table, schema};
//! use tablecraft_postgres::PgStore;
//!
//! let person = define_table("person", [
//!     ("id", schema::pk_auto_increment()),
//!     ("name", schema::string()),
//!     ("updated_at", schema::updated_at()),
//! ])?;
//! let session = Session::new(SessionConfig {
//!     tables: vec![person],
//!     driver: tablecraft_postgres::driver(),
//! })?;
//! let store = PgStore::connect("postgres://localhost/app", session).await?;
//! store.initialize().await?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod bind;
mod driver;
mod executor;
mod triggers;

pub use bind::PgParams;
pub use driver::{ENGINE, driver};
pub use executor::{PgPool, PgStore};

// Re-export core types for convenience
pub use tablecraft::{
    CompiledSchema, ConnectionConfig, Driver, Row, Session, SessionConfig, SessionConnection,
    StatementExecutor, StorageError, Value,
};
