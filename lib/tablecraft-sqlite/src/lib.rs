//! SQLite driver for tablecraft.
//!
//! SQLite stores most kinds as canonical text. The [`driver`] pairs each text
//! column with an encoder and a parser, so callers read back the same values
//! they wrote. On-update policies become `after update` triggers.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod bind;
mod driver;
mod executor;
mod triggers;

pub use bind::SqliteParams;
pub use driver::{ENGINE, NOW_EXPRESSION, UUID_EXPRESSION, driver};
pub use executor::{SqlitePool, SqliteStore};

pub use tablecraft::{
    CompiledSchema, ConnectionConfig, Driver, Row, Session, SessionConfig, SessionConnection,
    StatementExecutor, StorageError, Value,
};
