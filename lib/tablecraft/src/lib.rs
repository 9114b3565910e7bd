//! Tablecraft - dialect-independent table definitions, compiled per engine.
//!
//! This crate describes tables once and turns that description into the DDL
//! and the value conversions a specific storage engine needs.
//!
//! # Core Concepts
//!
//! - **Column kind**: the logical type of a column (`int64`, `decimal`, `json`,
//!   ...). Helpers such as [`schema::row_version`] preconfigure a kind with a
//!   fixed flag set.
//! - **Driver**: per-engine mapping from column kind to physical type, DDL
//!   hooks and a `to`/`from` converter pair.
//! - **DDL artifact**: the ordered statements (prepend, create, append) for one
//!   table.
//! - **Transform map**: per-table, per-column converters applied at the query
//!   boundary.
//!
//! # Entry points
//!
//! - [`define_table`]: validate and freeze a table definition
//! - [`compile`]: tables plus a [`Driver`] into a [`CompiledSchema`]
//! - [`TransformMap::build`]: tables plus a driver into converters
//! - [`Session`]: both of the above from one [`SessionConfig`]

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

// Lets `#[derive(TableRow)]` expand to `::tablecraft::...` inside this crate.
extern crate self as tablecraft;

pub mod convert;
pub mod ddl;
mod error;
mod executor;
pub mod json;
pub mod query;
mod registry;
mod row;
pub mod schema;
mod session;
mod shape;
pub mod time;
mod transform;
mod value;

pub use convert::Converter;
pub use ddl::{ColumnDefinition, CompiledSchema, CreateTable, DdlArtifact, compile, quote_ident};
pub use error::{
    ConfigurationError, ConversionError, ConversionIssue, ExecutionError, StorageError, WriteKind,
};
pub use executor::StatementExecutor;
pub use registry::{ColumnPhysical, Driver, Resolver};
pub use row::TableRow;
pub use schema::{
    Column, ColumnKind, ColumnParams, DefaultValue, ForeignKey, OnUpdate, Table, define_table,
    foreign_key, foreign_key_untyped,
};
pub use session::{ConnectionConfig, Session, SessionConfig, SessionConnection};
pub use shape::{Shape, TopLevel};
pub use transform::{ColumnTransform, TransformHook, TransformMap};
pub use value::{FromValue, Row, Value, quote_literal};

// Re-export derive macro
pub use tablecraft_derive::TableRow;
