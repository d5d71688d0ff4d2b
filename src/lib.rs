//! Schema-driven CRUD over an arbitrary SQLite database.
//!
//! # Intention
//!
//! - Let a caller name any table at request time and insert, read, update
//!   or delete its rows without compiled-in knowledge of its columns.
//! - Keep dynamic SQL safe: identifiers are checked against the live
//!   catalog, values are always bound parameters.
//!
//! # Architectural Boundaries
//!
//! - [`sqlite`] owns every statement the store sees, plus the per-table
//!   rules consulted before writes.
//! - [`report`] holds the one fixed join query.
//! - [`http_server`] maps routes onto engine calls and nothing more.

pub mod config;
pub mod http_server;
pub mod report;
pub mod sqlite;

pub use config::AppConfig;
pub use sqlite::{
    ConnectionProvider, CrudError, CrudResult, Filter, Record, RecordEngine, ResultSet,
    RuleRegistry, SqliteConfig, Value,
};
