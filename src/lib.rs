//! Database admin MCP server library.
//!
//! Exposes a fixed catalog of administration operations for every
//! configured PostgreSQL or SQLite instance as MCP tools named
//! `<prefix>_<operation>`, each call passing through argument validation,
//! per-instance policy and bounded execution.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::DbService;
pub use tools::Dispatcher;
