//! Database access layer.
//!
//! - `connection`: driver connections behind the `DbConnection` trait
//! - `registry`: per-instance connection cache
//! - `sql`: statement planning per dialect
//! - `executor`: bounded, cancellable statement execution
//! - `params` / `types`: parameter binding and row decoding

pub mod connection;
pub mod executor;
pub mod params;
pub mod registry;
pub mod sql;
pub mod types;

pub use connection::{Connector, DbConnection, SqlxConnector};
pub use executor::QueryExecutor;
pub use registry::{ConnectionLease, Registry};
pub use sql::{Plan, PlannedStatement, StatementKind};
