//! Data models for the admin toolkit.
//!
//! This module re-exports all model types used throughout the application.

pub mod instance;
pub mod operation;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use instance::{DatabaseType, InstanceConfig, SchemaScope};
pub use operation::{Operation, OperationClass, OperationRequest, QueryAnalysis};
pub use query::{
    DEFAULT_MAX_ROWS, MAX_ROW_LIMIT, OperationOutput, OperationResult, QueryParam, RowSet,
};
pub use schema::{
    ColumnSpec, DataType, ForeignKeySpec, Ident, IndexMethod, ReferentialAction, TableRef,
};
