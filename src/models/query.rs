//! Query-related data models.
//!
//! This module defines bound parameter values and the shapes rows take on
//! their way from the driver to the formatter.

use crate::error::{DbError, DbResult};
use serde_json::Value as JsonValue;

/// Default per-instance row cap.
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Maximum allowed row cap.
pub const MAX_ROW_LIMIT: usize = 10000;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Bool(bool),
    /// Stored as i64 for maximum range
    Int(i64),
    Float(f64),
    String(String),
}

impl QueryParam {
    /// Convert a JSON argument into a bindable value.
    ///
    /// Only scalars can be bound; arrays and objects are rejected with the
    /// offending field name.
    pub fn from_json(field: &str, value: &JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Null => Ok(Self::Null),
            JsonValue::Bool(b) => Ok(Self::Bool(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                None => n.as_f64().map(Self::Float).ok_or_else(|| {
                    DbError::invalid_argument(field, "number is out of range")
                }),
            },
            JsonValue::String(s) => Ok(Self::String(s.clone())),
            JsonValue::Array(_) | JsonValue::Object(_) => Err(DbError::invalid_argument(
                field,
                "must be a string, number, boolean or null",
            )),
        }
    }

    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Type name for logs; values themselves are never logged.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

/// Rows as fetched from a connection, in database order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

/// Bounded result of a row-returning operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    /// Rows matched. A lower bound when `truncated` is set.
    pub row_count_total: usize,
    pub truncated: bool,
}

impl OperationResult {
    /// Cap a fetched row set at `max_rows`.
    ///
    /// The fetch is expected to request `max_rows + 1` rows; receiving the
    /// extra row is what marks the result as truncated.
    pub fn bounded(rows: RowSet, max_rows: usize) -> Self {
        let RowSet { columns, mut rows } = rows;
        let truncated = rows.len() > max_rows;
        let row_count_total = rows.len();
        rows.truncate(max_rows);
        Self {
            columns,
            rows,
            row_count_total,
            truncated,
        }
    }
}

/// What the executor hands to the formatter.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    Rows(OperationResult),
    Affected { rows_affected: u64 },
}
