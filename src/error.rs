//! Error types for the admin toolkit.
//!
//! Every failure a tool invocation can produce is a `DbError`. Each variant
//! belongs to one taxonomy kind (see [`ErrorKind`]) which is reported to the
//! caller alongside the human-readable message, so an automated agent can
//! decide its next step from the kind alone.

use serde_json::json;
use thiserror::Error;

/// Stable error categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownInstance,
    UnknownOperation,
    InvalidArgument,
    PolicyDenied,
    ConfirmationRequired,
    ConnectionError,
    ExecutionError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownInstance => "UnknownInstance",
            Self::UnknownOperation => "UnknownOperation",
            Self::InvalidArgument => "InvalidArgument",
            Self::PolicyDenied => "PolicyDenied",
            Self::ConfirmationRequired => "ConfirmationRequired",
            Self::ConnectionError => "ConnectionError",
            Self::ExecutionError => "ExecutionError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unknown instance: no instance is registered for tool '{tool}'")]
    UnknownInstance { tool: String },

    #[error("Unknown operation '{operation}' for instance '{prefix}'")]
    UnknownOperation { prefix: String, operation: String },

    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("Policy denied: {reason}")]
    PolicyDenied { reason: String },

    #[error("Confirmation required: {preview}")]
    ConfirmationRequired { preview: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Cancelled: {operation} was abandoned before completion")]
    Cancelled { operation: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    pub fn unknown_instance(tool: impl Into<String>) -> Self {
        Self::UnknownInstance { tool: tool.into() }
    }

    pub fn unknown_operation(prefix: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            prefix: prefix.into(),
            operation: operation.into(),
        }
    }

    /// Create an invalid argument error for a named field.
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn policy_denied(reason: impl Into<String>) -> Self {
        Self::PolicyDenied {
            reason: reason.into(),
        }
    }

    pub fn confirmation_required(preview: impl Into<String>) -> Self {
        Self::ConfirmationRequired {
            preview: preview.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Taxonomy kind reported to the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownInstance { .. } => ErrorKind::UnknownInstance,
            Self::UnknownOperation { .. } => ErrorKind::UnknownOperation,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::PolicyDenied { .. } => ErrorKind::PolicyDenied,
            Self::ConfirmationRequired { .. } => ErrorKind::ConfirmationRequired,
            Self::Connection { .. } => ErrorKind::ConnectionError,
            Self::Execution { .. }
            | Self::Timeout { .. }
            | Self::Cancelled { .. }
            | Self::Internal { .. } => ErrorKind::ExecutionError,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Execution { suggestion, .. } => Some(suggestion),
            Self::Timeout { .. } => {
                Some("Raise statement_timeout for this instance or narrow the operation")
            }
            Self::UnknownInstance { .. } | Self::UnknownOperation { .. } => {
                Some("List the available tools to see configured instances and operations")
            }
            _ => None,
        }
    }

    /// Whether the connection that produced this error is in an unknown state.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::Cancelled { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::execution(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::execution(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection acquire", 0),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection is closed", "Retry the operation to reconnect")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => DbError::execution(
                format!("Type not found: {}", type_name),
                None,
                "Check the column types used by the statement",
            ),
            sqlx::Error::ColumnNotFound(col) => DbError::execution(
                format!("Column not found: {}", col),
                None,
                "Check the column names used by the statement",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::connection(
                "Database worker crashed",
                "Retry the operation to reconnect",
            ),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for toolkit operations.
pub type DbResult<T> = Result<T, DbError>;

/// Structured `data` payload carried with every MCP error.
fn error_data(err: &DbError) -> serde_json::Value {
    let mut data = json!({ "kind": err.kind().as_str() });
    match err {
        DbError::InvalidArgument { field, .. } => data["field"] = json!(field),
        DbError::ConfirmationRequired { preview } => data["preview"] = json!(preview),
        DbError::Execution {
            sql_state: Some(code),
            ..
        } => data["sql_state"] = json!(code),
        _ => {}
    }
    if let Some(suggestion) = err.suggestion() {
        data["suggestion"] = json!(suggestion);
    }
    data
}

/// Convert DbError to MCP ErrorData, keeping the taxonomy kind in `data`.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = Some(error_data(&err));
        let message = match &err {
            DbError::Execution {
                message,
                sql_state: Some(code),
                ..
            } => format!("Database error: {} (SQLSTATE: {})", message, code),
            _ => err.to_string(),
        };
        match err.kind() {
            ErrorKind::UnknownInstance => rmcp::ErrorData::resource_not_found(message, data),
            ErrorKind::ConnectionError => rmcp::ErrorData::internal_error(message, data),
            ErrorKind::ExecutionError if !matches!(err, DbError::Execution { .. }) => {
                rmcp::ErrorData::internal_error(message, data)
            }
            _ => rmcp::ErrorData::invalid_params(message, data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));

        let err = DbError::invalid_argument("table_name", "must be an identifier");
        assert_eq!(
            err.to_string(),
            "Invalid argument 'table_name': must be an identifier"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            DbError::unknown_instance("x_list_tables").kind(),
            ErrorKind::UnknownInstance
        );
        assert_eq!(
            DbError::policy_denied("instance is read-only").kind(),
            ErrorKind::PolicyDenied
        );
        assert_eq!(
            DbError::timeout("query", 30).kind(),
            ErrorKind::ExecutionError
        );
        assert_eq!(
            DbError::cancelled("query").kind(),
            ErrorKind::ExecutionError
        );
    }

    #[test]
    fn test_poisons_connection() {
        assert!(DbError::timeout("query", 30).poisons_connection());
        assert!(DbError::cancelled("query").poisons_connection());
        assert!(DbError::connection("err", "sugg").poisons_connection());
        assert!(!DbError::execution("syntax", None, "fix").poisons_connection());
    }

    #[test]
    fn test_invalid_argument_maps_to_invalid_params() {
        let err = DbError::invalid_argument("table_name", "bad");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32602);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["kind"], "InvalidArgument");
        assert_eq!(data["field"], "table_name");
    }

    #[test]
    fn test_unknown_instance_maps_to_resource_not_found() {
        let err = DbError::unknown_instance("desktop_list_databases");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32002);
        assert_eq!(mcp_err.data.unwrap()["kind"], "UnknownInstance");
    }

    #[test]
    fn test_confirmation_carries_preview() {
        let err = DbError::confirmation_required("DROP TABLE \"public\".\"orders\"");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32602);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["kind"], "ConfirmationRequired");
        assert!(data["preview"].as_str().unwrap().contains("DROP TABLE"));
    }

    #[test]
    fn test_connection_maps_to_internal_error() {
        let err = DbError::connection("failed", "try reconnecting");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32603);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["kind"], "ConnectionError");
        assert_eq!(data["suggestion"], "try reconnecting");
    }

    #[test]
    fn test_timeout_maps_to_internal_error() {
        let err = DbError::timeout("query", 30);
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32603);
        assert_eq!(mcp_err.data.unwrap()["kind"], "ExecutionError");
    }

    #[test]
    fn test_execution_error_includes_sql_state() {
        let err = DbError::execution("syntax error", Some("42601".to_string()), "check syntax");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32602);
        assert!(mcp_err.message.contains("42601"));
        let data = mcp_err.data.unwrap();
        assert_eq!(data["kind"], "ExecutionError");
        assert_eq!(data["sql_state"], "42601");
        assert_eq!(data["suggestion"], "check syntax");
    }
}
