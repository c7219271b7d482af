//! Instance configuration models.
//!
//! An instance is one configured database target addressed by its prefix.
//! Its policy (read-only flag, permitted schemas, row cap) travels with it
//! into every component; there is no process-wide policy state.

use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Schema used when an operation does not name one.
    pub fn default_schema(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "public",
            Self::SQLite => "main",
        }
    }

    /// Catalog schemas that are always readable.
    pub fn system_schemas(&self) -> &'static [&'static str] {
        match self {
            Self::PostgreSQL => &["pg_catalog", "information_schema"],
            Self::SQLite => &[],
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Which schemas an instance may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaScope {
    Any,
    Only(BTreeSet<String>),
}

impl SchemaScope {
    /// Parse `*` or a comma-separated schema list.
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value == "*" {
            return Ok(Self::Any);
        }
        let schemas: BTreeSet<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if schemas.is_empty() {
            return Err("allowed_schemas must be '*' or a non-empty list".to_string());
        }
        Ok(Self::Only(schemas))
    }

    pub fn single(schema: &str) -> Self {
        Self::Only(BTreeSet::from([schema.to_string()]))
    }

    pub fn permits(&self, schema: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(schemas) => schemas.contains(schema),
        }
    }
}

impl std::fmt::Display for SchemaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Only(schemas) => {
                let list: Vec<&str> = schemas.iter().map(String::as_str).collect();
                write!(f, "{}", list.join(","))
            }
        }
    }
}

/// Immutable configuration of one database instance.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Tool-name prefix; unique across the process.
    pub prefix: String,
    /// Human-facing tag placed on every response.
    pub label: String,
    pub db_type: DatabaseType,
    /// Contains credentials - never log
    pub connection_string: String,
    /// Database named in the URL, or the file stem for SQLite.
    pub database: Option<String>,
    /// Database used for server-level operations (PostgreSQL).
    pub maintenance_database: String,
    pub read_only: bool,
    pub allowed_schemas: SchemaScope,
    pub max_rows: usize,
    pub statement_timeout: Duration,
}

impl InstanceConfig {
    /// Create an instance with default policy: read-only, default schema only.
    pub fn new(
        prefix: impl Into<String>,
        db_type: DatabaseType,
        connection_string: impl Into<String>,
        database: Option<String>,
    ) -> Self {
        let prefix = prefix.into();
        Self {
            label: prefix.to_uppercase(),
            prefix,
            db_type,
            connection_string: connection_string.into(),
            database,
            maintenance_database: "postgres".to_string(),
            read_only: true,
            allowed_schemas: SchemaScope::single(db_type.default_schema()),
            max_rows: crate::models::DEFAULT_MAX_ROWS,
            statement_timeout: Duration::from_secs(crate::config::DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    pub fn default_schema(&self) -> &'static str {
        self.db_type.default_schema()
    }

    /// Database a request lands on when it does not name one.
    pub fn effective_database<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or(self.database.as_deref())
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        if let Some(at_pos) = self.connection_string.find('@') {
            if let Some(colon_pos) = self.connection_string[..at_pos].rfind(':') {
                // scheme separator, no password present
                if self.connection_string[colon_pos + 1..].starts_with("//") {
                    return self.connection_string.clone();
                }
                let prefix = &self.connection_string[..colon_pos + 1];
                let suffix = &self.connection_string[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.connection_string.clone()
    }
}
