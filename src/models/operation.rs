//! Validated operation requests.
//!
//! An [`OperationRequest`] only exists once every identifier and type in it
//! has been checked, so everything downstream can render it into SQL
//! without further escaping decisions.

use crate::models::{
    ColumnSpec, ForeignKeySpec, Ident, IndexMethod, QueryParam, TableRef,
};
use serde::Serialize;

/// Safety class of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    Read,
    Write,
    Destructive,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Destructive => "destructive",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Self::Read)
    }
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What static analysis learned about a free-form SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnalysis {
    pub class: OperationClass,
    /// Short statement label for logs and previews, e.g. `SELECT`.
    pub label: String,
    /// Schemas of every object the statement names.
    pub schemas: Vec<String>,
    /// False when the statement writes to objects whose schema is unknown.
    pub targets_resolved: bool,
    /// Plain SELECT that can be wrapped in a bounding subquery.
    pub wrappable: bool,
    /// Whether the statement returns rows.
    pub returns_rows: bool,
}

/// A fully validated operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ListDatabases,
    CreateDatabase {
        name: Ident,
        owner: Option<Ident>,
        encoding: String,
    },
    DropDatabase {
        name: Ident,
    },
    CreateTable {
        table: TableRef,
        columns: Vec<ColumnSpec>,
        foreign_keys: Vec<ForeignKeySpec>,
    },
    DropTable {
        table: TableRef,
        cascade: bool,
    },
    AddColumn {
        table: TableRef,
        column: ColumnSpec,
    },
    DropColumn {
        table: TableRef,
        column: Ident,
    },
    CreateIndex {
        table: TableRef,
        name: Ident,
        columns: Vec<Ident>,
        unique: bool,
        method: IndexMethod,
    },
    DropIndex {
        schema: Ident,
        name: Ident,
    },
    AddForeignKey {
        table: TableRef,
        constraint: Ident,
        foreign_key: ForeignKeySpec,
    },
    TruncateTable {
        table: TableRef,
        cascade: bool,
    },
    DeleteRows {
        table: TableRef,
        filters: Vec<(Ident, QueryParam)>,
    },
    ExecuteQuery {
        sql: String,
        params: Vec<QueryParam>,
        analysis: QueryAnalysis,
    },
    ListTables {
        schema: Ident,
    },
    DescribeTable {
        table: TableRef,
    },
    TableStatistics {
        table: TableRef,
    },
    ColumnStatistics {
        table: TableRef,
        column: Ident,
    },
    GetIndexes {
        table: TableRef,
    },
    DatabaseSummary {
        schema: Ident,
    },
}

impl Operation {
    /// Effective class. Catalog entries give a baseline; a filterless delete
    /// and free-form SQL are classified by their content.
    pub fn class(&self) -> OperationClass {
        match self {
            Self::ListDatabases
            | Self::ListTables { .. }
            | Self::DescribeTable { .. }
            | Self::TableStatistics { .. }
            | Self::ColumnStatistics { .. }
            | Self::GetIndexes { .. }
            | Self::DatabaseSummary { .. } => OperationClass::Read,
            Self::CreateDatabase { .. }
            | Self::CreateTable { .. }
            | Self::AddColumn { .. }
            | Self::CreateIndex { .. }
            | Self::AddForeignKey { .. } => OperationClass::Write,
            Self::DropDatabase { .. }
            | Self::DropTable { .. }
            | Self::DropColumn { .. }
            | Self::DropIndex { .. }
            | Self::TruncateTable { .. } => OperationClass::Destructive,
            Self::DeleteRows { filters, .. } => {
                if filters.is_empty() {
                    OperationClass::Destructive
                } else {
                    OperationClass::Write
                }
            }
            Self::ExecuteQuery { analysis, .. } => analysis.class,
        }
    }

    /// Whether `schemas()` covers every object the operation changes.
    pub fn schemas_resolved(&self) -> bool {
        match self {
            Self::ExecuteQuery { analysis, .. } => analysis.targets_resolved,
            _ => true,
        }
    }

    /// Schemas the operation reads or changes, deduplicated in first-seen order.
    pub fn schemas(&self) -> Vec<String> {
        let mut schemas: Vec<String> = Vec::new();
        let mut push = |s: &str| {
            if !schemas.iter().any(|x| x == s) {
                schemas.push(s.to_string());
            }
        };
        match self {
            Self::ListDatabases
            | Self::CreateDatabase { .. }
            | Self::DropDatabase { .. } => {}
            Self::CreateTable {
                table,
                foreign_keys,
                ..
            } => {
                push(table.schema.as_str());
                for fk in foreign_keys {
                    push(fk.references.schema.as_str());
                }
            }
            Self::AddForeignKey {
                table, foreign_key, ..
            } => {
                push(table.schema.as_str());
                push(foreign_key.references.schema.as_str());
            }
            Self::DropTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::TruncateTable { table, .. }
            | Self::DeleteRows { table, .. }
            | Self::DescribeTable { table }
            | Self::TableStatistics { table }
            | Self::ColumnStatistics { table, .. }
            | Self::GetIndexes { table } => push(table.schema.as_str()),
            Self::DropIndex { schema, .. }
            | Self::ListTables { schema }
            | Self::DatabaseSummary { schema } => push(schema.as_str()),
            Self::ExecuteQuery { analysis, .. } => {
                for schema in &analysis.schemas {
                    push(schema);
                }
            }
        }
        schemas
    }

    /// Human description of the object the operation acts on.
    pub fn target(&self) -> String {
        match self {
            Self::ListDatabases => "server".to_string(),
            Self::CreateDatabase { name, .. } | Self::DropDatabase { name } => {
                format!("database {}", name)
            }
            Self::CreateTable { table, .. }
            | Self::DropTable { table, .. }
            | Self::TruncateTable { table, .. }
            | Self::DeleteRows { table, .. }
            | Self::DescribeTable { table }
            | Self::TableStatistics { table }
            | Self::GetIndexes { table } => format!("table {}", table),
            Self::AddColumn { table, column } => format!("column {}.{}", table, column.name),
            Self::DropColumn { table, column } | Self::ColumnStatistics { table, column } => {
                format!("column {}.{}", table, column)
            }
            Self::CreateIndex { name, table, .. } => format!("index {} on {}", name, table),
            Self::DropIndex { schema, name } => format!("index {}.{}", schema, name),
            Self::AddForeignKey {
                table, constraint, ..
            } => format!("constraint {} on {}", constraint, table),
            Self::ExecuteQuery { analysis, .. } => format!("{} statement", analysis.label),
            Self::ListTables { schema } | Self::DatabaseSummary { schema } => {
                format!("schema {}", schema)
            }
        }
    }

    /// Server-level operations run on the maintenance database.
    pub fn is_server_level(&self) -> bool {
        matches!(
            self,
            Self::ListDatabases | Self::CreateDatabase { .. } | Self::DropDatabase { .. }
        )
    }
}

/// One validated invocation of a catalog operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    /// Catalog name, without the instance prefix.
    pub name: &'static str,
    /// Database the caller asked for, if any.
    pub database: Option<Ident>,
    pub operation: Operation,
}

impl OperationRequest {
    pub fn class(&self) -> OperationClass {
        self.operation.class()
    }
}
