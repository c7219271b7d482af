//! Operation catalog.
//!
//! The fixed set of operations every instance exposes, their argument
//! types, and the route table that maps `<prefix>_<operation>` tool names
//! back to an instance and an operation.

use crate::error::{DbError, DbResult};
use crate::models::{IndexMethod, InstanceConfig, OperationClass, OperationRequest, ReferentialAction};
use crate::tools::validate;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

// =============================================================================
// Inputs
// =============================================================================

/// Input for the list_databases tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListDatabasesInput {
    /// Ignored; databases are listed from the maintenance database.
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the create_database tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateDatabaseInput {
    /// Name of the database to create
    pub database_name: String,
    /// Role that will own the new database
    #[serde(default)]
    pub owner: Option<String>,
    /// Character encoding. Default: UTF8
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the drop_database tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DropDatabaseInput {
    /// Name of the database to drop
    pub database_name: String,
    #[serde(default)]
    pub database: Option<String>,
}

/// Default value of a column: a literal or an SQL expression such as `now()`.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Expression(String),
}

/// One column of a create_table request.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ColumnInput {
    /// Column name
    pub name: String,
    /// SQL data type, e.g. `integer`, `varchar(255)`, `numeric(10, 2)`
    #[serde(rename = "type")]
    pub data_type: String,
    /// Allow NULL values. Default: true
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<DefaultValue>,
    /// CHECK constraint expression
    #[serde(default)]
    pub check: Option<String>,
}

/// One foreign key of a create_table request.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ForeignKeyInput {
    /// Column in the new table
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    /// Schema of the referenced table. Default: the new table's schema
    #[serde(default)]
    pub references_schema: Option<String>,
    #[serde(default)]
    pub on_delete: Option<ReferentialAction>,
    #[serde(default)]
    pub on_update: Option<ReferentialAction>,
}

/// Input for the create_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateTableInput {
    pub table_name: String,
    /// Column definitions, in table order
    pub columns: Vec<ColumnInput>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyInput>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the drop_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DropTableInput {
    pub table_name: String,
    /// Also drop dependent objects (PostgreSQL only)
    #[serde(default)]
    pub cascade: bool,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the add_column tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddColumnInput {
    pub table_name: String,
    pub column_name: String,
    /// SQL data type of the new column
    pub data_type: String,
    /// Allow NULL values. Default: true
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<DefaultValue>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the drop_column tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DropColumnInput {
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the create_index tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateIndexInput {
    pub table_name: String,
    /// Indexed columns, in key order
    pub columns: Vec<String>,
    /// Default: idx_<table>_<columns>
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub unique: bool,
    /// Access method. Default: btree
    #[serde(default)]
    pub method: IndexMethod,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the drop_index tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DropIndexInput {
    pub index_name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the add_foreign_key tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddForeignKeyInput {
    pub table_name: String,
    pub constraint_name: String,
    /// Referencing column
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    /// Schema of the referenced table. Default: the table's schema
    #[serde(default)]
    pub references_schema: Option<String>,
    /// Default: RESTRICT
    #[serde(default)]
    pub on_delete: Option<ReferentialAction>,
    /// Default: RESTRICT
    #[serde(default)]
    pub on_update: Option<ReferentialAction>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the truncate_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TruncateTableInput {
    pub table_name: String,
    /// Also truncate tables that reference this one (PostgreSQL only)
    #[serde(default)]
    pub cascade: bool,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the delete_rows tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DeleteRowsInput {
    pub table_name: String,
    /// Column equality filters, combined with AND. Empty deletes every row.
    #[serde(default)]
    pub filters: serde_json::Map<String, JsonValue>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the execute_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecuteQueryInput {
    /// One SQL statement. Use $1, $2 (PostgreSQL) or ?1, ?2 (SQLite) for parameters.
    pub query: String,
    /// Values bound to the statement's placeholders, in order
    #[serde(default)]
    pub params: Vec<JsonValue>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the list_tables and database_summary tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SchemaInput {
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for tools that inspect one table.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TableInput {
    pub table_name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Input for the column_statistics tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ColumnStatisticsInput {
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Catalog
// =============================================================================

type ParseFn = fn(&'static str, &InstanceConfig, JsonObject) -> DbResult<OperationRequest>;

/// One supported operation.
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Baseline class. `delete_rows` and `execute_query` may be stricter per call.
    pub class: OperationClass,
    /// Accepts the `confirm` flag.
    pub confirmable: bool,
    input_schema: fn() -> JsonObject,
    parse: ParseFn,
}

impl std::fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("class", &self.class)
            .finish()
    }
}

impl OperationSpec {
    /// JSON schema of the arguments, including `confirm` where accepted.
    pub fn input_schema(&self) -> JsonObject {
        let mut schema = (self.input_schema)();
        if self.confirmable {
            if let Some(JsonValue::Object(properties)) = schema.get_mut("properties") {
                properties.insert(
                    "confirm".to_string(),
                    serde_json::json!({
                        "type": "boolean",
                        "description": "Set to true to execute a destructive operation after reviewing the preview"
                    }),
                );
            }
        }
        schema
    }

    /// Validate arguments and build the typed request.
    pub fn parse(&self, instance: &InstanceConfig, args: JsonObject) -> DbResult<OperationRequest> {
        validate::check_structure(&(self.input_schema)(), &args)?;
        (self.parse)(self.name, instance, args)
    }

    /// Tool description as shown to the caller.
    pub fn describe_for(&self, instance: &InstanceConfig) -> String {
        let mut text = format!("[{}] {}", instance.label, self.description);
        match self.class {
            OperationClass::Destructive => {
                text.push_str(" Destructive: requires \"confirm\": true.");
            }
            _ if self.confirmable => {
                text.push_str(" Destructive forms require \"confirm\": true.");
            }
            _ => {}
        }
        if instance.read_only && !self.class.is_read() {
            text.push_str(" This instance is read-only.");
        }
        text
    }
}

fn schema_of<T: JsonSchema>() -> JsonObject {
    let schema = schemars::schema_for!(T);
    match schema.as_value() {
        JsonValue::Object(map) => map.clone(),
        _ => JsonObject::new(),
    }
}

macro_rules! operation {
    ($name:literal, $class:ident, $confirmable:literal, $input:ty, $description:literal) => {
        OperationSpec {
            name: $name,
            description: $description,
            class: OperationClass::$class,
            confirmable: $confirmable,
            input_schema: schema_of::<$input>,
            parse: validate::parse_input::<$input>,
        }
    };
}

/// Every operation, in the order tools are listed.
pub const OPERATIONS: &[OperationSpec] = &[
    operation!("list_databases", Read, false, ListDatabasesInput,
        "List all databases on the server with their size and connection count."),
    operation!("create_database", Write, false, CreateDatabaseInput,
        "Create a new database."),
    operation!("drop_database", Destructive, true, DropDatabaseInput,
        "Drop a database and everything in it."),
    operation!("create_table", Write, false, CreateTableInput,
        "Create a table with columns, constraints and foreign keys."),
    operation!("drop_table", Destructive, true, DropTableInput,
        "Drop a table and all of its data."),
    operation!("add_column", Write, false, AddColumnInput,
        "Add a column to an existing table."),
    operation!("drop_column", Destructive, true, DropColumnInput,
        "Drop a column and all of its data."),
    operation!("create_index", Write, false, CreateIndexInput,
        "Create an index on one or more columns."),
    operation!("drop_index", Destructive, true, DropIndexInput,
        "Drop an index."),
    operation!("add_foreign_key", Write, false, AddForeignKeyInput,
        "Add a foreign key constraint to an existing table."),
    operation!("truncate_table", Destructive, true, TruncateTableInput,
        "Remove every row from a table."),
    operation!("delete_rows", Write, true, DeleteRowsInput,
        "Delete rows matching column equality filters. Without filters every row is deleted."),
    operation!("execute_query", Read, true, ExecuteQueryInput,
        "Execute one SQL statement with bound parameters. Row results are capped at the instance row limit."),
    operation!("list_tables", Read, false, SchemaInput,
        "List tables and views in a schema."),
    operation!("describe_table", Read, false, TableInput,
        "Show the columns of a table with types, nullability and defaults."),
    operation!("table_statistics", Read, false, TableInput,
        "Row count and on-disk size of a table."),
    operation!("column_statistics", Read, false, ColumnStatisticsInput,
        "Total, non-null and distinct value counts for a column."),
    operation!("get_indexes", Read, false, TableInput,
        "List the indexes of a table with their definitions."),
    operation!("database_summary", Read, false, SchemaInput,
        "Summary of a database: size, table, view and index counts."),
];

/// Look up an operation by its unprefixed name.
pub fn find(name: &str) -> Option<&'static OperationSpec> {
    OPERATIONS.iter().find(|op| op.name == name)
}

// =============================================================================
// Routing
// =============================================================================

/// Where a tool name leads.
#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: String,
    pub operation: &'static OperationSpec,
}

/// Static map from `<prefix>_<operation>` to its route.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
    prefixes: Vec<String>,
}

impl RouteTable {
    /// Build the table for a set of instances. Fails if two instances would
    /// expose the same tool name.
    pub fn build<'a>(instances: impl IntoIterator<Item = &'a InstanceConfig>) -> DbResult<Self> {
        let mut table = Self::default();
        for instance in instances {
            for operation in OPERATIONS {
                let name = tool_name(&instance.prefix, operation.name);
                let route = Route {
                    prefix: instance.prefix.clone(),
                    operation,
                };
                if let Some(existing) = table.routes.insert(name.clone(), route) {
                    return Err(DbError::internal(format!(
                        "Tool name '{}' is ambiguous between instances '{}' and '{}'",
                        name, existing.prefix, instance.prefix
                    )));
                }
            }
            table.prefixes.push(instance.prefix.clone());
        }
        // longest prefix first so lookups report the most specific instance
        table
            .prefixes
            .sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Ok(table)
    }

    /// Resolve a tool name.
    pub fn lookup(&self, tool: &str) -> DbResult<&Route> {
        if let Some(route) = self.routes.get(tool) {
            return Ok(route);
        }
        for prefix in &self.prefixes {
            if let Some(operation) = tool
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
            {
                return Err(DbError::unknown_operation(prefix, operation));
            }
        }
        Err(DbError::unknown_instance(tool))
    }

    /// Tool names in listing order: instances by prefix, then catalog order.
    pub fn tool_names(&self) -> Vec<(String, &Route)> {
        let mut names: Vec<(String, &Route)> = self
            .routes
            .iter()
            .map(|(name, route)| (name.clone(), route))
            .collect();
        names.sort_by(|(_, a), (_, b)| {
            a.prefix.cmp(&b.prefix).then_with(|| {
                position(a.operation.name).cmp(&position(b.operation.name))
            })
        });
        names
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn position(name: &str) -> usize {
    OPERATIONS
        .iter()
        .position(|op| op.name == name)
        .unwrap_or(usize::MAX)
}

pub fn tool_name(prefix: &str, operation: &str) -> String {
    format!("{}_{}", prefix, operation)
}
