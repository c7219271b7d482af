//! Argument validation.
//!
//! Two passes run before any policy check or connection:
//! 1. a structural check of the raw arguments against the tool's JSON schema
//! 2. a typed parse that turns every name into an [`Ident`], every type into
//!    a [`DataType`] and every expression into its re-rendered form
//!
//! Both report failures as `InvalidArgument` naming the offending field.

use crate::error::{DbError, DbResult};
use crate::models::schema::MAX_IDENTIFIER_LEN;
use crate::models::{
    ColumnSpec, DataType, DatabaseType, ForeignKeySpec, Ident, IndexMethod, InstanceConfig,
    Operation, OperationRequest, QueryParam, ReferentialAction, TableRef,
};
use crate::tools::catalog::{
    AddColumnInput, AddForeignKeyInput, ColumnInput, ColumnStatisticsInput, CreateDatabaseInput,
    CreateIndexInput, CreateTableInput, DefaultValue, DeleteRowsInput, DropColumnInput,
    DropDatabaseInput, DropIndexInput, DropTableInput, ExecuteQueryInput, ForeignKeyInput,
    ListDatabasesInput, SchemaInput, TableInput, TruncateTableInput,
};
use crate::tools::guard;
use rmcp::model::JsonObject;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

/// Maximum length of an encoding name.
const MAX_ENCODING_LEN: usize = 32;

/// Hex digits of the digest that ends a shortened index name.
const INDEX_DIGEST_LEN: usize = 8;

// =============================================================================
// Structural check
// =============================================================================

/// Check presence, unknown fields and top-level JSON types against a schema.
pub fn check_structure(schema: &JsonObject, args: &JsonObject) -> DbResult<()> {
    let empty = JsonObject::new();
    let properties = schema
        .get("properties")
        .and_then(JsonValue::as_object)
        .unwrap_or(&empty);

    if let Some(required) = schema.get("required").and_then(JsonValue::as_array) {
        for field in required.iter().filter_map(JsonValue::as_str) {
            match args.get(field) {
                None | Some(JsonValue::Null) => {
                    return Err(DbError::invalid_argument(field, "is required"));
                }
                Some(_) => {}
            }
        }
    }

    for (field, value) in args {
        let Some(property) = properties.get(field) else {
            return Err(DbError::invalid_argument(field, "unknown argument"));
        };
        if let Some(expected) = property.get("type") {
            if !matches_type(expected, value) {
                return Err(DbError::invalid_argument(
                    field,
                    format!("expected {}, got {}", describe_type(expected), json_type(value)),
                ));
            }
        }
    }
    Ok(())
}

fn matches_type(expected: &JsonValue, value: &JsonValue) -> bool {
    match expected {
        JsonValue::String(name) => matches_type_name(name, value),
        JsonValue::Array(names) => names
            .iter()
            .filter_map(JsonValue::as_str)
            .any(|name| matches_type_name(name, value)),
        _ => true,
    }
}

fn matches_type_name(name: &str, value: &JsonValue) -> bool {
    match name {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn describe_type(expected: &JsonValue) -> String {
    match expected {
        JsonValue::String(name) => name.clone(),
        JsonValue::Array(names) => names
            .iter()
            .filter_map(JsonValue::as_str)
            .filter(|n| *n != "null")
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

// =============================================================================
// Typed parse
// =============================================================================

/// Typed arguments of one catalog operation.
pub trait OperationInput: DeserializeOwned {
    fn database(&self) -> Option<&str>;

    /// Validate and convert into an operation. `name` selects between
    /// operations sharing an input shape.
    fn into_operation(self, name: &'static str, instance: &InstanceConfig)
    -> DbResult<Operation>;
}

/// Deserialize and validate the arguments of operation `name`.
pub fn parse_input<T: OperationInput>(
    name: &'static str,
    instance: &InstanceConfig,
    args: JsonObject,
) -> DbResult<OperationRequest> {
    let input: T = serde_json::from_value(JsonValue::Object(args))
        .map_err(|e| DbError::invalid_argument("arguments", e.to_string()))?;
    let database = database_arg(input.database(), instance)?;
    let operation = input.into_operation(name, instance)?;
    Ok(OperationRequest {
        name,
        database,
        operation,
    })
}

fn database_arg(value: Option<&str>, instance: &InstanceConfig) -> DbResult<Option<Ident>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let database = Ident::parse("database", value)?;
    if instance.db_type == DatabaseType::SQLite && instance.database.as_deref() != Some(value) {
        return Err(DbError::invalid_argument(
            "database",
            format!(
                "SQLite instance '{}' only serves its own database file",
                instance.prefix
            ),
        ));
    }
    Ok(Some(database))
}

fn schema_arg(value: Option<&str>, instance: &InstanceConfig) -> DbResult<Ident> {
    Ident::parse("schema", value.unwrap_or(instance.default_schema()))
}

fn table_arg(table_name: &str, schema: Option<&str>, instance: &InstanceConfig) -> DbResult<TableRef> {
    Ok(TableRef::new(
        schema_arg(schema, instance)?,
        Ident::parse("table_name", table_name)?,
    ))
}

fn require_postgres(name: &str, instance: &InstanceConfig) -> DbResult<()> {
    match instance.db_type {
        DatabaseType::PostgreSQL => Ok(()),
        DatabaseType::SQLite => Err(DbError::invalid_argument(
            "operation",
            format!("{} is not supported on SQLite", name),
        )),
    }
}

fn cascade_arg(cascade: bool, instance: &InstanceConfig) -> DbResult<bool> {
    if cascade && instance.db_type == DatabaseType::SQLite {
        return Err(DbError::invalid_argument(
            "cascade",
            "CASCADE is not supported on SQLite",
        ));
    }
    Ok(cascade)
}

/// Render a column default as SQL.
fn default_sql(field: &str, value: &DefaultValue, db_type: DatabaseType) -> DbResult<String> {
    match value {
        DefaultValue::Bool(true) => Ok("TRUE".to_string()),
        DefaultValue::Bool(false) => Ok("FALSE".to_string()),
        DefaultValue::Int(v) => Ok(v.to_string()),
        DefaultValue::Float(v) if v.is_finite() => Ok(v.to_string()),
        DefaultValue::Float(_) => Err(DbError::invalid_argument(field, "must be a finite number")),
        DefaultValue::Expression(text) => guard::parse_expression(field, text, db_type),
    }
}

#[allow(clippy::too_many_arguments)]
fn column_spec(
    field: &str,
    name: &str,
    data_type: &str,
    nullable: bool,
    primary_key: bool,
    unique: bool,
    default: Option<&DefaultValue>,
    check: Option<&str>,
    db_type: DatabaseType,
) -> DbResult<ColumnSpec> {
    Ok(ColumnSpec {
        name: Ident::parse(&format!("{}name", field), name)?,
        data_type: DataType::parse(&format!("{}type", field), data_type)?,
        nullable,
        primary_key,
        unique,
        default: default
            .map(|d| default_sql(&format!("{}default", field), d, db_type))
            .transpose()?,
        check: check
            .map(|c| guard::parse_expression(&format!("{}check", field), c, db_type))
            .transpose()?,
    })
}

fn column_input(idx: usize, column: &ColumnInput, db_type: DatabaseType) -> DbResult<ColumnSpec> {
    column_spec(
        &format!("columns[{}].", idx),
        &column.name,
        &column.data_type,
        column.nullable,
        column.primary_key,
        column.unique,
        column.default.as_ref(),
        column.check.as_deref(),
        db_type,
    )
}

fn foreign_key_input(
    idx: usize,
    fk: &ForeignKeyInput,
    table: &TableRef,
    instance: &InstanceConfig,
) -> DbResult<ForeignKeySpec> {
    let field = |name: &str| format!("foreign_keys[{}].{}", idx, name);
    let references_schema = match &fk.references_schema {
        Some(schema) => Ident::parse(&field("references_schema"), schema)?,
        None => table.schema.clone(),
    };
    if instance.db_type == DatabaseType::SQLite && references_schema != table.schema {
        return Err(DbError::invalid_argument(
            field("references_schema"),
            "SQLite foreign keys must reference a table in the same schema",
        ));
    }
    Ok(ForeignKeySpec {
        column: Ident::parse(&field("column"), &fk.column)?,
        references: TableRef::new(
            references_schema,
            Ident::parse(&field("references_table"), &fk.references_table)?,
        ),
        references_column: Ident::parse(&field("references_column"), &fk.references_column)?,
        on_delete: fk.on_delete,
        on_update: fk.on_update,
    })
}

/// `idx_<table>_<columns>`. Names over the identifier limit keep a prefix
/// and end in a digest of the full name, so they stay distinct.
fn default_index_name(table: &Ident, columns: &[Ident]) -> DbResult<Ident> {
    let full = format!(
        "idx_{}_{}",
        table,
        columns
            .iter()
            .map(Ident::as_str)
            .collect::<Vec<_>>()
            .join("_")
    );
    if full.len() <= MAX_IDENTIFIER_LEN {
        return Ident::parse("index_name", &full);
    }
    let digest = format!("{:x}", Sha256::digest(full.as_bytes()));
    // identifiers are ASCII, so any byte offset is a char boundary
    let short = format!(
        "{}_{}",
        &full[..MAX_IDENTIFIER_LEN - INDEX_DIGEST_LEN - 1],
        &digest[..INDEX_DIGEST_LEN]
    );
    Ident::parse("index_name", &short)
}

fn encoding_arg(value: Option<&str>) -> DbResult<String> {
    let encoding = value.unwrap_or("UTF8");
    let valid = !encoding.is_empty()
        && encoding.len() <= MAX_ENCODING_LEN
        && encoding
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(DbError::invalid_argument(
            "encoding",
            format!("'{}' is not a valid encoding name", encoding.escape_debug()),
        ));
    }
    Ok(encoding.to_string())
}

macro_rules! database_field {
    ($($input:ty),* $(,)?) => {
        $(
            impl $input {
                fn requested_database(&self) -> Option<&str> {
                    self.database.as_deref()
                }
            }
        )*
    };
}

database_field!(
    ListDatabasesInput,
    CreateDatabaseInput,
    DropDatabaseInput,
    CreateTableInput,
    DropTableInput,
    AddColumnInput,
    DropColumnInput,
    CreateIndexInput,
    DropIndexInput,
    AddForeignKeyInput,
    TruncateTableInput,
    DeleteRowsInput,
    ExecuteQueryInput,
    SchemaInput,
    TableInput,
    ColumnStatisticsInput,
);

impl OperationInput for ListDatabasesInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, _: &InstanceConfig) -> DbResult<Operation> {
        Ok(Operation::ListDatabases)
    }
}

impl OperationInput for CreateDatabaseInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, name: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        require_postgres(name, instance)?;
        Ok(Operation::CreateDatabase {
            name: Ident::parse("database_name", &self.database_name)?,
            owner: self
                .owner
                .as_deref()
                .map(|o| Ident::parse("owner", o))
                .transpose()?,
            encoding: encoding_arg(self.encoding.as_deref())?,
        })
    }
}

impl OperationInput for DropDatabaseInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, name: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        require_postgres(name, instance)?;
        Ok(Operation::DropDatabase {
            name: Ident::parse("database_name", &self.database_name)?,
        })
    }
}

impl OperationInput for CreateTableInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        let table = table_arg(&self.table_name, self.schema.as_deref(), instance)?;
        if self.columns.is_empty() {
            return Err(DbError::invalid_argument(
                "columns",
                "at least one column is required",
            ));
        }

        let mut columns: Vec<ColumnSpec> = Vec::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            let spec = column_input(idx, column, instance.db_type)?;
            if columns.iter().any(|c| c.name == spec.name) {
                return Err(DbError::invalid_argument(
                    format!("columns[{}].name", idx),
                    format!("duplicate column '{}'", spec.name),
                ));
            }
            columns.push(spec);
        }

        let mut foreign_keys = Vec::with_capacity(self.foreign_keys.len());
        for (idx, fk) in self.foreign_keys.iter().enumerate() {
            let spec = foreign_key_input(idx, fk, &table, instance)?;
            if !columns.iter().any(|c| c.name == spec.column) {
                return Err(DbError::invalid_argument(
                    format!("foreign_keys[{}].column", idx),
                    format!("'{}' is not one of the table's columns", spec.column),
                ));
            }
            foreign_keys.push(spec);
        }

        Ok(Operation::CreateTable {
            table,
            columns,
            foreign_keys,
        })
    }
}

impl OperationInput for DropTableInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        Ok(Operation::DropTable {
            table: table_arg(&self.table_name, self.schema.as_deref(), instance)?,
            cascade: cascade_arg(self.cascade, instance)?,
        })
    }
}

impl OperationInput for AddColumnInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        let table = table_arg(&self.table_name, self.schema.as_deref(), instance)?;
        let column = ColumnSpec {
            name: Ident::parse("column_name", &self.column_name)?,
            data_type: DataType::parse("data_type", &self.data_type)?,
            nullable: self.nullable,
            primary_key: false,
            unique: false,
            default: self
                .default
                .as_ref()
                .map(|d| default_sql("default", d, instance.db_type))
                .transpose()?,
            check: None,
        };
        Ok(Operation::AddColumn { table, column })
    }
}

impl OperationInput for DropColumnInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        Ok(Operation::DropColumn {
            table: table_arg(&self.table_name, self.schema.as_deref(), instance)?,
            column: Ident::parse("column_name", &self.column_name)?,
        })
    }
}

impl OperationInput for CreateIndexInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        let table = table_arg(&self.table_name, self.schema.as_deref(), instance)?;
        if self.columns.is_empty() {
            return Err(DbError::invalid_argument(
                "columns",
                "at least one column is required",
            ));
        }
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, c)| Ident::parse(&format!("columns[{}]", idx), c))
            .collect::<DbResult<Vec<_>>>()?;
        if instance.db_type == DatabaseType::SQLite && self.method != IndexMethod::Btree {
            return Err(DbError::invalid_argument(
                "method",
                format!("SQLite only supports btree indexes, got {}", self.method.as_sql()),
            ));
        }
        let name = match &self.index_name {
            Some(name) => Ident::parse("index_name", name)?,
            None => default_index_name(&table.name, &columns)?,
        };
        Ok(Operation::CreateIndex {
            table,
            name,
            columns,
            unique: self.unique,
            method: self.method,
        })
    }
}

impl OperationInput for DropIndexInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        Ok(Operation::DropIndex {
            schema: schema_arg(self.schema.as_deref(), instance)?,
            name: Ident::parse("index_name", &self.index_name)?,
        })
    }
}

impl OperationInput for AddForeignKeyInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, name: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        require_postgres(name, instance)?;
        let table = table_arg(&self.table_name, self.schema.as_deref(), instance)?;
        let references_schema = match &self.references_schema {
            Some(schema) => Ident::parse("references_schema", schema)?,
            None => table.schema.clone(),
        };
        let foreign_key = ForeignKeySpec {
            column: Ident::parse("column", &self.column)?,
            references: TableRef::new(
                references_schema,
                Ident::parse("references_table", &self.references_table)?,
            ),
            references_column: Ident::parse("references_column", &self.references_column)?,
            on_delete: Some(self.on_delete.unwrap_or(ReferentialAction::Restrict)),
            on_update: Some(self.on_update.unwrap_or(ReferentialAction::Restrict)),
        };
        Ok(Operation::AddForeignKey {
            table,
            constraint: Ident::parse("constraint_name", &self.constraint_name)?,
            foreign_key,
        })
    }
}

impl OperationInput for TruncateTableInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        Ok(Operation::TruncateTable {
            table: table_arg(&self.table_name, self.schema.as_deref(), instance)?,
            cascade: cascade_arg(self.cascade, instance)?,
        })
    }
}

impl OperationInput for DeleteRowsInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        let table = table_arg(&self.table_name, self.schema.as_deref(), instance)?;
        let mut filters = Vec::with_capacity(self.filters.len());
        for (column, value) in &self.filters {
            let field = format!("filters.{}", column);
            filters.push((
                Ident::parse(&field, column)?,
                QueryParam::from_json(&field, value)?,
            ));
        }
        Ok(Operation::DeleteRows { table, filters })
    }
}

impl OperationInput for ExecuteQueryInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        let analysis = guard::analyze(&self.query, instance.db_type)?;
        let params = self
            .params
            .iter()
            .enumerate()
            .map(|(idx, v)| QueryParam::from_json(&format!("params[{}]", idx), v))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Operation::ExecuteQuery {
            sql: self.query,
            params,
            analysis,
        })
    }
}

impl OperationInput for SchemaInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, name: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        let schema = schema_arg(self.schema.as_deref(), instance)?;
        match name {
            "list_tables" => Ok(Operation::ListTables { schema }),
            "database_summary" => Ok(Operation::DatabaseSummary { schema }),
            other => Err(DbError::internal(format!(
                "schema input used by unexpected operation '{}'",
                other
            ))),
        }
    }
}

impl OperationInput for TableInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, name: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        let table = table_arg(&self.table_name, self.schema.as_deref(), instance)?;
        match name {
            "describe_table" => Ok(Operation::DescribeTable { table }),
            "table_statistics" => Ok(Operation::TableStatistics { table }),
            "get_indexes" => Ok(Operation::GetIndexes { table }),
            other => Err(DbError::internal(format!(
                "table input used by unexpected operation '{}'",
                other
            ))),
        }
    }
}

impl OperationInput for ColumnStatisticsInput {
    fn database(&self) -> Option<&str> {
        self.requested_database()
    }

    fn into_operation(self, _: &'static str, instance: &InstanceConfig) -> DbResult<Operation> {
        Ok(Operation::ColumnStatistics {
            table: table_arg(&self.table_name, self.schema.as_deref(), instance)?,
            column: Ident::parse("column_name", &self.column_name)?,
        })
    }
}
