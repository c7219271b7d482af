//! Statement planning.
//!
//! Turns a validated [`OperationRequest`] into exactly one SQL statement for
//! the instance's dialect. Names are only ever inserted as quoted
//! [`Ident`](crate::models::Ident)s; values are always bound parameters.

use crate::error::{DbError, DbResult};
use crate::models::{
    DatabaseType, InstanceConfig, Operation, OperationRequest, QueryParam, TableRef,
};

/// How the executor should run a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Returns rows; fetched with a `max_rows + 1` cap.
    Rows,
    /// Returns an affected-row count.
    Command,
}

/// A single statement ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStatement {
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub kind: StatementKind,
}

/// Everything the executor and formatter need for one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Title line for row results, success message for commands.
    pub title: String,
    pub statement: PlannedStatement,
    /// Database the statement must run on when it differs from the request.
    pub database: Option<String>,
    /// Cached connections to this database are closed before running.
    pub evict: Option<String>,
}

impl Plan {
    fn rows(title: impl Into<String>, sql: String, params: Vec<QueryParam>) -> Self {
        Self {
            title: title.into(),
            statement: PlannedStatement {
                sql,
                params,
                kind: StatementKind::Rows,
            },
            database: None,
            evict: None,
        }
    }

    fn command(message: impl Into<String>, sql: String, params: Vec<QueryParam>) -> Self {
        Self {
            title: message.into(),
            statement: PlannedStatement {
                sql,
                params,
                kind: StatementKind::Command,
            },
            database: None,
            evict: None,
        }
    }

    fn on_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Bind placeholder for the n-th (1-based) parameter.
fn placeholder(db_type: DatabaseType, n: usize) -> String {
    match db_type {
        DatabaseType::PostgreSQL => format!("${}", n),
        DatabaseType::SQLite => format!("?{}", n),
    }
}

/// Append the row cap to a catalog query.
fn bounded(sql: &str, max_rows: usize) -> String {
    format!("{}\nLIMIT {}", sql.trim_end(), max_rows + 1)
}

/// Wrap a plain SELECT so the database itself stops after `max_rows + 1` rows.
pub fn wrap_select(sql: &str, max_rows: usize) -> String {
    let inner = sql.trim().trim_end_matches(';').trim_end();
    format!(
        "SELECT * FROM (\n{}\n) AS bounded_result LIMIT {}",
        inner,
        max_rows + 1
    )
}

/// Build the statement for a request.
pub fn plan(request: &OperationRequest, instance: &InstanceConfig) -> DbResult<Plan> {
    let db = instance.db_type;
    let max_rows = instance.max_rows;

    let plan = match &request.operation {
        Operation::ListDatabases => match db {
            DatabaseType::PostgreSQL => Plan::rows(
                "Available databases",
                bounded(
                    "SELECT
    d.datname::text AS database_name,
    pg_size_pretty(pg_database_size(d.datname)) AS size,
    (SELECT count(*) FROM pg_catalog.pg_stat_activity a WHERE a.datname = d.datname) AS connections
FROM pg_catalog.pg_database d
WHERE NOT d.datistemplate
ORDER BY pg_database_size(d.datname) DESC, d.datname",
                    max_rows,
                ),
                vec![],
            )
            .on_database(&instance.maintenance_database),
            DatabaseType::SQLite => Plan::rows(
                "Attached databases",
                bounded(
                    "SELECT name AS database_name, file FROM pragma_database_list ORDER BY seq",
                    max_rows,
                ),
                vec![],
            ),
        },

        Operation::CreateDatabase {
            name,
            owner,
            encoding,
        } => {
            require_postgres(db, request.name)?;
            let mut sql = format!("CREATE DATABASE {}", name.quoted());
            if let Some(owner) = owner {
                sql.push_str(&format!(" OWNER {}", owner.quoted()));
            }
            sql.push_str(&format!(" ENCODING '{}'", encoding));
            Plan::command(format!("Database '{}' created", name), sql, vec![])
                .on_database(&instance.maintenance_database)
        }

        Operation::DropDatabase { name } => {
            require_postgres(db, request.name)?;
            if name.as_str() == instance.maintenance_database {
                return Err(DbError::invalid_argument(
                    "database_name",
                    "cannot drop the maintenance database",
                ));
            }
            let mut plan = Plan::command(
                format!("Database '{}' dropped", name),
                format!("DROP DATABASE {}", name.quoted()),
                vec![],
            )
            .on_database(&instance.maintenance_database);
            plan.evict = Some(name.to_string());
            plan
        }

        Operation::CreateTable {
            table,
            columns,
            foreign_keys,
        } => {
            let qualify_parent = db == DatabaseType::PostgreSQL;
            let mut defs: Vec<String> = columns.iter().map(|c| c.to_sql()).collect();
            defs.extend(foreign_keys.iter().map(|fk| fk.to_sql(qualify_parent)));
            let sql = format!(
                "CREATE TABLE {} (\n    {}\n)",
                table.quoted(),
                defs.join(",\n    ")
            );
            Plan::command(
                format!(
                    "Table '{}' created with {} column(s)",
                    table,
                    columns.len()
                ),
                sql,
                vec![],
            )
        }

        Operation::DropTable { table, cascade } => {
            let mut sql = format!("DROP TABLE {}", table.quoted());
            if *cascade {
                sql.push_str(" CASCADE");
            }
            Plan::command(format!("Table '{}' dropped", table), sql, vec![])
        }

        Operation::AddColumn { table, column } => Plan::command(
            format!("Column '{}' added to '{}'", column.name, table),
            format!("ALTER TABLE {} ADD COLUMN {}", table.quoted(), column.to_sql()),
            vec![],
        ),

        Operation::DropColumn { table, column } => Plan::command(
            format!("Column '{}' dropped from '{}'", column, table),
            format!(
                "ALTER TABLE {} DROP COLUMN {}",
                table.quoted(),
                column.quoted()
            ),
            vec![],
        ),

        Operation::CreateIndex {
            table,
            name,
            columns,
            unique,
            method,
        } => {
            let unique = if *unique { "UNIQUE " } else { "" };
            let cols: Vec<String> = columns.iter().map(|c| c.quoted()).collect();
            let sql = match db {
                DatabaseType::PostgreSQL => format!(
                    "CREATE {}INDEX {} ON {} USING {} ({})",
                    unique,
                    name.quoted(),
                    table.quoted(),
                    method.as_sql(),
                    cols.join(", ")
                ),
                // SQLite qualifies the index name, not the table
                DatabaseType::SQLite => format!(
                    "CREATE {}INDEX {}.{} ON {} ({})",
                    unique,
                    table.schema.quoted(),
                    name.quoted(),
                    table.name.quoted(),
                    cols.join(", ")
                ),
            };
            Plan::command(
                format!("Index '{}' created on '{}'", name, table),
                sql,
                vec![],
            )
        }

        Operation::DropIndex { schema, name } => Plan::command(
            format!("Index '{}.{}' dropped", schema, name),
            format!("DROP INDEX {}.{}", schema.quoted(), name.quoted()),
            vec![],
        ),

        Operation::AddForeignKey {
            table,
            constraint,
            foreign_key,
        } => {
            require_postgres(db, request.name)?;
            Plan::command(
                format!("Foreign key '{}' added to '{}'", constraint, table),
                format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} {}",
                    table.quoted(),
                    constraint.quoted(),
                    foreign_key.to_sql(true)
                ),
                vec![],
            )
        }

        Operation::TruncateTable { table, cascade } => {
            let sql = match db {
                DatabaseType::PostgreSQL => {
                    let mut sql = format!("TRUNCATE TABLE {}", table.quoted());
                    if *cascade {
                        sql.push_str(" CASCADE");
                    }
                    sql
                }
                DatabaseType::SQLite => format!("DELETE FROM {}", table.quoted()),
            };
            Plan::command(format!("Table '{}' truncated", table), sql, vec![])
        }

        Operation::DeleteRows { table, filters } => {
            let mut sql = format!("DELETE FROM {}", table.quoted());
            let mut params = Vec::new();
            let mut conditions = Vec::with_capacity(filters.len());
            for (column, value) in filters {
                if value.is_null() {
                    conditions.push(format!("{} IS NULL", column.quoted()));
                } else {
                    params.push(value.clone());
                    conditions.push(format!(
                        "{} = {}",
                        column.quoted(),
                        placeholder(db, params.len())
                    ));
                }
            }
            if !conditions.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&conditions.join(" AND "));
            }
            Plan::command(format!("Rows deleted from '{}'", table), sql, params)
        }

        Operation::ExecuteQuery {
            sql,
            params,
            analysis,
        } => {
            if analysis.wrappable {
                Plan::rows("Query results", wrap_select(sql, max_rows), params.clone())
            } else if analysis.returns_rows {
                Plan::rows(
                    format!("{} results", analysis.label),
                    sql.trim().to_string(),
                    params.clone(),
                )
            } else {
                Plan::command(
                    format!("{} executed", analysis.label),
                    sql.trim().to_string(),
                    params.clone(),
                )
            }
        }

        Operation::ListTables { schema } => match db {
            DatabaseType::PostgreSQL => Plan::rows(
                format!("Tables in schema '{}'", schema),
                bounded(
                    "SELECT table_name::text AS table_name, table_type::text AS table_type
FROM information_schema.tables
WHERE table_schema = $1
ORDER BY table_name",
                    max_rows,
                ),
                vec![QueryParam::String(schema.to_string())],
            ),
            DatabaseType::SQLite => Plan::rows(
                format!("Tables in schema '{}'", schema),
                bounded(
                    &format!(
                        "SELECT name AS table_name, type AS table_type
FROM {}.sqlite_master
WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
ORDER BY name",
                        schema.quoted()
                    ),
                    max_rows,
                ),
                vec![],
            ),
        },

        Operation::DescribeTable { table } => match db {
            DatabaseType::PostgreSQL => Plan::rows(
                format!("Structure of '{}'", table),
                bounded(
                    "SELECT
    a.attname::text AS column_name,
    format_type(a.atttypid, a.atttypmod) AS data_type,
    CASE WHEN a.attnotnull THEN 'NO' ELSE 'YES' END AS is_nullable,
    pg_get_expr(d.adbin, d.adrelid) AS column_default
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum",
                    max_rows,
                ),
                table_params(table),
            ),
            DatabaseType::SQLite => Plan::rows(
                format!("Structure of '{}'", table),
                bounded(
                    "SELECT
    name AS column_name,
    type AS data_type,
    CASE WHEN \"notnull\" = 1 THEN 'NO' ELSE 'YES' END AS is_nullable,
    dflt_value AS column_default
FROM pragma_table_info(?2, ?1)
ORDER BY cid",
                    max_rows,
                ),
                table_params(table),
            ),
        },

        Operation::TableStatistics { table } => match db {
            DatabaseType::PostgreSQL => Plan::rows(
                format!("Statistics for '{}'", table),
                bounded(
                    &format!(
                        "SELECT
    (SELECT COUNT(*) FROM {table}) AS row_count,
    pg_size_pretty(pg_total_relation_size($1::regclass)) AS total_size,
    pg_size_pretty(pg_relation_size($1::regclass)) AS table_size,
    pg_size_pretty(pg_indexes_size($1::regclass)) AS indexes_size",
                        table = table.quoted()
                    ),
                    max_rows,
                ),
                vec![QueryParam::String(table.quoted())],
            ),
            DatabaseType::SQLite => Plan::rows(
                format!("Statistics for '{}'", table),
                bounded(
                    &format!("SELECT COUNT(*) AS row_count FROM {}", table.quoted()),
                    max_rows,
                ),
                vec![],
            ),
        },

        Operation::ColumnStatistics { table, column } => Plan::rows(
            format!("Statistics for column '{}'", column),
            bounded(
                &format!(
                    "SELECT
    COUNT(*) AS total_rows,
    COUNT({col}) AS non_null_count,
    COUNT(DISTINCT {col}) AS distinct_count
FROM {table}",
                    col = column.quoted(),
                    table = table.quoted()
                ),
                max_rows,
            ),
            vec![],
        ),

        Operation::GetIndexes { table } => match db {
            DatabaseType::PostgreSQL => Plan::rows(
                format!("Indexes for '{}'", table),
                bounded(
                    "SELECT
    indexname::text AS index_name,
    indexdef AS definition,
    pg_size_pretty(pg_relation_size(format('%I.%I', schemaname, indexname)::regclass)) AS index_size
FROM pg_catalog.pg_indexes
WHERE schemaname = $1 AND tablename = $2
ORDER BY indexname",
                    max_rows,
                ),
                table_params(table),
            ),
            DatabaseType::SQLite => Plan::rows(
                format!("Indexes for '{}'", table),
                bounded(
                    &format!(
                        "SELECT il.name AS index_name, il.\"unique\" AS is_unique, il.origin AS origin, m.sql AS definition
FROM pragma_index_list(?2, ?1) il
LEFT JOIN {}.sqlite_master m ON m.type = 'index' AND m.name = il.name
ORDER BY il.name",
                        table.schema.quoted()
                    ),
                    max_rows,
                ),
                table_params(table),
            ),
        },

        Operation::DatabaseSummary { schema } => match db {
            DatabaseType::PostgreSQL => Plan::rows(
                "Database summary",
                bounded(
                    "SELECT
    current_database()::text AS database_name,
    pg_size_pretty(pg_database_size(current_database())) AS total_size,
    (SELECT count(*) FROM information_schema.tables WHERE table_schema = $1 AND table_type = 'BASE TABLE') AS table_count,
    (SELECT count(*) FROM information_schema.views WHERE table_schema = $1) AS view_count,
    (SELECT count(*) FROM pg_catalog.pg_indexes WHERE schemaname = $1) AS index_count,
    version() AS server_version",
                    max_rows,
                ),
                vec![QueryParam::String(schema.to_string())],
            ),
            DatabaseType::SQLite => Plan::rows(
                "Database summary",
                bounded(
                    &format!(
                        "SELECT
    (SELECT count(*) FROM {s}.sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%') AS table_count,
    (SELECT count(*) FROM {s}.sqlite_master WHERE type = 'view') AS view_count,
    (SELECT count(*) FROM {s}.sqlite_master WHERE type = 'index') AS index_count,
    (SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()) AS total_bytes,
    sqlite_version() AS server_version",
                        s = schema.quoted()
                    ),
                    max_rows,
                ),
                vec![],
            ),
        },
    };

    Ok(plan)
}

/// `(schema, table)` parameters in that order.
fn table_params(table: &TableRef) -> Vec<QueryParam> {
    vec![
        QueryParam::String(table.schema.to_string()),
        QueryParam::String(table.name.to_string()),
    ]
}

fn require_postgres(db: DatabaseType, operation: &str) -> DbResult<()> {
    match db {
        DatabaseType::PostgreSQL => Ok(()),
        DatabaseType::SQLite => Err(DbError::invalid_argument(
            "operation",
            format!("{} is not supported on SQLite", operation),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ColumnSpec, DataType, ForeignKeySpec, Ident, IndexMethod, OperationClass, QueryAnalysis,
        ReferentialAction,
    };

    fn ident(v: &str) -> Ident {
        Ident::parse("test", v).unwrap()
    }

    fn table(schema: &str, name: &str) -> TableRef {
        TableRef::new(ident(schema), ident(name))
    }

    fn pg() -> InstanceConfig {
        let mut config = InstanceConfig::new(
            "pi",
            DatabaseType::PostgreSQL,
            "postgres://localhost/shop",
            Some("shop".to_string()),
        );
        config.max_rows = 10;
        config
    }

    fn lite() -> InstanceConfig {
        let mut config = InstanceConfig::new(
            "local",
            DatabaseType::SQLite,
            "sqlite::memory:",
            Some("memory".to_string()),
        );
        config.max_rows = 10;
        config
    }

    fn request(name: &'static str, operation: Operation) -> OperationRequest {
        OperationRequest {
            name,
            database: None,
            operation,
        }
    }

    fn column(name: &str, ty: &str) -> ColumnSpec {
        ColumnSpec {
            name: ident(name),
            data_type: DataType::parse("type", ty).unwrap(),
            nullable: true,
            primary_key: false,
            unique: false,
            default: None,
            check: None,
        }
    }

    #[test]
    fn test_create_table_with_foreign_key() {
        let mut id = column("id", "serial");
        id.primary_key = true;
        let op = Operation::CreateTable {
            table: table("public", "orders"),
            columns: vec![id, column("customer_id", "integer")],
            foreign_keys: vec![ForeignKeySpec {
                column: ident("customer_id"),
                references: table("public", "customers"),
                references_column: ident("id"),
                on_delete: Some(ReferentialAction::Cascade),
                on_update: None,
            }],
        };
        let plan = plan(&request("create_table", op), &pg()).unwrap();
        assert_eq!(
            plan.statement.sql,
            "CREATE TABLE \"public\".\"orders\" (\n    \"id\" serial PRIMARY KEY,\n    \"customer_id\" integer,\n    FOREIGN KEY (\"customer_id\") REFERENCES \"public\".\"customers\" (\"id\") ON DELETE CASCADE\n)"
        );
        assert_eq!(plan.statement.kind, StatementKind::Command);
        assert!(plan.database.is_none());
    }

    #[test]
    fn test_server_level_operations_use_maintenance_database() {
        let plan_list = plan(&request("list_databases", Operation::ListDatabases), &pg()).unwrap();
        assert_eq!(plan_list.database.as_deref(), Some("postgres"));
        assert!(plan_list.statement.sql.ends_with("LIMIT 11"));

        let drop = Operation::DropDatabase {
            name: ident("scratch"),
        };
        let plan_drop = plan(&request("drop_database", drop), &pg()).unwrap();
        assert_eq!(plan_drop.statement.sql, "DROP DATABASE \"scratch\"");
        assert_eq!(plan_drop.database.as_deref(), Some("postgres"));
        assert_eq!(plan_drop.evict.as_deref(), Some("scratch"));
    }

    #[test]
    fn test_drop_maintenance_database_rejected() {
        let drop = Operation::DropDatabase {
            name: ident("postgres"),
        };
        assert!(plan(&request("drop_database", drop), &pg()).is_err());
    }

    #[test]
    fn test_create_database_rejected_on_sqlite() {
        let op = Operation::CreateDatabase {
            name: ident("x"),
            owner: None,
            encoding: "UTF8".to_string(),
        };
        let err = plan(&request("create_database", op), &lite()).unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument { .. }));
    }

    #[test]
    fn test_create_index_per_dialect() {
        let op = Operation::CreateIndex {
            table: table("public", "orders"),
            name: ident("idx_orders_created_at"),
            columns: vec![ident("created_at")],
            unique: true,
            method: IndexMethod::Btree,
        };
        let plan_pg = plan(&request("create_index", op), &pg()).unwrap();
        assert_eq!(
            plan_pg.statement.sql,
            "CREATE UNIQUE INDEX \"idx_orders_created_at\" ON \"public\".\"orders\" USING btree (\"created_at\")"
        );

        let op = Operation::CreateIndex {
            table: table("main", "orders"),
            name: ident("idx_orders_created_at"),
            columns: vec![ident("created_at"), ident("id")],
            unique: false,
            method: IndexMethod::Btree,
        };
        let plan_lite = plan(&request("create_index", op), &lite()).unwrap();
        assert_eq!(
            plan_lite.statement.sql,
            "CREATE INDEX \"main\".\"idx_orders_created_at\" ON \"orders\" (\"created_at\", \"id\")"
        );
    }

    #[test]
    fn test_delete_rows_binds_filters() {
        let op = Operation::DeleteRows {
            table: table("public", "orders"),
            filters: vec![
                (ident("status"), QueryParam::String("void".to_string())),
                (ident("shipped_at"), QueryParam::Null),
                (ident("id"), QueryParam::Int(7)),
            ],
        };
        let plan_pg = plan(&request("delete_rows", op.clone()), &pg()).unwrap();
        assert_eq!(
            plan_pg.statement.sql,
            "DELETE FROM \"public\".\"orders\" WHERE \"status\" = $1 AND \"shipped_at\" IS NULL AND \"id\" = $2"
        );
        assert_eq!(
            plan_pg.statement.params,
            vec![QueryParam::String("void".to_string()), QueryParam::Int(7)]
        );

        let plan_lite = plan(&request("delete_rows", op), &lite()).unwrap();
        assert!(plan_lite.statement.sql.ends_with("\"id\" = ?2"));
    }

    #[test]
    fn test_delete_all_rows_has_no_where() {
        let op = Operation::DeleteRows {
            table: table("public", "orders"),
            filters: vec![],
        };
        let plan = plan(&request("delete_rows", op), &pg()).unwrap();
        assert_eq!(plan.statement.sql, "DELETE FROM \"public\".\"orders\"");
    }

    #[test]
    fn test_execute_query_select_is_wrapped() {
        let op = Operation::ExecuteQuery {
            sql: "SELECT * FROM orders;  ".to_string(),
            params: vec![],
            analysis: QueryAnalysis {
                class: OperationClass::Read,
                label: "SELECT".to_string(),
                schemas: vec!["public".to_string()],
                targets_resolved: true,
                wrappable: true,
                returns_rows: true,
            },
        };
        let plan = plan(&request("execute_query", op), &pg()).unwrap();
        assert_eq!(
            plan.statement.sql,
            "SELECT * FROM (\nSELECT * FROM orders\n) AS bounded_result LIMIT 11"
        );
        assert_eq!(plan.statement.kind, StatementKind::Rows);
    }

    #[test]
    fn test_execute_query_write_is_command() {
        let op = Operation::ExecuteQuery {
            sql: "INSERT INTO orders (id) VALUES ($1)".to_string(),
            params: vec![QueryParam::Int(1)],
            analysis: QueryAnalysis {
                class: OperationClass::Write,
                label: "INSERT".to_string(),
                schemas: vec!["public".to_string()],
                targets_resolved: true,
                wrappable: false,
                returns_rows: false,
            },
        };
        let plan = plan(&request("execute_query", op), &pg()).unwrap();
        assert_eq!(plan.statement.kind, StatementKind::Command);
        assert_eq!(plan.statement.params, vec![QueryParam::Int(1)]);
    }

    #[test]
    fn test_truncate_per_dialect() {
        let op = Operation::TruncateTable {
            table: table("public", "orders"),
            cascade: true,
        };
        assert_eq!(
            plan(&request("truncate_table", op), &pg())
                .unwrap()
                .statement
                .sql,
            "TRUNCATE TABLE \"public\".\"orders\" CASCADE"
        );

        let op = Operation::TruncateTable {
            table: table("main", "orders"),
            cascade: false,
        };
        assert_eq!(
            plan(&request("truncate_table", op), &lite())
                .unwrap()
                .statement
                .sql,
            "DELETE FROM \"main\".\"orders\""
        );
    }

    #[test]
    fn test_catalog_queries_bind_names() {
        let op = Operation::DescribeTable {
            table: table("public", "orders"),
        };
        let plan = plan(&request("describe_table", op), &pg()).unwrap();
        assert!(!plan.statement.sql.contains("orders"));
        assert_eq!(
            plan.statement.params,
            vec![
                QueryParam::String("public".to_string()),
                QueryParam::String("orders".to_string())
            ]
        );
    }
}
