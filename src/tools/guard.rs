//! SQL statement analysis for `execute_query` and expression arguments.
//!
//! Statements are classified from the sqlparser AST, never from keywords in
//! the raw text, so comments, formatting and string literals cannot change
//! the outcome.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, OperationClass, QueryAnalysis};
use sqlparser::ast::{
    AlterSchemaOperation, AlterTableOperation, CommentObject, GrantObjects, ObjectName,
    ObjectType, Query, SchemaName, SelectItem, SetExpr, Statement, visit_relations,
};
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use std::ops::ControlFlow;

fn dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Parse and classify a single statement.
///
/// Rejects empty input, parse failures, multiple statements and statements
/// that change session or transaction state, since each invocation runs on
/// a shared cached connection.
pub fn analyze(sql: &str, db_type: DatabaseType) -> DbResult<QueryAnalysis> {
    if sql.trim().is_empty() {
        return Err(DbError::invalid_argument("query", "must not be empty"));
    }

    let statements = Parser::parse_sql(dialect(db_type).as_ref(), sql).map_err(|e| {
        DbError::invalid_argument("query", format!("Failed to parse SQL statement: {}", e))
    })?;

    let stmt = match statements.as_slice() {
        [] => return Err(DbError::invalid_argument("query", "must not be empty")),
        [stmt] => stmt,
        _ => {
            return Err(DbError::invalid_argument(
                "query",
                format!(
                    "expected exactly one statement, found {}",
                    statements.len()
                ),
            ));
        }
    };

    if let Some(kind) = session_statement(stmt) {
        return Err(DbError::invalid_argument(
            "query",
            format!("{} statements are not allowed", kind),
        ));
    }

    let class = classify_statement(stmt);
    let (wrappable, returns_rows) = match stmt {
        Statement::Query(query) => (
            class.is_read() && query.locks.is_empty(),
            true,
        ),
        s => (false, is_readonly_statement(s)),
    };

    let (schemas, targets_resolved) = referenced_schemas(stmt, db_type.default_schema());

    Ok(QueryAnalysis {
        class,
        label: statement_label(stmt),
        schemas,
        targets_resolved: class.is_read() || targets_resolved,
        wrappable,
        returns_rows,
    })
}

/// Name of a transaction or session statement, if `stmt` is one.
fn session_statement(stmt: &Statement) -> Option<&'static str> {
    match stmt {
        Statement::StartTransaction { .. } => Some("BEGIN"),
        Statement::Commit { .. } => Some("COMMIT"),
        Statement::Rollback { .. } => Some("ROLLBACK"),
        Statement::Savepoint { .. } => Some("SAVEPOINT"),
        Statement::ReleaseSavepoint { .. } => Some("RELEASE SAVEPOINT"),
        Statement::Set { .. } => Some("SET"),
        Statement::Use { .. } => Some("USE"),
        _ => None,
    }
}

/// Check if a single statement only reads.
fn is_readonly_statement(stmt: &Statement) -> bool {
    matches!(
        stmt,
        Statement::Query(_)
            | Statement::Explain { .. }
            | Statement::ExplainTable { .. }
            | Statement::ShowCreate { .. }
            | Statement::ShowTables { .. }
            | Statement::ShowColumns { .. }
            | Statement::ShowDatabases { .. }
            | Statement::ShowSchemas { .. }
            | Statement::ShowFunctions { .. }
            | Statement::ShowVariable { .. }
            | Statement::ShowVariables { .. }
            | Statement::ShowStatus { .. }
            | Statement::ShowCollation { .. }
    )
}

fn rank(class: OperationClass) -> u8 {
    match class {
        OperationClass::Read => 0,
        OperationClass::Write => 1,
        OperationClass::Destructive => 2,
    }
}

fn max_class(a: OperationClass, b: OperationClass) -> OperationClass {
    if rank(b) > rank(a) { b } else { a }
}

fn classify_statement(stmt: &Statement) -> OperationClass {
    match stmt {
        Statement::Query(query) => classify_query(query),
        // EXPLAIN ANALYZE runs the statement
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                classify_statement(statement)
            } else {
                OperationClass::Read
            }
        }
        s if is_readonly_statement(s) => OperationClass::Read,
        s => match destructive_label(s) {
            Some(_) => OperationClass::Destructive,
            None => OperationClass::Write,
        },
    }
}

fn classify_query(query: &Query) -> OperationClass {
    let mut class = OperationClass::Read;
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            class = max_class(class, classify_query(&cte.query));
        }
    }
    max_class(class, classify_set_expr(&query.body))
}

fn classify_set_expr(body: &SetExpr) -> OperationClass {
    match body {
        SetExpr::Select(select) => {
            // SELECT ... INTO creates a table
            if select.into.is_some() {
                OperationClass::Write
            } else {
                OperationClass::Read
            }
        }
        SetExpr::Query(query) => classify_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            max_class(classify_set_expr(left), classify_set_expr(right))
        }
        SetExpr::Values(_) | SetExpr::Table(_) => OperationClass::Read,
        SetExpr::Insert(stmt)
        | SetExpr::Update(stmt)
        | SetExpr::Delete(stmt)
        | SetExpr::Merge(stmt) => classify_statement(stmt),
    }
}

/// Preview label of a destructive statement, `None` for anything else.
///
/// Every DROP counts, whatever the object, since CASCADE reaches dependent
/// objects.
fn destructive_label(stmt: &Statement) -> Option<String> {
    let label = match stmt {
        Statement::Drop { object_type, .. } => format!("DROP {}", object_type).to_uppercase(),
        Statement::DropFunction(_) => "DROP FUNCTION".to_string(),
        Statement::DropProcedure { .. } => "DROP PROCEDURE".to_string(),
        Statement::DropTrigger(_) => "DROP TRIGGER".to_string(),
        Statement::DropDomain(_) => "DROP DOMAIN".to_string(),
        Statement::DropExtension(_) => "DROP EXTENSION".to_string(),
        Statement::DropPolicy { .. } => "DROP POLICY".to_string(),
        Statement::DropOperator(_)
        | Statement::DropOperatorFamily(_)
        | Statement::DropOperatorClass(_) => "DROP OPERATOR".to_string(),
        Statement::DropSecret { .. } | Statement::DropConnector { .. } => "DROP".to_string(),
        Statement::AlterTable(alter_table)
            if alter_table.operations.iter().any(is_drop_operation) =>
        {
            "ALTER TABLE DROP".to_string()
        }
        Statement::Truncate { .. } => "TRUNCATE".to_string(),
        Statement::Delete(delete) if delete.selection.is_none() => {
            "DELETE without WHERE".to_string()
        }
        Statement::Update(update) if update.selection.is_none() => {
            "UPDATE without WHERE".to_string()
        }
        _ => return None,
    };
    Some(label)
}

fn is_drop_operation(op: &AlterTableOperation) -> bool {
    matches!(
        op,
        AlterTableOperation::DropColumn { .. }
            | AlterTableOperation::DropConstraint { .. }
            | AlterTableOperation::DropPrimaryKey { .. }
            | AlterTableOperation::DropForeignKey { .. }
            | AlterTableOperation::DropIndex { .. }
            | AlterTableOperation::DropPartitions { .. }
            | AlterTableOperation::DropProjection { .. }
            | AlterTableOperation::DropClusteringKey
    )
}

fn statement_label(stmt: &Statement) -> String {
    if let Some(label) = destructive_label(stmt) {
        return label;
    }
    stmt.to_string()
        .split_whitespace()
        .next()
        .unwrap_or("SQL")
        .to_uppercase()
}

/// Schemas of every object the statement names.
///
/// Unqualified names count as `default_schema`. For three-part names the
/// middle part is the schema. The flag is false when the statement writes
/// to objects this function cannot map to a schema.
fn referenced_schemas(stmt: &Statement, default_schema: &str) -> (Vec<String>, bool) {
    let mut schemas: Vec<String> = Vec::new();
    let mut add = |schema: String| {
        if !schemas.contains(&schema) {
            schemas.push(schema);
        }
    };

    let _ = visit_relations(stmt, |name: &ObjectName| {
        add(relation_schema(name, default_schema));
        ControlFlow::<()>::Continue(())
    });

    let mut targets = Vec::new();
    let resolved = write_targets(stmt, default_schema, &mut targets);
    for schema in targets {
        add(schema);
    }

    (schemas, resolved)
}

/// Collect the schemas of objects a statement creates, changes or drops
/// beyond the relations the visitor reports. Returns false for statement
/// kinds whose targets are not known here.
fn write_targets(stmt: &Statement, default_schema: &str, out: &mut Vec<String>) -> bool {
    let mut relation = |name: &ObjectName| out.push(relation_schema(name, default_schema));
    match stmt {
        // targets are relations the visitor already reports
        Statement::Insert(_)
        | Statement::Update(_)
        | Statement::Delete(_)
        | Statement::Merge { .. }
        | Statement::Truncate { .. }
        | Statement::CreateTable(_)
        | Statement::CreateIndex(_)
        | Statement::AlterView { .. }
        | Statement::Analyze(_) => {}
        Statement::Query(query) => select_into_targets(query, &mut relation),
        Statement::Explain { statement, .. } => {
            return write_targets(statement, default_schema, out);
        }
        Statement::AlterTable(alter_table) => relation(&alter_table.name),
        Statement::Drop {
            object_type, names, ..
        } => match object_type {
            ObjectType::Schema => out.extend(names.iter().filter_map(schema_name)),
            ObjectType::Database => {}
            _ => names.iter().for_each(&mut relation),
        },
        Statement::DropFunction(function) => {
            function.func_desc.iter().for_each(|f| relation(&f.name))
        }
        Statement::DropProcedure { proc_desc, .. } => {
            proc_desc.iter().for_each(|f| relation(&f.name))
        }
        Statement::DropTrigger(trigger) => match &trigger.table_name {
            Some(table) => relation(table),
            None => relation(&trigger.trigger_name),
        },
        Statement::DropDomain(domain) => relation(&domain.name),
        Statement::CreateView(view) => relation(&view.name),
        Statement::CreateFunction(function) => relation(&function.name),
        Statement::CreateSequence { name, .. }
        | Statement::CreateType { name, .. }
        | Statement::AlterIndex { name, .. } => relation(name),
        Statement::CreateDomain(domain) => relation(&domain.name),
        Statement::AlterType(alter) => relation(&alter.name),
        Statement::CreateSchema {
            schema_name: created,
            ..
        } => match created {
            SchemaName::Simple(name) | SchemaName::NamedAuthorization(name, _) => {
                out.extend(schema_name(name))
            }
            SchemaName::UnnamedAuthorization(_) => return false,
        },
        Statement::AlterSchema(alter) => {
            out.extend(schema_name(&alter.name));
            for op in &alter.operations {
                if let AlterSchemaOperation::Rename { name } = op {
                    out.extend(schema_name(name));
                }
            }
        }
        Statement::Comment {
            object_type,
            object_name,
            ..
        } => match object_type {
            CommentObject::Table => relation(object_name),
            CommentObject::Column => {
                let parts = name_parts(object_name);
                out.push(match parts.len() {
                    0..=2 => default_schema.to_string(),
                    n => parts[n - 3].clone(),
                });
            }
            CommentObject::Schema => out.extend(schema_name(object_name)),
            _ => return false,
        },
        Statement::Grant { objects, .. } | Statement::Revoke { objects, .. } => {
            return match objects {
                Some(objects) => grant_targets(objects, default_schema, out),
                None => false,
            };
        }
        Statement::CreateDatabase { .. } => {}
        _ => return false,
    }
    true
}

fn grant_targets(objects: &GrantObjects, default_schema: &str, out: &mut Vec<String>) -> bool {
    match objects {
        GrantObjects::Tables(names)
        | GrantObjects::Views(names)
        | GrantObjects::Sequences(names) => {
            out.extend(names.iter().map(|n| relation_schema(n, default_schema)));
        }
        GrantObjects::Schemas(names)
        | GrantObjects::AllTablesInSchema { schemas: names }
        | GrantObjects::AllSequencesInSchema { schemas: names }
        | GrantObjects::AllViewsInSchema { schemas: names }
        | GrantObjects::AllFunctionsInSchema { schemas: names } => {
            out.extend(names.iter().filter_map(schema_name));
        }
        GrantObjects::Function { name, .. } | GrantObjects::Procedure { name, .. } => {
            out.push(relation_schema(name, default_schema));
        }
        _ => return false,
    }
    true
}

/// `SELECT ... INTO` targets anywhere in the query tree.
fn select_into_targets(query: &Query, relation: &mut impl FnMut(&ObjectName)) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            select_into_targets(&cte.query, relation);
        }
    }
    set_expr_into_targets(&query.body, relation);
}

fn set_expr_into_targets(body: &SetExpr, relation: &mut impl FnMut(&ObjectName)) {
    match body {
        SetExpr::Select(select) => {
            if let Some(into) = &select.into {
                relation(&into.name);
            }
        }
        SetExpr::Query(query) => select_into_targets(query, relation),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_into_targets(left, relation);
            set_expr_into_targets(right, relation);
        }
        _ => {}
    }
}

/// Schema named by a schema-level object name: its last part.
fn schema_name(name: &ObjectName) -> Option<String> {
    name_parts(name).pop()
}

fn relation_schema(name: &ObjectName, default_schema: &str) -> String {
    let mut parts = name_parts(name);
    match parts.len() {
        0 | 1 => default_schema.to_string(),
        2 => parts.swap_remove(0),
        n => parts.swap_remove(n - 2),
    }
}

/// Split a rendered object name into normalized parts.
///
/// Quoted parts keep their case; unquoted parts fold to lower case the way
/// PostgreSQL folds them.
fn name_parts(name: &ObjectName) -> Vec<String> {
    let rendered = name.to_string();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut quoted_part = false;
    let mut chars = rendered.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                let close = if q == '[' { ']' } else { q };
                if c == close {
                    // doubled quote is an escaped quote character
                    if chars.peek() == Some(&close) && q != '[' {
                        current.push(close);
                        chars.next();
                    } else {
                        quote = None;
                    }
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '"' | '`' | '[' => {
                    quote = Some(c);
                    quoted_part = true;
                }
                '.' => {
                    parts.push(finish_part(&mut current, quoted_part));
                    quoted_part = false;
                }
                _ => current.push(c),
            },
        }
    }
    parts.push(finish_part(&mut current, quoted_part));
    parts
}

fn finish_part(current: &mut String, quoted: bool) -> String {
    let part = std::mem::take(current);
    if quoted { part } else { part.to_lowercase() }
}

/// Validate a `default` or `check` expression and return its canonical text.
///
/// The text must parse as exactly one scalar expression; anything that
/// would extend the surrounding statement is rejected.
pub fn parse_expression(field: &str, text: &str, db_type: DatabaseType) -> DbResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DbError::invalid_argument(field, "must not be empty"));
    }
    let invalid = |reason: String| DbError::invalid_argument(field, reason);

    let statements = Parser::parse_sql(dialect(db_type).as_ref(), &format!("SELECT {}", text))
        .map_err(|e| invalid(format!("not a valid SQL expression: {}", e)))?;

    let [Statement::Query(query)] = statements.as_slice() else {
        return Err(invalid("must be a single SQL expression".to_string()));
    };
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(invalid("must be a single SQL expression".to_string()));
    };
    let [SelectItem::UnnamedExpr(expr)] = select.projection.as_slice() else {
        return Err(invalid("must be a single SQL expression".to_string()));
    };

    let rendered = expr.to_string();
    // Anything beyond the projection (FROM, WHERE, ...) changes the rendering
    if query.to_string() != format!("SELECT {}", rendered) {
        return Err(invalid("must be a single SQL expression".to_string()));
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg(sql: &str) -> QueryAnalysis {
        analyze(sql, DatabaseType::PostgreSQL).unwrap()
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn test_select_is_read_and_wrappable() {
        let a = pg("SELECT id, total FROM orders WHERE total > $1");
        assert_eq!(a.class, OperationClass::Read);
        assert!(a.wrappable);
        assert!(a.returns_rows);
        assert_eq!(a.label, "SELECT");
        assert_eq!(a.schemas, vec!["public"]);
    }

    #[test]
    fn test_select_for_update_not_wrapped() {
        let a = pg("SELECT * FROM orders FOR UPDATE");
        assert_eq!(a.class, OperationClass::Read);
        assert!(!a.wrappable);
    }

    #[test]
    fn test_explain_and_show_are_read() {
        let a = pg("EXPLAIN SELECT * FROM orders");
        assert_eq!(a.class, OperationClass::Read);
        assert!(a.returns_rows);
        assert!(!a.wrappable);

        let a = pg("SHOW search_path");
        assert_eq!(a.class, OperationClass::Read);
        assert!(a.returns_rows);
    }

    #[test]
    fn test_explain_analyze_takes_inner_class() {
        let a = pg("EXPLAIN ANALYZE DELETE FROM orders");
        assert_eq!(a.class, OperationClass::Destructive);
    }

    #[test]
    fn test_insert_is_write() {
        let a = pg("INSERT INTO orders (id) VALUES (1)");
        assert_eq!(a.class, OperationClass::Write);
        assert!(!a.returns_rows);
        assert_eq!(a.label, "INSERT");
    }

    #[test]
    fn test_destructive_statements() {
        for sql in [
            "DROP TABLE orders",
            "DROP TABLE IF EXISTS orders",
            "DROP INDEX idx_orders",
            "DROP DATABASE shop",
            "TRUNCATE orders",
            "TRUNCATE TABLE orders",
            "DELETE FROM orders",
            "UPDATE orders SET total = 0",
            "ALTER TABLE orders DROP COLUMN total",
            "/* cleanup */ DELETE FROM orders",
            "DELETE\n  FROM\n    orders",
            "DROP VIEW public.v",
            "DROP MATERIALIZED VIEW mv",
            "DROP SEQUENCE s",
            "DROP TYPE mood CASCADE",
            "DROP FUNCTION f CASCADE",
            "DROP TRIGGER audit_orders ON orders",
            "DROP SCHEMA audit CASCADE",
            "ALTER TABLE orders DROP CONSTRAINT orders_total_check",
        ] {
            assert_eq!(pg(sql).class, OperationClass::Destructive, "{}", sql);
        }
    }

    #[test]
    fn test_data_modifying_ctes() {
        let a = pg("WITH d AS (DELETE FROM orders RETURNING *) SELECT * FROM d");
        assert_eq!(a.class, OperationClass::Destructive);
        assert!(!a.wrappable);

        let a = pg("WITH d AS (DELETE FROM orders WHERE id = 1 RETURNING *) SELECT * FROM d");
        assert_eq!(a.class, OperationClass::Write);

        let a = pg("WITH u AS (UPDATE orders SET total = 0 RETURNING id) SELECT count(*) FROM u");
        assert_eq!(a.class, OperationClass::Destructive);
        assert_eq!(a.schemas, vec!["public"]);

        let a = pg("WITH i AS (INSERT INTO audit.log (id) VALUES (1) RETURNING id) SELECT * FROM i");
        assert_eq!(a.class, OperationClass::Write);
        assert!(a.schemas.contains(&"audit".to_string()));
    }

    #[test]
    fn test_filtered_dml_is_write() {
        assert_eq!(
            pg("DELETE FROM orders WHERE id = 1").class,
            OperationClass::Write
        );
        assert_eq!(
            pg("UPDATE orders SET total = 0 WHERE id = 1").class,
            OperationClass::Write
        );
        assert_eq!(
            pg("ALTER TABLE orders ADD COLUMN note text").class,
            OperationClass::Write
        );
    }

    #[test]
    fn test_string_literal_not_flagged() {
        let a = pg("SELECT 'DROP TABLE orders' AS text");
        assert_eq!(a.class, OperationClass::Read);
    }

    #[test]
    fn test_select_into_is_write() {
        let a = pg("SELECT * INTO archive FROM orders");
        assert_eq!(a.class, OperationClass::Write);
        assert!(!a.wrappable);
    }

    // =========================================================================
    // Rejections
    // =========================================================================

    #[test]
    fn test_rejected_inputs() {
        for sql in [
            "",
            "   ",
            "SELEC * FROM",
            "SELECT 1; SELECT 2",
            "SELECT 1; DROP TABLE orders",
            "BEGIN",
            "COMMIT",
            "ROLLBACK",
            "SAVEPOINT sp1",
            "SET search_path TO sales",
        ] {
            let err = analyze(sql, DatabaseType::PostgreSQL).unwrap_err();
            assert!(
                matches!(err, DbError::InvalidArgument { ref field, .. } if field == "query"),
                "{}",
                sql
            );
        }
    }

    // =========================================================================
    // Referenced schemas
    // =========================================================================

    #[test]
    fn test_schemas_from_relations() {
        let a = pg("SELECT * FROM sales.orders o JOIN customers c ON c.id = o.customer_id");
        assert_eq!(a.schemas, vec!["sales", "public"]);
    }

    #[test]
    fn test_schemas_quoted_and_three_part() {
        let a = pg("SELECT * FROM \"Sales\".orders, shop.Archive.items");
        assert_eq!(a.schemas, vec!["Sales", "archive"]);
    }

    #[test]
    fn test_schemas_from_drop_and_alter() {
        assert_eq!(pg("DROP TABLE audit.log").schemas, vec!["audit"]);
        assert!(pg("DROP SCHEMA audit").schemas.contains(&"audit".to_string()));
        assert_eq!(
            pg("ALTER TABLE audit.log ADD COLUMN note text").schemas,
            vec!["audit"]
        );
    }

    #[test]
    fn test_schemas_from_write_targets() {
        for (sql, schema) in [
            ("CREATE VIEW secret.v AS SELECT 1", "secret"),
            ("CREATE SCHEMA secret", "secret"),
            ("ALTER SCHEMA secret RENAME TO other", "secret"),
            ("ALTER SCHEMA public RENAME TO secret", "secret"),
            ("COMMENT ON TABLE secret.t IS 'x'", "secret"),
            ("COMMENT ON COLUMN secret.t.c IS 'x'", "secret"),
            ("COMMENT ON SCHEMA secret IS 'x'", "secret"),
            ("GRANT SELECT ON secret.t TO bob", "secret"),
            ("REVOKE SELECT ON secret.t FROM bob", "secret"),
            ("GRANT USAGE ON SCHEMA secret TO bob", "secret"),
            ("CREATE SEQUENCE secret.s", "secret"),
            ("DROP VIEW secret.v", "secret"),
            ("DROP FUNCTION secret.f CASCADE", "secret"),
            ("SELECT * INTO secret.snapshot FROM orders", "secret"),
        ] {
            let a = pg(sql);
            assert!(a.targets_resolved, "{}", sql);
            assert!(a.schemas.contains(&schema.to_string()), "{}: {:?}", sql, a.schemas);
        }
    }

    #[test]
    fn test_unknown_write_targets_unresolved() {
        for sql in [
            "COMMENT ON EXTENSION hstore IS 'x'",
            "CREATE SCHEMA AUTHORIZATION bob",
            "CREATE EXTENSION hstore",
        ] {
            let a = pg(sql);
            assert_ne!(a.class, OperationClass::Read, "{}", sql);
            assert!(!a.targets_resolved, "{}", sql);
        }
        assert!(pg("SELECT 1").targets_resolved);
        assert!(pg("INSERT INTO orders (id) VALUES (1)").targets_resolved);
    }

    #[test]
    fn test_sqlite_default_schema() {
        let a = analyze("SELECT * FROM orders", DatabaseType::SQLite).unwrap();
        assert_eq!(a.schemas, vec!["main"]);
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    #[test]
    fn test_parse_expression_accepts_scalars() {
        let db = DatabaseType::PostgreSQL;
        assert_eq!(parse_expression("default", "0", db).unwrap(), "0");
        assert_eq!(parse_expression("default", "'pending'", db).unwrap(), "'pending'");
        assert_eq!(parse_expression("default", "now()", db).unwrap(), "now()");
        assert_eq!(
            parse_expression("check", "price >= 0", db).unwrap(),
            "price >= 0"
        );
    }

    #[test]
    fn test_parse_expression_rejects_injection() {
        let db = DatabaseType::PostgreSQL;
        for text in [
            "",
            "0); DROP TABLE orders; --",
            "0, 1",
            "1 FROM orders",
            "1 WHERE true",
            "1; SELECT 2",
        ] {
            let err = parse_expression("default", text, db).unwrap_err();
            assert!(
                matches!(err, DbError::InvalidArgument { ref field, .. } if field == "default"),
                "{}",
                text
            );
        }
    }

    // =========================================================================
    // Labels
    // =========================================================================

    #[test]
    fn test_destructive_labels() {
        assert_eq!(pg("DROP TABLE orders").label, "DROP TABLE");
        assert_eq!(pg("DROP MATERIALIZED VIEW mv").label, "DROP MATERIALIZED VIEW");
        assert_eq!(pg("DELETE FROM orders").label, "DELETE without WHERE");
        assert_eq!(pg("ALTER TABLE orders DROP COLUMN total").label, "ALTER TABLE DROP");
        assert_eq!(pg("DELETE FROM orders WHERE id = 1").label, "DELETE");
    }
}
