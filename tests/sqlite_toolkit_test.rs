//! End-to-end tests against real SQLite databases.
//!
//! Instances are configured the same way the CLI configures them and every
//! call goes through the full pipeline down to the sqlx driver.

use pg_admin_mcp::config::InstanceSpec;
use pg_admin_mcp::db::{Registry, SqlxConnector};
use pg_admin_mcp::error::{DbResult, ErrorKind};
use pg_admin_mcp::tools::{Dispatcher, take_confirm};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn dispatcher(spec: &str) -> Dispatcher {
    let instance = InstanceSpec::parse(spec, Duration::from_secs(5)).unwrap();
    let connector = Arc::new(SqlxConnector::new(Duration::from_secs(5)));
    let registry = Registry::new(vec![instance], connector).unwrap();
    Dispatcher::new(Arc::new(registry)).unwrap()
}

async fn call(dispatcher: &Dispatcher, tool: &str, args: Value) -> DbResult<String> {
    let Value::Object(mut args) = args else {
        panic!("arguments must be an object");
    };
    let confirmed = take_confirm(&mut args)?;
    dispatcher
        .handle(tool, args, confirmed, &CancellationToken::new())
        .await
}

async fn create_schema(d: &Dispatcher) {
    call(
        d,
        "local_create_table",
        json!({
            "table_name": "customers",
            "columns": [
                {"name": "id", "type": "integer", "primary_key": true},
                {"name": "name", "type": "text", "nullable": false}
            ]
        }),
    )
    .await
    .unwrap();

    call(
        d,
        "local_create_table",
        json!({
            "table_name": "orders",
            "columns": [
                {"name": "id", "type": "integer", "primary_key": true},
                {"name": "customer_id", "type": "integer", "nullable": false},
                {"name": "status", "type": "varchar(20)", "default": "'new'"},
                {"name": "total", "type": "numeric(10,2)", "default": 0, "check": "total >= 0"}
            ],
            "foreign_keys": [
                {"column": "customer_id", "references_table": "customers", "references_column": "id", "on_delete": "CASCADE"}
            ]
        }),
    )
    .await
    .unwrap();
}

async fn insert_customers(d: &Dispatcher, names: &[&str]) {
    for (i, name) in names.iter().enumerate() {
        call(
            d,
            "local_execute_query",
            json!({
                "query": "INSERT INTO customers (id, name) VALUES (?1, ?2)",
                "params": [i + 1, name]
            }),
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_create_then_describe() {
    let d = dispatcher("local=sqlite::memory:?read_only=false");
    create_schema(&d).await;

    let text = call(&d, "local_describe_table", json!({"table_name": "orders"}))
        .await
        .unwrap();
    assert!(text.starts_with("[LOCAL] Database: memory\nStructure of 'main.orders'\n"));
    assert!(text.contains("| column_name "));
    assert!(text.contains("customer_id"));
    assert!(text.contains("varchar(20)"));
    assert!(text.contains("'new'"));
    assert!(text.ends_with("4 rows"));

    let text = call(&d, "local_list_tables", json!({})).await.unwrap();
    assert!(text.contains("customers"));
    assert!(text.contains("orders"));
    assert!(text.ends_with("2 rows"));
}

#[tokio::test]
async fn test_constraints_are_enforced() {
    let d = dispatcher("local=sqlite::memory:?read_only=false");
    create_schema(&d).await;
    insert_customers(&d, &["ada"]).await;

    let text = call(
        &d,
        "local_execute_query",
        json!({"query": "INSERT INTO orders (id, customer_id, total) VALUES (1, 1, 10)"}),
    )
    .await
    .unwrap();
    assert!(text.contains("Affected rows: 1"));

    // unknown customer
    let err = call(
        &d,
        "local_execute_query",
        json!({"query": "INSERT INTO orders (id, customer_id, total) VALUES (2, 99, 10)"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionError);

    // negative total
    let err = call(
        &d,
        "local_execute_query",
        json!({"query": "INSERT INTO orders (id, customer_id, total) VALUES (3, 1, -5)"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionError);

    let text = call(
        &d,
        "local_execute_query",
        json!({"query": "SELECT status FROM orders WHERE id = ?1", "params": [1]}),
    )
    .await
    .unwrap();
    assert!(text.contains("| new "));
    assert!(text.ends_with("1 row"));
}

#[tokio::test]
async fn test_results_truncated_at_max_rows() {
    let d = dispatcher("local=sqlite::memory:?read_only=false&max_rows=2");
    create_schema(&d).await;
    insert_customers(&d, &["ada", "bob", "cy"]).await;

    let text = call(
        &d,
        "local_execute_query",
        json!({"query": "SELECT id, name FROM customers ORDER BY id"}),
    )
    .await
    .unwrap();
    assert!(text.contains("| ada "));
    assert!(text.contains("| bob "));
    assert!(!text.contains("| cy "));
    assert!(text.ends_with("2 rows shown, more rows matched (truncated at max_rows=2)"));

    let text = call(
        &d,
        "local_execute_query",
        json!({"query": "SELECT id FROM customers WHERE id > 5"}),
    )
    .await
    .unwrap();
    assert!(text.contains("| id |"));
    assert!(text.ends_with("0 rows"));
}

#[tokio::test]
async fn test_drop_table_round_trip() {
    let d = dispatcher("local=sqlite::memory:?read_only=false");
    create_schema(&d).await;

    let err = call(&d, "local_drop_table", json!({"table_name": "orders"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfirmationRequired);

    let text = call(&d, "local_list_tables", json!({})).await.unwrap();
    assert!(text.contains("orders"));

    call(
        &d,
        "local_drop_table",
        json!({"table_name": "orders", "confirm": true}),
    )
    .await
    .unwrap();
    let text = call(&d, "local_list_tables", json!({})).await.unwrap();
    assert!(!text.contains("orders"));
    assert!(text.ends_with("1 row"));
}

#[tokio::test]
async fn test_column_and_index_operations() {
    let d = dispatcher("local=sqlite::memory:?read_only=false");
    create_schema(&d).await;
    insert_customers(&d, &["ada", "bob", "ada"]).await;

    call(
        &d,
        "local_add_column",
        json!({"table_name": "customers", "column_name": "email", "data_type": "text"}),
    )
    .await
    .unwrap();

    let text = call(
        &d,
        "local_column_statistics",
        json!({"table_name": "customers", "column_name": "name"}),
    )
    .await
    .unwrap();
    assert!(text.contains("| distinct_count |"));
    assert!(text.contains("|          3 |              3 |              2 |"));

    call(
        &d,
        "local_create_index",
        json!({"table_name": "customers", "columns": ["name"]}),
    )
    .await
    .unwrap();
    let text = call(&d, "local_get_indexes", json!({"table_name": "customers"}))
        .await
        .unwrap();
    assert!(text.contains("idx_customers_name"));

    let result = call(
        &d,
        "local_drop_column",
        json!({"table_name": "customers", "column_name": "email", "confirm": true}),
    )
    .await;
    assert!(result.is_ok(), "{:?}", result);

    let text = call(&d, "local_describe_table", json!({"table_name": "customers"}))
        .await
        .unwrap();
    assert!(!text.contains("email"));
}

#[tokio::test]
async fn test_delete_rows_and_truncate() {
    let d = dispatcher("local=sqlite::memory:?read_only=false");
    create_schema(&d).await;
    insert_customers(&d, &["ada", "bob", "cy"]).await;

    let text = call(
        &d,
        "local_delete_rows",
        json!({"table_name": "customers", "filters": {"name": "bob"}}),
    )
    .await
    .unwrap();
    assert!(text.contains("Affected rows: 1"));

    let text = call(&d, "local_table_statistics", json!({"table_name": "customers"}))
        .await
        .unwrap();
    assert!(text.contains("|         2 |"));

    call(
        &d,
        "local_truncate_table",
        json!({"table_name": "customers", "confirm": true}),
    )
    .await
    .unwrap();
    let text = call(&d, "local_table_statistics", json!({"table_name": "customers"}))
        .await
        .unwrap();
    assert!(text.contains("|         0 |"));
}

#[tokio::test]
async fn test_postgres_only_operations_rejected() {
    let d = dispatcher("local=sqlite::memory:?read_only=false");
    let err = call(&d, "local_create_database", json!({"database_name": "x"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_file_database_persists_and_respects_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("toolkit.db");

    let writer = dispatcher(&format!("local=sqlite://{}?read_only=false", path.display()));
    create_schema(&writer).await;
    insert_customers(&writer, &["ada"]).await;
    writer.registry().close_all().await;

    let reader = dispatcher(&format!("local=sqlite://{}", path.display()));
    let text = call(&reader, "local_database_summary", json!({}))
        .await
        .unwrap();
    assert!(text.starts_with("[LOCAL] Database: toolkit\nDatabase summary\n"));
    assert!(text.contains("table_count"));

    let text = call(
        &reader,
        "local_execute_query",
        json!({"query": "SELECT name FROM customers"}),
    )
    .await
    .unwrap();
    assert!(text.contains("| ada  |"));

    let err = call(
        &reader,
        "local_execute_query",
        json!({"query": "INSERT INTO customers (id, name) VALUES (2, 'bob')"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyDenied);
}
