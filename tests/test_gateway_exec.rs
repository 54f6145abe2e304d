//! Integration tests for statement execution through the gateway

use litegate::executor::ExecOutcome;
use litegate::gateway::{Gateway, GatewayConfig};
use litegate::value::{Params, Value};
use litegate::{params, Error};

async fn memory_gateway() -> Gateway {
    Gateway::open_in_memory().await.unwrap()
}

#[tokio::test]
async fn test_exec_round_trip() {
    let gateway = memory_gateway().await;
    gateway
        .exec("CREATE TABLE t (id INTEGER, name TEXT)")
        .await
        .unwrap();
    gateway
        .exec("INSERT INTO t VALUES (1, 'a'), (2, 'b')")
        .await
        .unwrap();

    let outcome = gateway
        .exec("SELECT id, name FROM t ORDER BY id")
        .await
        .unwrap();
    let ExecOutcome::Rows(result) = outcome else {
        panic!("expected rows, got {:?}", outcome);
    };
    assert!(result.is_complete());
    assert_eq!(result.columns, vec!["id", "name"]);
    assert_eq!(
        result.rows,
        vec![
            vec![Value::Integer(1), Value::Text("a".to_string())],
            vec![Value::Integer(2), Value::Text("b".to_string())],
        ]
    );

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_insert_returns_rowid() {
    let gateway = memory_gateway().await;
    gateway
        .exec("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
        .await
        .unwrap();

    let outcome = gateway
        .exec("INSERT INTO t (v) VALUES ('first')")
        .await
        .unwrap();
    assert!(matches!(outcome, ExecOutcome::Inserted(1)));

    let outcome = gateway
        .exec("INSERT INTO t (v) VALUES ('second')")
        .await
        .unwrap();
    assert!(matches!(outcome, ExecOutcome::Inserted(2)));

    // A non-INSERT write reports completion, not a rowid.
    let outcome = gateway
        .exec("UPDATE t SET v = 'INSERT' WHERE id = 1")
        .await
        .unwrap();
    assert!(matches!(outcome, ExecOutcome::Done { .. }));

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_exec_with_params() {
    let gateway = memory_gateway().await;
    gateway
        .exec("CREATE TABLE t (a INTEGER, b TEXT, c BLOB)")
        .await
        .unwrap();
    gateway
        .exec_with_params(
            "INSERT INTO t VALUES (?1, ?2, ?3)",
            params![7, "seven", vec![1u8, 2, 3]],
        )
        .await
        .unwrap();

    let outcome = gateway
        .exec_with_params(
            "SELECT b, c FROM t WHERE a = :a",
            Params::named(vec![("a".to_string(), Value::Integer(7))]),
        )
        .await
        .unwrap();
    let ExecOutcome::Rows(result) = outcome else {
        panic!("expected rows");
    };
    assert_eq!(
        result.rows,
        vec![vec![
            Value::Text("seven".to_string()),
            Value::Blob(vec![1, 2, 3]),
        ]]
    );

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_dynamic_cell_typing() {
    let gateway = memory_gateway().await;
    // One declared-TEXT column holding different storage classes per row.
    gateway.exec("CREATE TABLE t (v TEXT)").await.unwrap();
    gateway
        .exec("INSERT INTO t VALUES (1), (2.5), ('x'), (NULL)")
        .await
        .unwrap();

    let ExecOutcome::Rows(result) = gateway.exec("SELECT v FROM t").await.unwrap() else {
        panic!("expected rows");
    };
    // TEXT affinity converts numerics to text on insert; the gateway
    // reports what the engine stored, per cell.
    assert_eq!(result.rows.len(), 4);
    assert_eq!(result.rows[2], vec![Value::Text("x".to_string())]);
    assert_eq!(result.rows[3], vec![Value::Null]);

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_script_stops_at_first_error() {
    let gateway = memory_gateway().await;
    let outcomes = gateway
        .exec_script(
            "CREATE TABLE t (x INTEGER); \
             INSERT INTO t VALUES (1); \
             INSERT INTO missing VALUES (2); \
             INSERT INTO t VALUES (3);",
        )
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_ok());
    assert!(outcomes[1].is_ok());
    assert!(outcomes[2].is_err());

    // The statement after the failure never ran.
    let ExecOutcome::Rows(result) = gateway
        .exec("SELECT COUNT(*) FROM t")
        .await
        .unwrap()
    else {
        panic!("expected rows");
    };
    assert_eq!(result.rows, vec![vec![Value::Integer(1)]]);

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_script_with_comments_and_whitespace() {
    let gateway = memory_gateway().await;
    let outcomes = gateway
        .exec_script(
            "-- setup\n\
             CREATE TABLE t (x INTEGER);\n\
             /* seed */ INSERT INTO t VALUES (1);\n\
             -- trailing comment only\n",
        )
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.is_ok()));

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_syntax_error_is_permanent_not_busy() {
    let gateway = memory_gateway().await;
    let err = gateway.exec("SELEC 1").await.unwrap_err();
    match err {
        Error::Engine { message, .. } => assert!(message.contains("syntax")),
        other => panic!("expected engine error, got {:?}", other),
    }

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_busy_is_distinct_from_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let path = path.to_str().unwrap();

    let writer = GatewayConfig::new().path(path).open().await.unwrap();
    let reader = GatewayConfig::new().path(path).open().await.unwrap();

    writer
        .exec("CREATE TABLE t (x INTEGER)")
        .await
        .unwrap();
    // Hold the write lock from the first connection.
    writer.exec("BEGIN IMMEDIATE").await.unwrap();
    writer.exec("INSERT INTO t VALUES (1)").await.unwrap();

    let err = reader
        .exec("INSERT INTO t VALUES (2)")
        .await
        .unwrap_err();
    assert!(err.is_busy(), "expected busy, got {:?}", err);

    writer.exec("COMMIT").await.unwrap();

    // After the lock is released the same statement succeeds.
    reader.exec("INSERT INTO t VALUES (2)").await.unwrap();

    writer.close().await.unwrap();
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_changes_and_filename() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("named.db");
    let path = path.to_str().unwrap();

    let gateway = GatewayConfig::new().path(path).open().await.unwrap();
    assert_eq!(gateway.filename().await.unwrap(), path);

    gateway
        .exec_script("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2), (3);")
        .await
        .unwrap();
    gateway.exec("UPDATE t SET x = x * 10").await.unwrap();
    assert_eq!(gateway.changes().await.unwrap(), 3);

    gateway.exec("DELETE FROM t WHERE x > 10").await.unwrap();
    assert_eq!(gateway.changes().await.unwrap(), 2);

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_table_exists() {
    let gateway = memory_gateway().await;
    gateway
        .exec("CREATE TABLE present (x INTEGER)")
        .await
        .unwrap();

    assert!(gateway.table_exists("present").await.unwrap());
    assert!(!gateway.table_exists("absent").await.unwrap());

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_data_persists_across_gateways() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persist.db");
    let path = path.to_str().unwrap();

    let gateway = GatewayConfig::new().path(path).open().await.unwrap();
    gateway
        .exec_script("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (42);")
        .await
        .unwrap();
    gateway.close().await.unwrap();

    let gateway = GatewayConfig::new().path(path).open().await.unwrap();
    let ExecOutcome::Rows(result) = gateway.exec("SELECT x FROM t").await.unwrap() else {
        panic!("expected rows");
    };
    assert_eq!(result.rows, vec![vec![Value::Integer(42)]]);
    gateway.close().await.unwrap();
}
