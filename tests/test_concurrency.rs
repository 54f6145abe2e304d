//! Integration tests for concurrent access through cloned gateway handles

use litegate::executor::ExecOutcome;
use litegate::gateway::Gateway;
use litegate::value::Value;
use litegate::params;

#[tokio::test]
async fn test_concurrent_writers_all_land() {
    let gateway = Gateway::open_in_memory().await.unwrap();
    gateway
        .exec("CREATE TABLE log (writer INTEGER, seq INTEGER)")
        .await
        .unwrap();

    const WRITERS: i64 = 8;
    const PER_WRITER: i64 = 25;

    let mut tasks = Vec::new();
    for writer in 0..WRITERS {
        let handle = gateway.clone();
        tasks.push(tokio::spawn(async move {
            for seq in 0..PER_WRITER {
                handle
                    .exec_with_params(
                        "INSERT INTO log VALUES (?1, ?2)",
                        params![writer, seq],
                    )
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let ExecOutcome::Rows(result) = gateway
        .exec("SELECT COUNT(*) FROM log")
        .await
        .unwrap()
    else {
        panic!("expected rows");
    };
    assert_eq!(result.rows, vec![vec![Value::Integer(WRITERS * PER_WRITER)]]);

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_per_caller_order_is_preserved() {
    let gateway = Gateway::open_in_memory().await.unwrap();
    gateway
        .exec("CREATE TABLE log (writer INTEGER, seq INTEGER, arrival INTEGER PRIMARY KEY AUTOINCREMENT)")
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for writer in 0..4i64 {
        let handle = gateway.clone();
        tasks.push(tokio::spawn(async move {
            for seq in 0..20i64 {
                handle
                    .exec_with_params(
                        "INSERT INTO log (writer, seq) VALUES (?1, ?2)",
                        params![writer, seq],
                    )
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Within one writer, arrival order must match submission order even
    // though writers interleave.
    let ExecOutcome::Rows(result) = gateway
        .exec("SELECT writer, seq FROM log ORDER BY arrival")
        .await
        .unwrap()
    else {
        panic!("expected rows");
    };

    let mut last_seq = vec![-1i64; 4];
    for row in &result.rows {
        let (Value::Integer(writer), Value::Integer(seq)) = (&row[0], &row[1]) else {
            panic!("unexpected row shape: {:?}", row);
        };
        assert!(
            *seq > last_seq[*writer as usize],
            "writer {} went backwards: {} after {}",
            writer,
            seq,
            last_seq[*writer as usize]
        );
        last_seq[*writer as usize] = *seq;
    }

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_readers_see_consistent_rows() {
    let gateway = Gateway::open_in_memory().await.unwrap();
    gateway
        .exec_script(
            "CREATE TABLE t (x INTEGER); \
             INSERT INTO t VALUES (1), (2), (3), (4), (5);",
        )
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let handle = gateway.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                let ExecOutcome::Rows(result) =
                    handle.exec("SELECT SUM(x) FROM t").await.unwrap()
                else {
                    panic!("expected rows");
                };
                assert_eq!(result.rows, vec![vec![Value::Integer(15)]]);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_clones_share_one_connection() {
    let gateway = Gateway::open_in_memory().await.unwrap();
    let clone = gateway.clone();

    // In-memory databases are private per connection; a clone seeing the
    // table proves it shares the original's connection.
    gateway
        .exec("CREATE TABLE shared (x INTEGER)")
        .await
        .unwrap();
    assert!(clone.table_exists("shared").await.unwrap());

    // Closing through one clone closes for all.
    clone.close().await.unwrap();
    assert!(gateway.exec("SELECT 1").await.is_err());
}
