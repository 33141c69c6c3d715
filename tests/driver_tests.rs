//! End-to-end driver tests against a scripted in-process service.
//!
//! These run the whole stack from DSN to typed rows without network access.
//! Polling waits are driven by tokio's paused clock.
//!
//! ```bash
//! cargo test --test driver_tests
//! ```

mod common;

use athena_sql::cache::InMemoryQueryIdCache;
use athena_sql::transport::{
    ColumnInfo, ExecutionState, QueryStatus, ResultPage, WorkgroupState,
};
use athena_sql::{
    Connector, DriverError, Parameter, QueryContext, QueryError, Value, DRIVER_VERSION,
};
use common::{connect_fake, FakeAthena, FAKE_QUERY_ID};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DSN: &str = "s3://query-results/athena?region=us-east-1&db=sales";

fn cells(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|v| Some(v.to_string())).collect()
}

fn order_columns() -> Vec<ColumnInfo> {
    vec![
        ColumnInfo::new("id", "integer"),
        ColumnInfo::new("customer", "varchar"),
        ColumnInfo::new("paid", "boolean"),
        ColumnInfo::new("total", "double"),
    ]
}

// ============================================================================
// Submit, poll, page
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_query_polls_and_pages_through_results() {
    let fake = Arc::new(FakeAthena::succeeding_after(
        2,
        vec![
            ResultPage::new(
                order_columns(),
                vec![
                    cells(&["id", "customer", "paid", "total"]),
                    cells(&["1", "acme", "true", "10.5"]),
                ],
            )
            .with_next_token("page-2"),
            ResultPage::new(order_columns(), vec![cells(&["2", "globex", "false", "7"])]),
        ],
    ));
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let mut rows = connection
        .query("SELECT id, customer, paid, total FROM orders")
        .await
        .unwrap();
    assert_eq!(rows.query_id(), FAKE_QUERY_ID);
    assert_eq!(rows.column_names(), vec!["id", "customer", "paid", "total"]);

    let all = rows.fetch_all().await.unwrap();
    assert_eq!(
        all,
        vec![
            vec![
                Value::Integer(1),
                Value::Text("acme".to_string()),
                Value::Boolean(true),
                Value::Double(10.5),
            ],
            vec![
                Value::Integer(2),
                Value::Text("globex".to_string()),
                Value::Boolean(false),
                Value::Double(7.0),
            ],
        ]
    );
    assert!(rows.next_row().await.unwrap().is_none());

    assert_eq!(fake.status_calls(), 3);
    assert_eq!(fake.page_tokens(), vec![None, Some("page-2".to_string())]);

    let requests = fake.requests();
    let request = &requests[0];
    assert_eq!(request.database, "sales");
    assert_eq!(request.workgroup, "primary");
    assert_eq!(request.output_location, "s3://query-results/athena");
}

#[tokio::test(start_paused = true)]
async fn test_failed_query_reports_reason_verbatim() {
    let fake = Arc::new(FakeAthena::new());
    fake.push_status(
        QueryStatus::new(FAKE_QUERY_ID, ExecutionState::Failed)
            .with_reason("SYNTAX_ERROR: line 1:8: Column 'nope' cannot be resolved"),
    );
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let err = connection.query("SELECT nope FROM orders").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "SYNTAX_ERROR: line 1:8: Column 'nope' cannot be resolved"
    );
    assert_eq!(fake.page_tokens().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_execute_returns_update_count() {
    let fake = Arc::new(FakeAthena::succeeding_after(
        0,
        vec![ResultPage::default().with_update_count(12)],
    ));
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let result = connection
        .execute("INSERT INTO orders SELECT * FROM staging", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 12);
    assert_eq!(result.last_insert_id, -1);
}

// ============================================================================
// Parameters and policy
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_parameters_are_interpolated_before_submission() {
    let fake = Arc::new(FakeAthena::succeeding_after(
        0,
        vec![ResultPage::new(order_columns(), vec![])],
    ));
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let params: Vec<Parameter> = vec!["O'Brien".into(), 42.into(), true.into()];
    connection
        .query_with(
            &QueryContext::new(),
            "SELECT * FROM orders WHERE customer = ? AND id > ? AND paid = ?",
            &params,
        )
        .await
        .unwrap();

    assert_eq!(
        fake.submitted(),
        vec!["SELECT * FROM orders WHERE customer = 'O\\'Brien' AND id > 42 AND paid = 1".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_mismatch_is_rejected_locally() {
    let fake = Arc::new(FakeAthena::new());
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let err = connection
        .query_with(&QueryContext::new(), "SELECT ?", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Query(QueryError::InvalidQuery(_))));
    assert!(fake.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_read_only_mode_blocks_writes() {
    let fake = Arc::new(FakeAthena::succeeding_after(
        0,
        vec![ResultPage::new(order_columns(), vec![])],
    ));
    let connection = connect_fake(&format!("{}&ReadOnly=true", DSN), Arc::clone(&fake)).await;

    for write in [
        "DROP TABLE orders",
        "insert into orders values (1)",
        "  CREATE TABLE t AS SELECT 1",
    ] {
        let err = connection.execute(write, &[]).await.unwrap_err();
        assert!(matches!(err, DriverError::Query(QueryError::ReadOnlyViolation)));
    }
    assert!(fake.submitted().is_empty());

    connection.query("SELECT * FROM orders").await.unwrap();
    assert_eq!(fake.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transactions_are_rejected() {
    let connection = connect_fake(DSN, Arc::new(FakeAthena::new())).await;
    let err = connection.begin_transaction().await.unwrap_err();
    assert!(matches!(
        err,
        DriverError::Query(QueryError::TransactionsUnsupported)
    ));
}

// ============================================================================
// Cancellation and deadlines
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_caller_cancellation_stops_remote_query() {
    let fake = Arc::new(FakeAthena::new());
    fake.push_status(QueryStatus::new(FAKE_QUERY_ID, ExecutionState::Running));
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let token = CancellationToken::new();
    let ctx = QueryContext::with_cancel_token(token.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        token.cancel();
    });

    let err = connection
        .query_with(&ctx, "SELECT * FROM huge_table", &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DriverError::Query(QueryError::CallerCancelled { stop_error: None })
    ));
    assert_eq!(fake.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_stops_remote_query() {
    let fake = Arc::new(FakeAthena::new());
    fake.push_status(QueryStatus::new(FAKE_QUERY_ID, ExecutionState::Queued));
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let ctx = QueryContext::new().with_timeout(Duration::from_secs(20));
    let err = connection
        .query_with(&ctx, "SELECT * FROM huge_table", &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DriverError::Query(QueryError::DeadlineExceeded { stop_error: None })
    ));
    assert_eq!(fake.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_context_never_submits() {
    let fake = Arc::new(FakeAthena::new());
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let ctx = QueryContext::new();
    ctx.cancel();
    let err = connection
        .query_with(&ctx, "SELECT 1", &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DriverError::Query(QueryError::CallerCancelled { .. })
    ));
    assert!(fake.submitted().is_empty());
    assert_eq!(fake.stop_calls(), 0);
}

// ============================================================================
// Workgroups, costs, cache
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_missing_workgroup_is_created_when_allowed() {
    let fake = Arc::new(FakeAthena::succeeding_after(
        0,
        vec![ResultPage::new(order_columns(), vec![])],
    ));
    let dsn = format!("{}&workgroupName=etl&WGRemoteCreation=true", DSN);
    let connection = connect_fake(&dsn, Arc::clone(&fake)).await;

    connection.query("SELECT * FROM orders").await.unwrap();
    assert_eq!(fake.created_workgroups(), vec!["etl".to_string()]);
    assert_eq!(fake.requests()[0].workgroup, "etl");
}

#[tokio::test(start_paused = true)]
async fn test_disabled_workgroup_is_refused() {
    let fake = Arc::new(FakeAthena::new());
    fake.set_workgroup("etl", WorkgroupState::Disabled);
    let dsn = format!("{}&workgroupName=etl", DSN);
    let connection = connect_fake(&dsn, Arc::clone(&fake)).await;

    let err = connection.query("SELECT 1").await.unwrap_err();
    assert!(matches!(
        err,
        DriverError::Query(QueryError::WorkgroupDisabled { .. })
    ));
    assert!(fake.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_moneywise_attaches_cost() {
    let fake = Arc::new(FakeAthena::new());
    fake.push_status(
        QueryStatus::new(FAKE_QUERY_ID, ExecutionState::Succeeded)
            .with_data_scanned(1024_i64.pow(4)),
    );
    fake.push_page(ResultPage::new(order_columns(), vec![]));
    let connection = connect_fake(&format!("{}&MoneyWise=true", DSN), Arc::clone(&fake)).await;

    let rows = connection.query("SELECT * FROM orders").await.unwrap();
    let cost = rows.cost().expect("cost is tracked");
    assert_eq!(cost.query_id, FAKE_QUERY_ID);
    assert!((cost.usd - 5.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_cache_serves_repeated_read_queries() {
    let fake = Arc::new(FakeAthena::succeeding_after(
        0,
        vec![
            ResultPage::new(order_columns(), vec![cells(&["1", "acme", "true", "1"])]),
            ResultPage::new(order_columns(), vec![cells(&["1", "acme", "true", "1"])]),
        ],
    ));
    let connection = Connector::from_str(DSN)
        .unwrap()
        .with_client(Arc::clone(&fake) as _)
        .with_cache(Arc::new(InMemoryQueryIdCache::new()))
        .connect()
        .await
        .unwrap();

    let first = connection
        .query("SELECT * FROM orders")
        .await
        .unwrap()
        .fetch_all()
        .await
        .unwrap();
    let second = connection
        .query("SELECT *   FROM orders;")
        .await
        .unwrap()
        .fetch_all()
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(fake.submitted().len(), 1);
}

// ============================================================================
// Pseudo commands and prepared statements
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_pseudo_commands() {
    let fake = Arc::new(FakeAthena::new());
    fake.push_status(QueryStatus::new(FAKE_QUERY_ID, ExecutionState::Running));
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let version = connection
        .query("pc:get_driver_version")
        .await
        .unwrap()
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(version, vec![vec![Value::Text(DRIVER_VERSION.to_string())]]);

    let query_id = connection
        .query("pc:get_query_id SELECT * FROM orders")
        .await
        .unwrap()
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(query_id, vec![vec![Value::Text(FAKE_QUERY_ID.to_string())]]);
    assert_eq!(fake.submitted(), vec!["SELECT * FROM orders".to_string()]);

    let status = connection
        .query(&format!("pc:get_query_id_status {}", FAKE_QUERY_ID))
        .await
        .unwrap()
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(status, vec![vec![Value::Text("RUNNING".to_string())]]);

    let err = connection.query("pc:drop_everything").await.unwrap_err();
    assert!(matches!(
        err,
        DriverError::Query(QueryError::UnknownPseudoCommand(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_prepared_statement_runs_once() {
    let fake = Arc::new(FakeAthena::succeeding_after(
        0,
        vec![ResultPage::new(order_columns(), vec![])],
    ));
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;

    let mut stmt = connection
        .prepare("SELECT * FROM orders WHERE customer = ?")
        .unwrap();
    assert_eq!(stmt.num_input(), 1);

    let ctx = QueryContext::new();
    stmt.query(&ctx, &["acme".into()]).await.unwrap();
    let err = stmt.query(&ctx, &["acme".into()]).await.unwrap_err();
    assert!(matches!(err, DriverError::Query(QueryError::StatementClosed)));
    assert_eq!(
        fake.submitted(),
        vec!["SELECT * FROM orders WHERE customer = 'acme'".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_ping() {
    let fake = Arc::new(FakeAthena::succeeding_after(
        0,
        vec![ResultPage::new(
            vec![ColumnInfo::new("_col0", "integer")],
            vec![cells(&["1"])],
        )],
    ));
    let connection = connect_fake(DSN, Arc::clone(&fake)).await;
    connection.ping().await.unwrap();
    assert_eq!(fake.submitted(), vec!["SELECT 1".to_string()]);

    connection.close().await;
    assert!(connection.ping().await.is_err());
}
