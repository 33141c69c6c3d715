//! Connection surface: queries, updates, prepared statements, ping.

use crate::connection::{Config, Session};
use crate::driver::Statement;
use crate::error::{ConnectionError, QueryError, Result};
use crate::query::{count_placeholders, validate_query, Parameter, QueryContext, Rows};
use std::sync::Arc;

/// Query used to check that a connection works.
const PING_QUERY: &str = "SELECT 1";

/// Outcome of a statement run for its side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Update count reported by the service, `0` when none was reported
    pub rows_affected: i64,
    /// Always `-1`; the service has no generated keys
    pub last_insert_id: i64,
}

/// An open connection.
///
/// Queries on one connection may run concurrently; each gets its own
/// execution against the shared remote client.
///
/// # Example
///
/// ```no_run
/// use athena_sql::query::QueryContext;
/// use athena_sql::Driver;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connection = Driver::new()
///     .open("s3://query-results/athena?region=us-east-1&db=sales")?
///     .connect()
///     .await?;
///
/// let ctx = QueryContext::new().with_timeout(Duration::from_secs(600));
/// let mut rows = connection
///     .query_with(&ctx, "SELECT id, total FROM orders WHERE total > ?", &[100.into()])
///     .await?;
/// while let Some(row) = rows.next_row().await? {
///     println!("{:?}", row);
/// }
///
/// connection.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Connection {
    session: Arc<Session>,
}

impl Connection {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn config(&self) -> &Config {
        self.session.config()
    }

    /// Run `sql` without parameters or a caller context.
    ///
    /// # Errors
    ///
    /// See [`Connection::query_with`].
    pub async fn query(&self, sql: &str) -> Result<Rows> {
        self.query_with(&QueryContext::new(), sql, &[]).await
    }

    /// Run `sql` with `params` under `ctx`.
    ///
    /// Cancelling `ctx`, or passing its deadline, while the query runs
    /// stops the remote execution.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::ConnectionClosed` on a closed connection,
    /// or any validation, policy, remote, cancellation or timeout error of
    /// the execution.
    pub async fn query_with(
        &self,
        ctx: &QueryContext,
        sql: &str,
        params: &[Parameter],
    ) -> Result<Rows> {
        self.session.query(ctx, sql, params).await
    }

    /// Run a statement for its side effects.
    ///
    /// # Errors
    ///
    /// See [`Connection::query_with`].
    pub async fn execute(&self, sql: &str, params: &[Parameter]) -> Result<ExecResult> {
        self.execute_with(&QueryContext::new(), sql, params).await
    }

    /// Run a statement for its side effects under `ctx`.
    ///
    /// # Errors
    ///
    /// See [`Connection::query_with`].
    pub async fn execute_with(
        &self,
        ctx: &QueryContext,
        sql: &str,
        params: &[Parameter],
    ) -> Result<ExecResult> {
        let mut rows = self.query_with(ctx, sql, params).await?;
        let rows_affected = rows.update_count().unwrap_or(0);
        rows.discard();
        Ok(ExecResult {
            rows_affected,
            last_insert_id: -1,
        })
    }

    /// Prepare `sql` for a single later run.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::InvalidQuery` if the text is blank or too long.
    pub fn prepare(&self, sql: &str) -> Result<Statement> {
        validate_query(sql)?;
        Ok(Statement::new(
            Arc::clone(&self.session),
            sql.to_string(),
            count_placeholders(sql),
        ))
    }

    /// Check that queries can run.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::BadConnection` if `SELECT 1` fails for any reason.
    pub async fn ping(&self) -> Result<()> {
        match self.query(PING_QUERY).await {
            Ok(mut rows) => {
                rows.close();
                Ok(())
            }
            Err(err) => {
                self.session
                    .observability()
                    .warn(&format!("ping failed: {}", err));
                Err(ConnectionError::BadConnection(err.to_string()).into())
            }
        }
    }

    /// Always fails: the service has no transactions.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::TransactionsUnsupported`.
    pub async fn begin_transaction(&self) -> Result<()> {
        Err(QueryError::TransactionsUnsupported.into())
    }

    /// Close the connection. Cursors already handed out stay readable.
    pub async fn close(&self) {
        self.session.close().await;
    }

    pub async fn is_closed(&self) -> bool {
        self.session.is_closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DriverError, RemoteError};
    use crate::observability::Observability;
    use crate::testing::{LogCapture, MockAthena, QUERY_ID};
    use crate::transport::{ColumnInfo, ExecutionState, QueryStatus, ResultPage};

    fn connection(mock: MockAthena) -> Connection {
        Connection::new(Arc::new(Session::new(
            Config::new(),
            Arc::new(mock),
            Observability::disabled(),
        )))
    }

    fn expect_success(mock: &mut MockAthena, page: ResultPage) {
        mock.expect_start_query()
            .returning(|_| Ok(QUERY_ID.to_string()));
        mock.expect_get_query_status()
            .returning(|_| Ok(QueryStatus::new(QUERY_ID, ExecutionState::Succeeded)));
        mock.expect_get_results_page()
            .return_once(move |_, _| Ok(page));
    }

    #[tokio::test]
    async fn test_execute_reports_update_count() {
        let mut mock = MockAthena::new();
        expect_success(
            &mut mock,
            ResultPage::new(vec![ColumnInfo::new("rows", "bigint")], vec![]).with_update_count(3),
        );
        let result = connection(mock)
            .execute("INSERT INTO t VALUES (?)", &[1.into()])
            .await
            .unwrap();
        assert_eq!(
            result,
            ExecResult {
                rows_affected: 3,
                last_insert_id: -1
            }
        );
    }

    #[tokio::test]
    async fn test_execute_discards_pending_pages_quietly() {
        let (_guard, logs) = LogCapture::start();
        let mut mock = MockAthena::new();
        expect_success(
            &mut mock,
            ResultPage::new(
                vec![ColumnInfo::new("id", "integer")],
                vec![vec![Some("id".into())], vec![Some("1".into())]],
            )
            .with_next_token("t1"),
        );
        let config = Config::new();
        let observability = Observability::new(&config, None);
        let connection = Connection::new(Arc::new(Session::new(
            config,
            Arc::new(mock),
            observability,
        )));
        let result = connection.execute("SELECT id FROM t", &[]).await.unwrap();
        assert_eq!(result.rows_affected, 0);
        assert!(!logs.text().contains("closed prematurely"));
    }

    #[tokio::test]
    async fn test_ping() {
        let mut mock = MockAthena::new();
        expect_success(
            &mut mock,
            ResultPage::new(
                vec![ColumnInfo::new("_col0", "integer")],
                vec![vec![Some("1".into())]],
            ),
        );
        connection(mock).ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_failure_is_bad_connection() {
        let mut mock = MockAthena::new();
        mock.expect_start_query()
            .returning(|_| Err(RemoteError::request("StartQueryExecution", "expired token")));
        let err = connection(mock).ping().await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::Connection(ConnectionError::BadConnection(_))
        ));
    }

    #[tokio::test]
    async fn test_transactions_unsupported() {
        let err = connection(MockAthena::new())
            .begin_transaction()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DriverError::Query(QueryError::TransactionsUnsupported)
        ));
    }

    #[tokio::test]
    async fn test_prepare_counts_placeholders() {
        let conn = connection(MockAthena::new());
        let stmt = conn.prepare("SELECT * FROM t WHERE a = ? AND b = ?").unwrap();
        assert_eq!(stmt.num_input(), 2);
        assert!(matches!(
            conn.prepare(" "),
            Err(DriverError::Query(QueryError::InvalidQuery(_)))
        ));
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_queries() {
        let mut mock = MockAthena::new();
        mock.expect_start_query().never();
        let conn = connection(mock);
        conn.close().await;
        assert!(conn.is_closed().await);
        assert!(matches!(
            conn.query("SELECT 1").await,
            Err(DriverError::Connection(ConnectionError::ConnectionClosed))
        ));
    }
}
