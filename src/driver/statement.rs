//! Prepared statements.
//!
//! The service has no server-side prepare, so a statement is query text
//! plus its placeholder count. Parameters are interpolated when it runs.
//! A statement runs once; afterwards it is closed.

use crate::connection::Session;
use crate::driver::connection::ExecResult;
use crate::error::{QueryError, Result};
use crate::query::{Parameter, QueryContext, Rows};
use std::sync::Arc;

pub struct Statement {
    session: Arc<Session>,
    sql: String,
    num_input: usize,
    closed: bool,
}

impl Statement {
    pub(crate) fn new(session: Arc<Session>, sql: String, num_input: usize) -> Self {
        Self {
            session,
            sql,
            num_input,
            closed: false,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `?` placeholders.
    pub fn num_input(&self) -> usize {
        self.num_input
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run the statement and return its rows.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::StatementClosed` if it already ran or was closed,
    /// otherwise any error of [`crate::Connection::query_with`].
    pub async fn query(&mut self, ctx: &QueryContext, params: &[Parameter]) -> Result<Rows> {
        self.take()?;
        self.session.query(ctx, &self.sql, params).await
    }

    /// Run the statement for its side effects.
    ///
    /// # Errors
    ///
    /// Same as [`Statement::query`].
    pub async fn execute(&mut self, ctx: &QueryContext, params: &[Parameter]) -> Result<ExecResult> {
        let mut rows = self.query(ctx, params).await?;
        let rows_affected = rows.update_count().unwrap_or(0);
        rows.discard();
        Ok(ExecResult {
            rows_affected,
            last_insert_id: -1,
        })
    }

    /// Close the statement. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn take(&mut self) -> std::result::Result<(), QueryError> {
        if self.closed {
            return Err(QueryError::StatementClosed);
        }
        self.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("num_input", &self.num_input)
            .field("closed", &self.closed)
            .finish()
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql)
    }
}
