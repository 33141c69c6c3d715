//! Query execution state machine.
//!
//! A [`QueryExecution`] drives one piece of query text to either a [`Rows`]
//! cursor or an error:
//!
//! ```text
//! Classifying -> PseudoCommand | DirectLookup | Submitting -> Polling
//!             -> Succeeded | Failed | Cancelled | TimedOut
//! ```
//!
//! Polling is the only place that waits. Each round races both the status
//! request and the poll interval against the caller's [`QueryContext`]; when
//! the context ends first, the remote execution is stopped before the error
//! is returned.

use crate::cache::{normalize_query, referenced_tables, QueryIdCache};
use crate::connection::Config;
use crate::error::{DriverError, QueryError, RemoteError, Result};
use crate::observability::Observability;
use crate::query::cost::QueryCost;
use crate::query::pseudo::PseudoCommand;
use crate::query::results::Rows;
use crate::query::statement::{
    interpolate, is_query_id, is_read_only_query, validate_query, Parameter,
};
use crate::transport::{AthenaApi, ExecutionState, QueryStatus, StartQueryRequest};
use crate::types::Coercer;
use crate::workgroup::WorkgroupManager;
use crate::DRIVER_VERSION;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Wait between two status requests.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Cancellation and deadline of a caller.
///
/// Cloning shares the cancellation token, so any clone can cancel.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

/// Why a [`QueryContext`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextEnd {
    Cancelled,
    DeadlineExceeded,
}

impl ContextEnd {
    fn into_error(self, stop_error: Option<RemoteError>) -> QueryError {
        match self {
            ContextEnd::Cancelled => QueryError::CallerCancelled { stop_error },
            ContextEnd::DeadlineExceeded => QueryError::DeadlineExceeded { stop_error },
        }
    }
}

impl QueryContext {
    /// A context that never ends on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context driven by an existing token.
    pub fn with_cancel_token(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// How the context has ended, if it has.
    pub fn ended(&self) -> Option<ContextEnd> {
        if self.cancel.is_cancelled() {
            return Some(ContextEnd::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextEnd::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextEnd {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => ContextEnd::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ContextEnd::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                ContextEnd::Cancelled
            }
        }
    }
}

/// Where an execution is, or where it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Classifying,
    PseudoCommand,
    DirectLookup,
    Submitting,
    Polling,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

/// One query, from text to cursor.
///
/// Not meant for concurrent reuse; create one per query. Executions share
/// the remote client of their session.
pub struct QueryExecution {
    client: Arc<dyn AthenaApi>,
    config: Arc<Config>,
    observability: Observability,
    coercer: Coercer,
    cache: Option<Arc<dyn QueryIdCache>>,
    phase: ExecutionPhase,
    query_id: Option<String>,
}

impl QueryExecution {
    pub fn new(client: Arc<dyn AthenaApi>, config: Arc<Config>, observability: Observability) -> Self {
        let coercer = Coercer::from_config(&config);
        Self {
            client,
            config,
            observability,
            coercer,
            cache: None,
            phase: ExecutionPhase::Classifying,
            query_id: None,
        }
    }

    /// Consult and fill `cache` for read-only statements.
    pub fn with_cache(mut self, cache: Option<Arc<dyn QueryIdCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    /// Execution ID once one is known.
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    /// Run `sql` with `params` bound to its placeholders.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Caller cancellation and deadline, honored while polling
    /// * `sql` - Query text, a pseudo command, or an execution ID
    /// * `params` - Values for the `?` placeholders, interpolated locally
    ///
    /// # Errors
    ///
    /// - `QueryError::UnknownPseudoCommand` for an unrecognised `pc:` command
    /// - `QueryError::ReadOnlyViolation` for a write on a read-only connection
    /// - `QueryError::InvalidQuery` or `BufferOverflow` for rejected text
    /// - `QueryError::WorkgroupMissing` or `WorkgroupDisabled`
    /// - `QueryError::ExecutionFailed` with the remote reason verbatim
    /// - `QueryError::RemoteCancelled`, `CallerCancelled`, `DeadlineExceeded` or `Timeout`
    /// - `RemoteError` if a remote call fails
    pub async fn run(
        &mut self,
        ctx: &QueryContext,
        sql: &str,
        params: &[Parameter],
    ) -> Result<Rows> {
        self.phase = ExecutionPhase::Classifying;
        let (command, text) = PseudoCommand::parse(sql)?;

        if command == Some(PseudoCommand::GetDriverVersion) {
            self.phase = ExecutionPhase::PseudoCommand;
            return Ok(Rows::synthetic("", DRIVER_VERSION, self.coercer.clone()));
        }

        if self.config.is_read_only() && !is_query_id(text.trim()) && !is_read_only_query(text) {
            self.observability
                .warn(&format!("write db violation: {}", text));
            self.observability.count("failure.query.write_violation");
            self.phase = ExecutionPhase::Failed;
            return Err(QueryError::ReadOnlyViolation.into());
        }

        let query = if params.is_empty() {
            text.to_string()
        } else {
            self.observability.count("query.prepared");
            interpolate(text, params)?
        };
        validate_query(&query)?;

        let started = Instant::now();
        WorkgroupManager::new(Arc::clone(&self.client), self.observability.clone())
            .ensure_usable(
                &self.config.workgroup(),
                self.config.is_wg_remote_creation_allowed(),
            )
            .await
            .inspect_err(|_| self.phase = ExecutionPhase::Failed)?;
        self.observability.time("query.workgroup", started.elapsed());

        let trimmed = query.trim();
        if is_query_id(trimmed) {
            return self.run_on_query_id(command, trimmed).await;
        }
        if let Some(command @ (PseudoCommand::GetQueryIdStatus | PseudoCommand::StopQueryId)) =
            command
        {
            self.phase = ExecutionPhase::Failed;
            return Err(QueryError::InvalidQuery(format!(
                "{} expects a query execution ID, got \"{}\"",
                command, trimmed
            ))
            .into());
        }

        if command.is_none() {
            if let Some(rows) = self.lookup_cached(&query).await {
                return Ok(rows);
            }
        }

        let query_id = self.submit(ctx, &query).await?;
        if command == Some(PseudoCommand::GetQueryId) {
            self.phase = ExecutionPhase::PseudoCommand;
            return Ok(Rows::synthetic(&query_id, &query_id, self.coercer.clone()));
        }

        let status = self.poll(ctx, &query_id).await?;
        let cost = self
            .config
            .is_moneywise()
            .then(|| self.report_cost(&status));

        if let Some(cache) = &self.cache {
            if is_read_only_query(&query) {
                cache
                    .put(
                        &normalize_query(&query),
                        &query_id,
                        status.data_scanned_bytes.unwrap_or(0),
                        Utc::now(),
                    )
                    .await;
            }
        }

        let rows = Rows::open(
            Arc::clone(&self.client),
            &query_id,
            self.coercer.clone(),
            self.observability.clone(),
        )
        .await?;
        Ok(rows.with_cost(cost))
    }

    async fn run_on_query_id(
        &mut self,
        command: Option<PseudoCommand>,
        query_id: &str,
    ) -> Result<Rows> {
        self.query_id = Some(query_id.to_string());
        match command {
            Some(PseudoCommand::GetQueryIdStatus) => {
                self.phase = ExecutionPhase::PseudoCommand;
                let status = self
                    .client
                    .get_query_status(query_id)
                    .await
                    .inspect_err(|err| {
                        self.observability.error(&format!(
                            "getting status of query {} failed: {}",
                            query_id, err
                        ));
                        self.observability.count("failure.query.get_status");
                    })?;
                Ok(Rows::synthetic(
                    query_id,
                    status.state.as_str(),
                    self.coercer.clone(),
                ))
            }
            Some(PseudoCommand::StopQueryId) => {
                self.phase = ExecutionPhase::PseudoCommand;
                self.client.stop_query(query_id).await.inspect_err(|err| {
                    self.observability
                        .error(&format!("stopping query {} failed: {}", query_id, err));
                    self.observability.count("failure.query.stop");
                })?;
                Ok(Rows::synthetic(query_id, "OK", self.coercer.clone()))
            }
            _ => self.open_existing(query_id).await,
        }
    }

    /// Read the results of an execution without running anything.
    async fn open_existing(&mut self, query_id: &str) -> Result<Rows> {
        self.phase = ExecutionPhase::DirectLookup;
        self.query_id = Some(query_id.to_string());
        self.observability.count("query.direct_lookup");
        let cost = self.config.is_moneywise().then(|| {
            let cost = QueryCost::free(query_id);
            self.observability.report_cost(&cost);
            cost
        });
        let rows = Rows::open(
            Arc::clone(&self.client),
            query_id,
            self.coercer.clone(),
            self.observability.clone(),
        )
        .await?;
        Ok(rows.with_cost(cost))
    }

    /// Serve a read-only query from a cached execution when one is still valid.
    ///
    /// A cached execution whose results cannot be read is invalidated and
    /// the query runs normally.
    async fn lookup_cached(&mut self, query: &str) -> Option<Rows> {
        let cache = self.cache.clone()?;
        if !is_read_only_query(query) {
            return None;
        }
        let query_id = cache
            .valid_query_id(&normalize_query(query), &referenced_tables(query))
            .await?;

        match self.open_existing(&query_id).await {
            Ok(rows) => {
                self.observability
                    .debug(&format!("query served from cached execution {}", query_id));
                self.observability.count("query.cache_hit");
                Some(rows)
            }
            Err(err) => {
                self.observability.warn(&format!(
                    "cached execution {} is unusable, resubmitting: {}",
                    query_id, err
                ));
                cache.invalidate(&query_id).await;
                self.phase = ExecutionPhase::Classifying;
                self.query_id = None;
                None
            }
        }
    }

    async fn submit(&mut self, ctx: &QueryContext, query: &str) -> Result<String> {
        if let Some(end) = ctx.ended() {
            self.phase = ExecutionPhase::Cancelled;
            return Err(end.into_error(None).into());
        }

        self.phase = ExecutionPhase::Submitting;
        let request = StartQueryRequest {
            query: query.to_string(),
            database: self.config.database().to_string(),
            output_location: self.config.output_location(),
            workgroup: self.config.workgroup_name().to_string(),
        };

        let started = Instant::now();
        let query_id = match self.client.start_query(&request).await {
            Ok(query_id) => query_id,
            Err(err) => {
                self.phase = ExecutionPhase::Failed;
                self.observability.error(&format!(
                    "starting query in workgroup {} failed: {}",
                    request.workgroup, err
                ));
                self.observability.count("failure.query.start");
                return Err(err.into());
            }
        };
        self.observability.time("query.start", started.elapsed());
        self.observability.count("query.submitted");
        self.observability.debug(&format!(
            "query {} submitted to workgroup {}",
            query_id, request.workgroup
        ));

        self.query_id = Some(query_id.clone());
        Ok(query_id)
    }

    async fn poll(&mut self, ctx: &QueryContext, query_id: &str) -> Result<QueryStatus> {
        self.phase = ExecutionPhase::Polling;
        let limits = self.config.service_limit_override();
        let started = Instant::now();

        let client = Arc::clone(&self.client);
        loop {
            let polled = tokio::select! {
                polled = client.get_query_status(query_id) => polled,
                end = ctx.done() => return Err(self.abort(end, query_id).await),
            };
            let status = match polled {
                Ok(status) => status,
                Err(err) => {
                    self.phase = ExecutionPhase::Failed;
                    self.observability.error(&format!(
                        "getting status of query {} failed: {}",
                        query_id, err
                    ));
                    self.observability.count("failure.query.get_status");
                    return Err(err.into());
                }
            };

            match status.state {
                ExecutionState::Succeeded => {
                    self.phase = ExecutionPhase::Succeeded;
                    self.observability.time("query.succeeded", started.elapsed());
                    self.observability.count("query.succeeded");
                    return Ok(status);
                }
                ExecutionState::Failed => {
                    self.phase = ExecutionPhase::Failed;
                    let reason = status.state_change_reason.unwrap_or_default();
                    self.observability
                        .error(&format!("query {} failed: {}", query_id, reason));
                    self.observability.time("query.failed", started.elapsed());
                    self.observability.count("query.failed");
                    return Err(QueryError::ExecutionFailed(reason).into());
                }
                ExecutionState::Cancelled => {
                    self.phase = ExecutionPhase::Cancelled;
                    self.observability
                        .error(&format!("query {} was cancelled remotely", query_id));
                    self.observability.time("query.cancelled", started.elapsed());
                    self.observability.count("query.cancelled");
                    if self.config.is_moneywise() {
                        self.report_cost(&status);
                    }
                    return Err(QueryError::RemoteCancelled {
                        query_id: query_id.to_string(),
                    }
                    .into());
                }
                ExecutionState::Queued | ExecutionState::Running => {}
            }

            let statement_type = status.statement_type.as_deref();
            if limits.is_timed_out(started.elapsed(), statement_type) {
                let limit = limits.query_timeout(statement_type);
                return Err(self.time_out(query_id, statement_type, limit).await);
            }

            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                end = ctx.done() => return Err(self.abort(end, query_id).await),
            }
        }
    }

    /// Stop the remote execution after the caller's context ended.
    async fn abort(&mut self, end: ContextEnd, query_id: &str) -> DriverError {
        self.phase = ExecutionPhase::Cancelled;
        let stop_error = self.client.stop_query(query_id).await.err();
        match &stop_error {
            Some(err) => {
                self.observability
                    .error(&format!("stopping query {} failed: {}", query_id, err));
                self.observability.count("failure.query.stop");
            }
            None => self
                .observability
                .info(&format!("query {} stopped on caller request", query_id)),
        }
        self.observability.count("query.caller_cancelled");

        if self.config.is_moneywise() {
            match self.client.get_query_status(query_id).await {
                Ok(status) => {
                    self.report_cost(&status);
                }
                Err(err) => self.observability.warn(&format!(
                    "no statistics for cancelled query {}: {}",
                    query_id, err
                )),
            }
        }

        end.into_error(stop_error).into()
    }

    /// Give up on a query that ran past its ceiling. Stopping it is best effort.
    async fn time_out(
        &mut self,
        query_id: &str,
        statement_type: Option<&str>,
        limit: Duration,
    ) -> DriverError {
        self.phase = ExecutionPhase::TimedOut;
        let statement_type = statement_type.unwrap_or("UNKNOWN").to_string();
        self.observability.warn(&format!(
            "{} query {} exceeded {}s",
            statement_type,
            query_id,
            limit.as_secs()
        ));
        self.observability.count("query.timeout");
        if let Err(err) = self.client.stop_query(query_id).await {
            self.observability
                .error(&format!("stopping query {} failed: {}", query_id, err));
        }
        QueryError::Timeout {
            statement_type,
            limit_secs: limit.as_secs(),
        }
        .into()
    }

    fn report_cost(&self, status: &QueryStatus) -> QueryCost {
        let cost = QueryCost::new(
            &status.query_id,
            &self.config.region(),
            status.data_scanned_bytes,
        );
        self.observability.report_cost(&cost);
        cost
    }
}

impl std::fmt::Debug for QueryExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecution")
            .field("phase", &self.phase)
            .field("query_id", &self.query_id)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
