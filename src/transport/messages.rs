//! Request and response types exchanged with the remote query service.
//!
//! These are the driver's own view of the service payloads; the adapter in
//! [`super::athena`] translates them to and from the SDK shapes.

use std::fmt;

/// Lifecycle state of a remote query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionState {
    /// Parse the service's state name. Unknown names are treated as still running.
    pub fn from_service(name: &str) -> Self {
        match name {
            "QUEUED" => ExecutionState::Queued,
            "SUCCEEDED" => ExecutionState::Succeeded,
            "FAILED" => ExecutionState::Failed,
            "CANCELLED" => ExecutionState::Cancelled,
            _ => ExecutionState::Running,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Queued => "QUEUED",
            ExecutionState::Running => "RUNNING",
            ExecutionState::Succeeded => "SUCCEEDED",
            ExecutionState::Failed => "FAILED",
            ExecutionState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded | ExecutionState::Failed | ExecutionState::Cancelled
        )
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a remote query execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatus {
    pub query_id: String,
    pub state: ExecutionState,
    /// Failure or cancellation reason reported by the service
    pub state_change_reason: Option<String>,
    /// `DDL`, `DML` or `UTILITY` once the service has classified the statement
    pub statement_type: Option<String>,
    pub data_scanned_bytes: Option<i64>,
}

impl QueryStatus {
    pub fn new(query_id: impl Into<String>, state: ExecutionState) -> Self {
        Self {
            query_id: query_id.into(),
            state,
            state_change_reason: None,
            statement_type: None,
            data_scanned_bytes: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.state_change_reason = Some(reason.into());
        self
    }

    pub fn with_statement_type(mut self, statement_type: impl Into<String>) -> Self {
        self.statement_type = Some(statement_type.into());
        self
    }

    pub fn with_data_scanned(mut self, bytes: i64) -> Self {
        self.data_scanned_bytes = Some(bytes);
        self
    }
}

/// Name and declared type of a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// One result row as transmitted: every cell is text or absent.
pub type RawRow = Vec<Option<String>>;

/// One page of a paginated result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    /// Column metadata, absent when the service sent none
    pub columns: Option<Vec<ColumnInfo>>,
    pub rows: Vec<RawRow>,
    /// Continuation token; `None` on the last page
    pub next_token: Option<String>,
    /// Rows affected by a data-manipulation statement
    pub update_count: Option<i64>,
}

impl ResultPage {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<RawRow>) -> Self {
        Self {
            columns: Some(columns),
            rows,
            next_token: None,
            update_count: None,
        }
    }

    pub fn with_next_token(mut self, token: impl Into<String>) -> Self {
        self.next_token = Some(token.into());
        self
    }

    pub fn with_update_count(mut self, count: i64) -> Self {
        self.update_count = Some(count);
        self
    }
}

/// Parameters of a query submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartQueryRequest {
    pub query: String,
    pub database: String,
    pub output_location: String,
    pub workgroup: String,
}

/// Remote state of a workgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkgroupState {
    Enabled,
    Disabled,
}
