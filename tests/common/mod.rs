//! Common test utilities for athena-sql integration tests.
//!
//! Two kinds of helpers live here:
//!
//! - [`FakeAthena`], a scripted in-process stand-in for the remote service
//!   that records every call, used by `driver_tests`
//! - environment helpers for `integration_tests`, which talk to real Athena
//!
//! # Integration Test Prerequisites
//!
//! The live tests need AWS credentials with Athena and S3 access, resolved the
//! usual way (environment variables, shared config or an `AWSProfile`).
//!
//! # Configuration
//!
//! | Environment Variable   | Default       | Description                   |
//! |------------------------|---------------|-------------------------------|
//! | `ATHENA_OUTPUT`        | (none)        | S3 output location, required  |
//! | `ATHENA_REGION`        | "us-east-1"   | Service region                |
//! | `ATHENA_DATABASE`      | "default"     | Database queries run against  |
//! | `ATHENA_WORKGROUP`     | "primary"     | Workgroup queries run in      |
//!
//! # Running Integration Tests
//!
//! ```bash
//! ATHENA_OUTPUT=s3://my-results/athena cargo test --test integration_tests -- --ignored
//! ```

#![allow(dead_code)]

use async_trait::async_trait;
use athena_sql::transport::{
    AthenaApi, ExecutionState, QueryStatus, ResultPage, StartQueryRequest, WorkgroupState,
};
use athena_sql::workgroup::Workgroup;
use athena_sql::{Connection, Connector, RemoteError};
use std::collections::{HashMap, VecDeque};
use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Scripted remote service
// ============================================================================

/// Execution ID handed out by [`FakeAthena`].
pub const FAKE_QUERY_ID: &str = "0f2c7a9e-3b1d-4e8f-a6c5-9d8b7e6f5a4b";

/// In-process remote service driven by a script.
///
/// Status calls pop the next scripted status; the last one repeats once the
/// script runs dry. Page calls pop the next scripted page. Every call is
/// counted so tests can assert on the remote traffic a query caused.
#[derive(Default)]
pub struct FakeAthena {
    statuses: Mutex<VecDeque<QueryStatus>>,
    last_status: Mutex<Option<QueryStatus>>,
    pages: Mutex<VecDeque<ResultPage>>,
    workgroups: Mutex<HashMap<String, WorkgroupState>>,
    started: Mutex<Vec<StartQueryRequest>>,
    page_tokens: Mutex<Vec<Option<String>>>,
    created_workgroups: Mutex<Vec<String>>,
    status_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl FakeAthena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a query that runs for `polls` status calls and then succeeds.
    pub fn succeeding_after(polls: usize, pages: Vec<ResultPage>) -> Self {
        let fake = Self::new();
        for _ in 0..polls {
            fake.push_status(QueryStatus::new(FAKE_QUERY_ID, ExecutionState::Running));
        }
        fake.push_status(QueryStatus::new(FAKE_QUERY_ID, ExecutionState::Succeeded));
        for page in pages {
            fake.push_page(page);
        }
        fake
    }

    pub fn push_status(&self, status: QueryStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn push_page(&self, page: ResultPage) {
        self.pages.lock().unwrap().push_back(page);
    }

    pub fn set_workgroup(&self, name: &str, state: WorkgroupState) {
        self.workgroups
            .lock()
            .unwrap()
            .insert(name.to_string(), state);
    }

    /// Queries submitted so far, in order.
    pub fn submitted(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.query.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<StartQueryRequest> {
        self.started.lock().unwrap().clone()
    }

    pub fn page_tokens(&self) -> Vec<Option<String>> {
        self.page_tokens.lock().unwrap().clone()
    }

    pub fn created_workgroups(&self) -> Vec<String> {
        self.created_workgroups.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AthenaApi for FakeAthena {
    async fn start_query(&self, request: &StartQueryRequest) -> Result<String, RemoteError> {
        self.started.lock().unwrap().push(request.clone());
        Ok(FAKE_QUERY_ID.to_string())
    }

    async fn get_query_status(&self, query_id: &str) -> Result<QueryStatus, RemoteError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        let mut last = self.last_status.lock().unwrap();
        if let Some(status) = next {
            *last = Some(status);
        }
        last.clone().ok_or_else(|| {
            RemoteError::request(
                "GetQueryExecution",
                format!("no execution {} scripted", query_id),
            )
        })
    }

    async fn get_results_page(
        &self,
        query_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage, RemoteError> {
        self.page_tokens.lock().unwrap().push(next_token);
        self.pages.lock().unwrap().pop_front().ok_or_else(|| {
            RemoteError::request(
                "GetQueryResults",
                format!("no results for {} scripted", query_id),
            )
        })
    }

    async fn stop_query(&self, _query_id: &str) -> Result<(), RemoteError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_workgroup(&self, name: &str) -> Result<Option<WorkgroupState>, RemoteError> {
        Ok(self.workgroups.lock().unwrap().get(name).copied())
    }

    async fn create_workgroup(&self, workgroup: &Workgroup) -> Result<(), RemoteError> {
        self.created_workgroups
            .lock()
            .unwrap()
            .push(workgroup.name().to_string());
        self.set_workgroup(workgroup.name(), WorkgroupState::Enabled);
        Ok(())
    }
}

/// Connect through `dsn` with `fake` standing in for the service.
pub async fn connect_fake(dsn: &str, fake: Arc<FakeAthena>) -> Connection {
    Connector::from_str(dsn)
        .expect("valid DSN")
        .with_client(fake)
        .connect()
        .await
        .expect("connect")
}

// ============================================================================
// Live service configuration
// ============================================================================

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_DATABASE: &str = "default";
pub const DEFAULT_WORKGROUP: &str = "primary";

pub const ENV_OUTPUT: &str = "ATHENA_OUTPUT";
pub const ENV_REGION: &str = "ATHENA_REGION";
pub const ENV_DATABASE: &str = "ATHENA_DATABASE";
pub const ENV_WORKGROUP: &str = "ATHENA_WORKGROUP";

pub fn get_output() -> Option<String> {
    env::var(ENV_OUTPUT).ok().filter(|value| !value.is_empty())
}

pub fn get_region() -> String {
    env::var(ENV_REGION).unwrap_or_else(|_| DEFAULT_REGION.to_string())
}

pub fn get_database() -> String {
    env::var(ENV_DATABASE).unwrap_or_else(|_| DEFAULT_DATABASE.to_string())
}

pub fn get_workgroup() -> String {
    env::var(ENV_WORKGROUP).unwrap_or_else(|_| DEFAULT_WORKGROUP.to_string())
}

/// Build the DSN for the live service, `None` when no output location is set.
pub fn get_test_dsn(extra: &str) -> Option<String> {
    let output = get_output()?;
    let mut dsn = format!(
        "{}?region={}&db={}&workgroupName={}",
        output,
        urlencoding::encode(&get_region()),
        urlencoding::encode(&get_database()),
        urlencoding::encode(&get_workgroup()),
    );
    if !extra.is_empty() {
        dsn.push('&');
        dsn.push_str(extra);
    }
    Some(dsn)
}

/// Connect to the live service, `None` when it is not configured.
pub async fn get_test_connection(extra: &str) -> Option<Connection> {
    let dsn = get_test_dsn(extra)?;
    let connector = Connector::from_str(&dsn).expect("valid DSN");
    Some(connector.connect().await.expect("connect to Athena"))
}

