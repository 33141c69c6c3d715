//! Remote query service abstraction trait.
//!
//! This module defines the `AthenaApi` trait: the six remote operations the
//! driver needs. The SDK-backed client and test doubles both implement it.

use crate::error::RemoteError;
use crate::workgroup::Workgroup;
use async_trait::async_trait;

use super::messages::{QueryStatus, ResultPage, StartQueryRequest, WorkgroupState};

/// Narrow interface to the remote query service.
///
/// Implementations are shared by every query of a session and must be safe to
/// call concurrently.
#[async_trait]
pub trait AthenaApi: Send + Sync {
    /// Submit a query for execution.
    ///
    /// # Arguments
    ///
    /// * `request` - Query text, database, output location and workgroup
    ///
    /// # Returns
    ///
    /// The execution ID assigned by the service.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the submission is rejected.
    async fn start_query(&self, request: &StartQueryRequest) -> Result<String, RemoteError>;

    /// Fetch the current status of an execution.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the status cannot be fetched.
    async fn get_query_status(&self, query_id: &str) -> Result<QueryStatus, RemoteError>;

    /// Fetch one page of results.
    ///
    /// # Arguments
    ///
    /// * `query_id` - Execution ID of a succeeded query
    /// * `next_token` - Continuation token from the previous page, `None` for the first page
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the page cannot be fetched.
    async fn get_results_page(
        &self,
        query_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage, RemoteError>;

    /// Ask the service to stop an execution.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the stop request is rejected.
    async fn stop_query(&self, query_id: &str) -> Result<(), RemoteError>;

    /// Look up a workgroup by name.
    ///
    /// # Returns
    ///
    /// `None` if no workgroup of that name exists.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for failures other than "not found".
    async fn get_workgroup(&self, name: &str) -> Result<Option<WorkgroupState>, RemoteError>;

    /// Create a workgroup with its policy configuration and tags.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if creation is rejected.
    async fn create_workgroup(&self, workgroup: &Workgroup) -> Result<(), RemoteError>;
}
