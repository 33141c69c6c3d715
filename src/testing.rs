//! Test doubles shared by the unit tests.

use crate::error::RemoteError;
use crate::transport::{AthenaApi, QueryStatus, ResultPage, StartQueryRequest, WorkgroupState};
use crate::workgroup::Workgroup;
use async_trait::async_trait;
use mockall::mock;
use std::sync::{Arc, Mutex};

mock! {
    pub Athena {}

    #[async_trait]
    impl AthenaApi for Athena {
        async fn start_query(&self, request: &StartQueryRequest) -> Result<String, RemoteError>;
        async fn get_query_status(&self, query_id: &str) -> Result<QueryStatus, RemoteError>;
        async fn get_results_page(
            &self,
            query_id: &str,
            next_token: Option<String>,
        ) -> Result<ResultPage, RemoteError>;
        async fn stop_query(&self, query_id: &str) -> Result<(), RemoteError>;
        async fn get_workgroup(&self, name: &str) -> Result<Option<WorkgroupState>, RemoteError>;
        async fn create_workgroup(&self, workgroup: &Workgroup) -> Result<(), RemoteError>;
    }
}

/// A syntactically valid execution ID.
pub const QUERY_ID: &str = "c89088ab-595d-4ee6-a9ce-73b55aeb8900";

/// Formatted `tracing` output collected while a [`LogCapture::start`] guard is held.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route events on this thread into a fresh capture until the guard drops.
    pub fn start() -> (tracing::subscriber::DefaultGuard, Self) {
        let capture = Self::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (tracing::subscriber::set_default(subscriber), capture)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
