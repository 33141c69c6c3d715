//! Session state shared by the queries of one connection.
//!
//! A [`Session`] owns the resolved configuration, the remote client bound to
//! its region and credentials, the observability sinks and the optional
//! query-ID cache. Every query creates its own [`QueryExecution`] from it.

use crate::cache::QueryIdCache;
use crate::connection::auth::{load_sdk_config, CredentialSource};
use crate::connection::Config;
use crate::error::{ConnectionError, Result};
use crate::observability::Observability;
use crate::query::{Parameter, QueryContext, QueryExecution, Rows};
use crate::transport::{AthenaApi, AthenaClient};
use opentelemetry::metrics::Meter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Closed,
}

pub struct Session {
    config: Arc<Config>,
    client: Arc<dyn AthenaApi>,
    observability: Observability,
    cache: Option<Arc<dyn QueryIdCache>>,
    state: RwLock<SessionState>,
    last_activity: RwLock<Instant>,
    query_count: AtomicU64,
}

impl Session {
    /// Create a session around an existing client.
    pub fn new(config: Config, client: Arc<dyn AthenaApi>, observability: Observability) -> Self {
        Self {
            config: Arc::new(config),
            client,
            observability,
            cache: None,
            state: RwLock::new(SessionState::Ready),
            last_activity: RwLock::new(Instant::now()),
            query_count: AtomicU64::new(0),
        }
    }

    /// Resolve credentials for `config` and build the SDK-backed client.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::Credentials` if the credentials are unusable.
    pub async fn connect(config: Config, meter: Option<Meter>) -> Result<Self> {
        let observability = Observability::new(&config, meter);
        let source = CredentialSource::resolve(&config);
        observability.debug(&format!(
            "connecting to region {} with {} credentials, config {}",
            config.region(),
            source.kind(),
            config
        ));

        let sdk_config = load_sdk_config(&config).await.inspect_err(|err| {
            observability.error(&format!("resolving credentials failed: {}", err));
            observability.count("failure.connect");
        })?;
        let client: Arc<dyn AthenaApi> = Arc::new(AthenaClient::from_sdk_config(&sdk_config));
        observability.count("connect");
        Ok(Self::new(config, client, observability))
    }

    pub fn with_cache(mut self, cache: Option<Arc<dyn QueryIdCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn AthenaApi> {
        &self.client
    }

    pub fn observability(&self) -> &Observability {
        &self.observability
    }

    pub fn cache(&self) -> Option<&Arc<dyn QueryIdCache>> {
        self.cache.as_ref()
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// A fresh execution bound to this session.
    pub fn execution(&self) -> QueryExecution {
        QueryExecution::new(
            Arc::clone(&self.client),
            Arc::clone(&self.config),
            self.observability.clone(),
        )
        .with_cache(self.cache.clone())
    }

    /// Run one query to a cursor.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::ConnectionClosed` on a closed session, or
    /// any error of [`QueryExecution::run`].
    pub async fn query(&self, ctx: &QueryContext, sql: &str, params: &[Parameter]) -> Result<Rows> {
        self.validate_ready().await?;
        self.increment_query_count();
        self.update_activity().await;

        let started = Instant::now();
        let result = self.execution().run(ctx, sql, params).await;
        self.observability.time("query.duration", started.elapsed());
        result
    }

    pub fn increment_query_count(&self) -> u64 {
        self.query_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::SeqCst)
    }

    pub async fn update_activity(&self) {
        *self.last_activity.write().await = Instant::now();
    }

    /// Time since the last query started.
    pub async fn idle_duration(&self) -> Duration {
        self.last_activity.read().await.elapsed()
    }

    /// Close the session. Running remote executions are not affected.
    pub async fn close(&self) {
        *self.state.write().await = SessionState::Closed;
    }

    pub async fn is_closed(&self) -> bool {
        self.state().await == SessionState::Closed
    }

    /// # Errors
    ///
    /// Returns `ConnectionError::ConnectionClosed` once the session is closed.
    pub async fn validate_ready(&self) -> std::result::Result<(), ConnectionError> {
        match self.state().await {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(ConnectionError::ConnectionClosed),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("observability", &self.observability)
            .field("cached", &self.cache.is_some())
            .field("query_count", &self.query_count())
            .finish()
    }
}
