//! Connection factory.
//!
//! A [`Connector`] holds a parsed [`Config`] plus the optional collaborators
//! a connection should use: a metrics meter, a query-ID cache and, in tests,
//! a remote client to use instead of the SDK-backed one.

use crate::cache::QueryIdCache;
use crate::connection::{Config, Session};
use crate::driver::Connection;
use crate::error::{ConfigError, Result};
use crate::observability::Observability;
use crate::transport::AthenaApi;
use opentelemetry::metrics::Meter;
use std::str::FromStr;
use std::sync::Arc;

/// Builds [`Connection`]s from one configuration.
///
/// # Example
///
/// ```no_run
/// use athena_sql::driver::Connector;
/// use athena_sql::cache::InMemoryQueryIdCache;
/// use std::str::FromStr;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = Connector::from_str("s3://query-results/athena?region=us-east-1&MetricsEnabled=true")?
///     .with_meter(opentelemetry::global::meter("reporting"))
///     .with_cache(Arc::new(InMemoryQueryIdCache::new()));
///
/// let connection = connector.connect().await?;
/// connection.ping().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connector {
    config: Config,
    meter: Option<Meter>,
    cache: Option<Arc<dyn QueryIdCache>>,
    client: Option<Arc<dyn AthenaApi>>,
}

impl Connector {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            meter: None,
            cache: None,
            client: None,
        }
    }

    /// Record metrics through `meter` when `MetricsEnabled=true`.
    pub fn with_meter(mut self, meter: Meter) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Reuse results of identical read queries through `cache`.
    pub fn with_cache(mut self, cache: Arc<dyn QueryIdCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use `client` instead of building one from the configured credentials.
    pub fn with_client(mut self, client: Arc<dyn AthenaApi>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a connection.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::Credentials` if credentials cannot be resolved.
    pub async fn connect(&self) -> Result<Connection> {
        let session = match &self.client {
            Some(client) => Session::new(
                self.config.clone(),
                Arc::clone(client),
                Observability::new(&self.config, self.meter.clone()),
            ),
            None => Session::connect(self.config.clone(), self.meter.clone()).await?,
        };
        Ok(Connection::new(Arc::new(
            session.with_cache(self.cache.clone()),
        )))
    }
}

impl FromStr for Connector {
    type Err = ConfigError;

    fn from_str(dsn: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(Config::from_str(dsn)?))
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("config", &self.config)
            .field("meter", &self.meter.is_some())
            .field("cache", &self.cache.is_some())
            .field("client", &self.client.is_some())
            .finish()
    }
}
