//! Logging and metrics sinks for a session.
//!
//! Logging goes through `tracing` on the `athena_sql` target and metrics
//! through an OpenTelemetry [`Meter`]. Both are switched by the connection
//! config: logging is on unless `LoggingEnabled=false`, metrics are off unless
//! `MetricsEnabled=true`.

use crate::connection::Config;
use crate::query::QueryCost;
use opentelemetry::metrics::Meter;
use opentelemetry::{global, KeyValue};
use std::time::Duration;

const METRIC_PREFIX: &str = "awsathena";

/// Leveled logger plus counters and timers, each of which may be disabled.
#[derive(Clone)]
pub struct Observability {
    logging_enabled: bool,
    meter: Option<Meter>,
}

impl Observability {
    /// Build the sinks for a connection.
    ///
    /// When metrics are enabled but no meter is supplied, the global meter
    /// provider is used.
    pub fn new(config: &Config, meter: Option<Meter>) -> Self {
        let meter = if config.is_metrics_enabled() {
            Some(meter.unwrap_or_else(|| global::meter("athena-sql")))
        } else {
            None
        };
        Self {
            logging_enabled: config.is_logging_enabled(),
            meter,
        }
    }

    /// Sinks that discard everything.
    pub fn disabled() -> Self {
        Self {
            logging_enabled: false,
            meter: None,
        }
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    pub fn is_metrics_enabled(&self) -> bool {
        self.meter.is_some()
    }

    pub fn debug(&self, message: &str) {
        if self.logging_enabled {
            tracing::debug!(target: "athena_sql", "{}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.logging_enabled {
            tracing::info!(target: "athena_sql", "{}", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.logging_enabled {
            tracing::warn!(target: "athena_sql", "{}", message);
        }
    }

    pub fn error(&self, message: &str) {
        if self.logging_enabled {
            tracing::error!(target: "athena_sql", "{}", message);
        }
    }

    /// Increment the counter `awsathena.<name>` by one.
    pub fn count(&self, name: &str) {
        self.count_with(name, &[]);
    }

    pub fn count_with(&self, name: &str, attributes: &[KeyValue]) {
        if let Some(meter) = &self.meter {
            meter
                .u64_counter(format!("{}.{}", METRIC_PREFIX, name))
                .build()
                .add(1, attributes);
        }
    }

    /// Record `elapsed` into the histogram `awsathena.<name>`, in seconds.
    pub fn time(&self, name: &str, elapsed: Duration) {
        if let Some(meter) = &self.meter {
            meter
                .f64_histogram(format!("{}.{}", METRIC_PREFIX, name))
                .with_unit("s")
                .build()
                .record(elapsed.as_secs_f64(), &[]);
        }
    }

    /// Emit a cost estimate on the `athena_sql::cost` target and as metrics.
    ///
    /// Cost events are only produced on moneywise connections, so they are
    /// not subject to the logging switch.
    pub fn report_cost(&self, cost: &QueryCost) {
        tracing::info!(
            target: "athena_sql::cost",
            query_id = %cost.query_id,
            usd = cost.usd,
            data_scanned_bytes = cost.data_scanned_bytes.unwrap_or(0),
            "{}",
            cost
        );
        self.record("query.cost_usd", cost.usd);
        if let Some(bytes) = cost.data_scanned_bytes {
            self.record("query.data_scanned_bytes", bytes as f64);
        }
    }

    /// Record a gauge-like value into the histogram `awsathena.<name>`.
    pub fn record(&self, name: &str, value: f64) {
        if let Some(meter) = &self.meter {
            meter
                .f64_histogram(format!("{}.{}", METRIC_PREFIX, name))
                .build()
                .record(value, &[]);
        }
    }
}

impl std::fmt::Debug for Observability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observability")
            .field("logging_enabled", &self.logging_enabled)
            .field("metrics_enabled", &self.meter.is_some())
            .finish()
    }
}
