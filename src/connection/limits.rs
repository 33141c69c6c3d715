//! Client-side query timeout ceilings and their per-connection overrides.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::time::Duration;

/// Config key holding the DDL ceiling override, in seconds.
pub const DDL_QUERY_TIMEOUT_KEY: &str = "DDLQueryTimeout";

/// Config key holding the DML ceiling override, in seconds.
pub const DML_QUERY_TIMEOUT_KEY: &str = "DMLQueryTimeout";

/// Default ceiling for schema-changing statements and unknown statement types.
pub const DEFAULT_DDL_QUERY_TIMEOUT: Duration = Duration::from_secs(600 * 60);

/// Default ceiling for data-manipulation and utility statements.
pub const DEFAULT_DML_QUERY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Per-connection overrides of the client-side statement ceilings.
///
/// Overrides are strictly positive second counts. An absent override falls
/// back to the default ceiling for the statement class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceLimitOverride {
    ddl_query_timeout: Option<u64>,
    dml_query_timeout: Option<u64>,
}

impl ServiceLimitOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the DDL ceiling.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidServiceLimitOverride` unless `seconds > 0`.
    pub fn set_ddl_query_timeout(&mut self, seconds: i64) -> Result<(), ConfigError> {
        self.ddl_query_timeout = Some(positive(DDL_QUERY_TIMEOUT_KEY, seconds)?);
        Ok(())
    }

    /// Override the DML ceiling.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidServiceLimitOverride` unless `seconds > 0`.
    pub fn set_dml_query_timeout(&mut self, seconds: i64) -> Result<(), ConfigError> {
        self.dml_query_timeout = Some(positive(DML_QUERY_TIMEOUT_KEY, seconds)?);
        Ok(())
    }

    pub fn ddl_query_timeout(&self) -> Option<u64> {
        self.ddl_query_timeout
    }

    pub fn dml_query_timeout(&self) -> Option<u64> {
        self.dml_query_timeout
    }

    /// Ceiling that applies to a statement of the given remote statement type.
    ///
    /// `DML` and `UTILITY` use the short ceiling; `DDL` and anything
    /// unrecognised use the long one.
    pub fn query_timeout(&self, statement_type: Option<&str>) -> Duration {
        match statement_type {
            Some("DML") | Some("UTILITY") => self
                .dml_query_timeout
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DML_QUERY_TIMEOUT),
            _ => self
                .ddl_query_timeout
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DDL_QUERY_TIMEOUT),
        }
    }

    /// Whether a query that has been running for `elapsed` has exceeded its ceiling.
    pub fn is_timed_out(&self, elapsed: Duration, statement_type: Option<&str>) -> bool {
        elapsed > self.query_timeout(statement_type)
    }

    /// Read overrides from config values. Unparsable or non-positive values are absent.
    pub fn from_values(values: &BTreeMap<String, String>) -> Self {
        let read = |key: &str| {
            values
                .get(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|secs| *secs > 0)
                .map(|secs| secs as u64)
        };
        Self {
            ddl_query_timeout: read(DDL_QUERY_TIMEOUT_KEY),
            dml_query_timeout: read(DML_QUERY_TIMEOUT_KEY),
        }
    }

    /// Merge the present overrides into config values.
    pub fn write_values(&self, values: &mut BTreeMap<String, String>) {
        if let Some(secs) = self.ddl_query_timeout {
            values.insert(DDL_QUERY_TIMEOUT_KEY.to_string(), secs.to_string());
        }
        if let Some(secs) = self.dml_query_timeout {
            values.insert(DML_QUERY_TIMEOUT_KEY.to_string(), secs.to_string());
        }
    }
}

fn positive(name: &str, seconds: i64) -> Result<u64, ConfigError> {
    if seconds <= 0 {
        return Err(ConfigError::InvalidServiceLimitOverride {
            name: name.to_string(),
            value: seconds,
        });
    }
    Ok(seconds as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_rejects_non_positive_overrides() {
        let mut limits = ServiceLimitOverride::new();
        assert!(limits.set_ddl_query_timeout(0).is_err());
        assert!(limits.set_dml_query_timeout(-1).is_err());
        assert_eq!(limits, ServiceLimitOverride::default());

        limits.set_dml_query_timeout(1000).unwrap();
        assert_eq!(limits.dml_query_timeout(), Some(1000));
    }

    #[test]
    fn test_default_ceilings_by_statement_type() {
        let limits = ServiceLimitOverride::new();
        assert!(limits.is_timed_out(ONE_HOUR, Some("DML")));
        assert!(limits.is_timed_out(ONE_HOUR, Some("UTILITY")));
        assert!(!limits.is_timed_out(ONE_HOUR, Some("DDL")));
        assert!(!limits.is_timed_out(ONE_HOUR, Some("UNKNOWN")));
        assert!(!limits.is_timed_out(ONE_HOUR, None));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut limits = ServiceLimitOverride::new();
        limits.set_ddl_query_timeout(60).unwrap();
        limits.set_dml_query_timeout(7200).unwrap();

        assert!(limits.is_timed_out(ONE_HOUR, Some("DDL")));
        assert!(!limits.is_timed_out(ONE_HOUR, Some("DML")));
        assert_eq!(limits.query_timeout(None), Duration::from_secs(60));
    }

    #[test]
    fn test_values_round_trip() {
        let mut limits = ServiceLimitOverride::new();
        limits.set_ddl_query_timeout(900).unwrap();

        let mut values = BTreeMap::new();
        limits.write_values(&mut values);
        assert_eq!(values.get(DDL_QUERY_TIMEOUT_KEY).map(String::as_str), Some("900"));
        assert!(!values.contains_key(DML_QUERY_TIMEOUT_KEY));
        assert_eq!(ServiceLimitOverride::from_values(&values), limits);
    }

    #[test]
    fn test_from_values_ignores_garbage() {
        let mut values = BTreeMap::new();
        values.insert(DDL_QUERY_TIMEOUT_KEY.to_string(), "abc".to_string());
        values.insert(DML_QUERY_TIMEOUT_KEY.to_string(), "-5".to_string());
        assert_eq!(
            ServiceLimitOverride::from_values(&values),
            ServiceLimitOverride::default()
        );
    }
}
