//! Driver metadata and the DSN entry point.

use crate::connection::Config;
use crate::driver::Connector;
use crate::error::ConfigError;
use std::str::FromStr;

/// Name the driver registers under.
pub const DRIVER_NAME: &str = "awsathena";

/// The Athena SQL driver.
///
/// `Driver` carries metadata and turns DSN strings into [`Connector`]s.
///
/// # Example
///
/// ```
/// use athena_sql::Driver;
///
/// let driver = Driver::new();
/// println!("Driver: {} v{}", driver.name(), driver.version());
/// ```
#[derive(Debug, Clone)]
pub struct Driver {
    name: String,
    version: String,
    description: String,
}

impl Driver {
    pub fn new() -> Self {
        Self {
            name: DRIVER_NAME.to_string(),
            version: crate::DRIVER_VERSION.to_string(),
            description: "SQL driver for Amazon Athena".to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The version string from the Cargo.toml.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parse `dsn` into a connector.
    ///
    /// # Arguments
    ///
    /// * `dsn` - Connection string in the format:
    ///   `s3://[user@]bucket[/path]?region=<region>[&param=value...]`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the DSN is invalid.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use athena_sql::Driver;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let connector = Driver::new().open("s3://query-results/athena?region=us-east-1")?;
    /// let connection = connector.connect().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(&self, dsn: &str) -> Result<Connector, ConfigError> {
        Ok(Connector::new(Config::from_str(dsn)?))
    }

    /// Whether `dsn` parses, without connecting.
    pub fn validate_dsn(&self, dsn: &str) -> bool {
        Config::from_str(dsn).is_ok()
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_creation() {
        let driver = Driver::new();
        assert_eq!(driver.name(), "awsathena");
        assert_eq!(driver.version(), env!("CARGO_PKG_VERSION"));
        assert!(!driver.description().is_empty());
        assert_eq!(Driver::default().name(), DRIVER_NAME);
    }

    #[test]
    fn test_driver_display() {
        let display = Driver::new().to_string();
        assert!(display.starts_with("awsathena v"));
    }

    #[test]
    fn test_driver_open() {
        let driver = Driver::new();
        let connector = driver
            .open("s3://results/athena?region=eu-west-1&db=sales")
            .unwrap();
        assert_eq!(connector.config().database(), "sales");
        assert!(driver.open("postgres://results?region=eu-west-1").is_err());
    }

    #[test]
    fn test_validate_dsn() {
        let driver = Driver::new();
        assert!(driver.validate_dsn("s3://results?region=us-east-1"));
        assert!(driver.validate_dsn("s3://results/a/b?region=us-east-1&ReadOnly=true"));

        assert!(!driver.validate_dsn(""));
        assert!(!driver.validate_dsn("s3://results"));
        assert!(!driver.validate_dsn("https://results?region=us-east-1"));
    }
}
