//! Connection configuration, credentials and session management.
//!
//! # Example
//!
//! ```no_run
//! # use athena_sql::connection::{Config, ServiceLimitOverride};
//! # use std::str::FromStr;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Build a config in code
//! let mut config = Config::with_credentials("s3://query-results/athena", "eu-west-1", "AKID", "SECRET")?;
//! config.set_database("sales");
//! config.set_read_only(true);
//!
//! let mut limits = ServiceLimitOverride::new();
//! limits.set_dml_query_timeout(600)?;
//! config.set_service_limit_override(&limits);
//!
//! // Or parse it from a DSN
//! let config = Config::from_str("s3://query-results/athena?region=eu-west-1&db=sales&ReadOnly=true")?;
//! println!("{}", config.to_redacted_dsn());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod limits;
pub mod params;
pub mod session;

pub use auth::{load_sdk_config, CredentialSource};
pub use limits::ServiceLimitOverride;
pub use params::Config;
pub use session::{Session, SessionState};
