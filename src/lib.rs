//! # athena-sql
//!
//! Async SQL driver for Amazon Athena.
//!
//! Queries are submitted to the service, polled until they reach a terminal
//! state and read back through a paginated row cursor that coerces Athena's
//! textual values into typed [`Value`]s. Connections are configured through a
//! DSN naming the S3 output location and the region, with options for
//! workgroups, read-only mode, cost tracking, timeouts and more.
//!
//! ## Example
//!
//! ```no_run
//! # use athena_sql::*;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Parse the DSN and connect
//! let driver = Driver::new();
//! let connector = driver.open("s3://query-results/athena?region=us-east-1&db=sales")?;
//! let connection = connector.connect().await?;
//!
//! // Run a query
//! let mut rows = connection
//!     .query("SELECT id, total, created_at FROM orders LIMIT 10")
//!     .await?;
//!
//! // Page through the results
//! while let Some(row) = rows.next_row().await? {
//!     println!("{:?}", row);
//! }
//!
//! connection.close().await;
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod cache;
pub mod connection;
pub mod driver;
pub mod error;
pub mod observability;
pub mod query;
pub mod transport;
pub mod types;
pub mod workgroup;

#[cfg(test)]
mod testing;

/// Version reported by the driver and by `pc:get_driver_version`.
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export public API
pub use connection::Config;
pub use driver::{Connection, Connector, Driver, ExecResult, Statement, DRIVER_NAME};
pub use error::{
    ConfigError, ConnectionError, ConversionError, DriverError, QueryError, RemoteError,
};
pub use query::{Parameter, QueryContext, Rows};
pub use types::Value;
