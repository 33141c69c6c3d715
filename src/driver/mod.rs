//! `database/sql`-style driver surface.
//!
//! # Architecture
//!
//! - `Driver` - driver metadata and DSN parsing
//! - `Connector` - connection factory holding a config and optional collaborators
//! - `Connection` - runs queries and statements on one session
//! - `Statement` - single-use prepared statement with client-side parameters
//!
//! # Example
//!
//! ```no_run
//! use athena_sql::Driver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = Driver::new()
//!     .open("s3://query-results/athena?region=us-east-1&db=sales")?
//!     .connect()
//!     .await?;
//!
//! let mut stmt = connection.prepare("SELECT id FROM orders WHERE region = ?")?;
//! let mut rows = stmt
//!     .query(&Default::default(), &["emea".into()])
//!     .await?;
//! for row in rows.fetch_all().await? {
//!     println!("{:?}", row);
//! }
//!
//! connection.close().await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod connector;
#[allow(clippy::module_inception)]
pub mod driver;
pub mod statement;

pub use connection::{Connection, ExecResult};
pub use connector::Connector;
pub use driver::{Driver, DRIVER_NAME};
pub use statement::Statement;
