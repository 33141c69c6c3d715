//! Query execution and result handling.
//!
//! # Overview
//!
//! The query module is organized into:
//! - `statement` - query text validation, classification and parameter interpolation
//! - `pseudo` - locally intercepted `pc:` commands
//! - `execution` - the submit/poll state machine and caller cancellation
//! - `results` - the paginated row cursor
//! - `cost` - scan-based cost estimates
//!
//! # Example
//!
//! ```no_run
//! use athena_sql::query::{QueryContext, QueryExecution};
//! use athena_sql::observability::Observability;
//! use athena_sql::transport::AthenaClient;
//! use athena_sql::Config;
//! use std::str::FromStr;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_str("s3://query-results/athena?region=us-east-1&db=sales")?;
//! let sdk = aws_config::load_from_env().await;
//! let client = Arc::new(AthenaClient::from_sdk_config(&sdk));
//!
//! let mut execution = QueryExecution::new(client, Arc::new(config), Observability::disabled());
//! let mut rows = execution
//!     .run(&QueryContext::new(), "SELECT * FROM orders WHERE id = ?", &[42.into()])
//!     .await?;
//!
//! while let Some(row) = rows.next_row().await? {
//!     println!("{:?}", row);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cost;
pub mod execution;
pub mod pseudo;
pub mod results;
pub mod statement;

pub use cost::QueryCost;
pub use execution::{ContextEnd, ExecutionPhase, QueryContext, QueryExecution, POLL_INTERVAL};
pub use pseudo::PseudoCommand;
pub use results::{CursorState, Rows};
pub use statement::{
    count_placeholders, interpolate, is_query_id, is_read_only_query, validate_query, Parameter,
};
