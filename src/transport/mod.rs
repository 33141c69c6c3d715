//! Transport layer for the remote query service.
//!
//! # Architecture
//!
//! The transport layer is organized into:
//! - `protocol` - The `AthenaApi` trait every remote client implements
//! - `messages` - Request and response types
//! - `athena` - AWS SDK implementation
//!
//! # Example
//!
//! ```no_run
//! use athena_sql::transport::{AthenaApi, AthenaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
//! let client = AthenaClient::from_sdk_config(&sdk_config);
//!
//! let status = client
//!     .get_query_status("5e3c2b8d-4f1a-4c7e-9a0b-1d2e3f4a5b6c")
//!     .await?;
//! println!("query is {}", status.state);
//! # Ok(())
//! # }
//! ```

pub mod athena;
pub mod messages;
pub mod protocol;

// Re-export commonly used types
pub use athena::AthenaClient;
pub use messages::{
    ColumnInfo, ExecutionState, QueryStatus, RawRow, ResultPage, StartQueryRequest,
    WorkgroupState,
};
pub use protocol::AthenaApi;
