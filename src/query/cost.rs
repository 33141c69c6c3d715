//! Scan-based query cost estimates.

use std::fmt;

/// Smallest amount of scanned data a query is billed for: 10 MB.
pub const MIN_BILLED_BYTES: i64 = 10 * 1024 * 1024;

/// Price per terabyte scanned outside the regions listed in [`price_per_terabyte`].
pub const DEFAULT_PRICE_PER_TERABYTE: f64 = 5.0;

const BYTES_PER_TERABYTE: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;

/// USD per terabyte scanned in `region`.
pub fn price_per_terabyte(region: &str) -> f64 {
    match region {
        "us-west-1" => 6.75,
        "eu-west-3" => 7.0,
        "sa-east-1" => 9.0,
        "me-south-1" => 6.5,
        "ap-east-1" | "ca-central-1" => 5.5,
        _ => DEFAULT_PRICE_PER_TERABYTE,
    }
}

/// Estimated cost of one query execution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCost {
    pub query_id: String,
    /// Bytes scanned, when the service reported statistics
    pub data_scanned_bytes: Option<i64>,
    pub usd: f64,
}

impl QueryCost {
    /// Cost of an execution that scanned `data_scanned_bytes` in `region`.
    ///
    /// Missing statistics cost nothing; anything under 10 MB is billed as 10 MB.
    pub fn new(query_id: &str, region: &str, data_scanned_bytes: Option<i64>) -> Self {
        let usd = match data_scanned_bytes {
            Some(bytes) => {
                let billed = bytes.max(MIN_BILLED_BYTES) as f64;
                billed * price_per_terabyte(region) / BYTES_PER_TERABYTE
            }
            None => 0.0,
        };
        Self {
            query_id: query_id.to_string(),
            data_scanned_bytes,
            usd,
        }
    }

    /// Results served without running a query.
    pub fn free(query_id: &str) -> Self {
        Self {
            query_id: query_id.to_string(),
            data_scanned_bytes: Some(0),
            usd: 0.0,
        }
    }
}

impl fmt::Display for QueryCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "query {} cost: {} USD, scanned data: {} B",
            self.query_id,
            self.usd,
            self.data_scanned_bytes.unwrap_or(0)
        )
    }
}
