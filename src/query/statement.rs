//! Query text handling: validation, classification and client-side
//! parameter interpolation.
//!
//! The remote service has no bind-parameter protocol, so `?` placeholders are
//! replaced with escaped literals before submission.

use crate::error::QueryError;
use crate::types::datetime::is_zero_time;
use chrono::{DateTime, TimeZone, Timelike, Utc};

/// Longest query text the service accepts, in bytes.
pub const MAX_QUERY_LENGTH: usize = 262_144;

/// Shortest query text accepted, in bytes, after trimming whitespace.
pub const MIN_QUERY_LENGTH: usize = 1;

/// Ceiling on the interpolated query buffer.
pub const MAX_INTERPOLATED_LENGTH: usize = 10 * MAX_QUERY_LENGTH;

/// Leading keywords of statements allowed on a read-only connection.
const READ_ONLY_KEYWORDS: [&str; 5] = ["select", "using", "with", "desc", "show"];

/// Check that query text is within the accepted length bounds.
///
/// # Errors
///
/// Returns `QueryError::InvalidQuery` if the text is blank or too long.
pub fn validate_query(sql: &str) -> Result<(), QueryError> {
    if sql.trim().len() < MIN_QUERY_LENGTH {
        return Err(QueryError::InvalidQuery("query is empty".to_string()));
    }
    if sql.len() >= MAX_QUERY_LENGTH {
        return Err(QueryError::InvalidQuery(format!(
            "query is {} bytes, the limit is {}",
            sql.len(),
            MAX_QUERY_LENGTH - 1
        )));
    }
    Ok(())
}

/// Whether a statement may run on a read-only connection.
pub fn is_read_only_query(sql: &str) -> bool {
    let lowered = sql.trim().to_lowercase();
    READ_ONLY_KEYWORDS
        .iter()
        .any(|keyword| lowered.starts_with(keyword))
}

/// Whether `s` is an execution ID: lowercase hex in 8-4-4-4-12 groups.
pub fn is_query_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_digit() || (b'a'..=b'f').contains(b),
        })
}

/// Number of `?` placeholders in `sql`.
pub fn count_placeholders(sql: &str) -> usize {
    sql.bytes().filter(|b| *b == b'?').count()
}

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Rendered as `1` or `0`
    Bool(bool),
    /// Rendered as a UTC literal rounded to the microsecond
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
    Text(String),
}

impl Parameter {
    /// Append this value as a SQL literal.
    fn write_literal(&self, out: &mut String) {
        match self {
            Parameter::Null => out.push_str("NULL"),
            Parameter::Int(v) => out.push_str(&v.to_string()),
            Parameter::UInt(v) => out.push_str(&v.to_string()),
            Parameter::Float(v) => out.push_str(&format_float(*v)),
            Parameter::Bool(v) => out.push(if *v { '1' } else { '0' }),
            Parameter::Timestamp(t) => {
                out.push('\'');
                out.push_str(&format_timestamp(t));
                out.push('\'');
            }
            Parameter::Bytes(b) => {
                out.push_str("_binary'");
                escape_into(&String::from_utf8_lossy(b), out);
                out.push('\'');
            }
            Parameter::Text(s) => {
                out.push('\'');
                escape_into(s, out);
                out.push('\'');
            }
        }
    }
}

/// Replace each `?` in `sql` with the next argument rendered as a literal.
///
/// # Errors
///
/// - `QueryError::InvalidQuery` if the placeholder count differs from `args.len()`
/// - `QueryError::BufferOverflow` if the rendered query outgrows the buffer ceiling
///
/// # Example
///
/// ```
/// # use athena_sql::query::{interpolate, Parameter};
/// let sql = interpolate("SELECT ?+?", &[Parameter::from(42), Parameter::from("gopher")])?;
/// assert_eq!(sql, "SELECT 42+'gopher'");
/// # Ok::<(), athena_sql::QueryError>(())
/// ```
pub fn interpolate(sql: &str, args: &[Parameter]) -> Result<String, QueryError> {
    let placeholders = count_placeholders(sql);
    if placeholders != args.len() {
        return Err(QueryError::InvalidQuery(format!(
            "query has {} placeholders but {} arguments were given",
            placeholders,
            args.len()
        )));
    }

    let mut out = String::with_capacity(sql.len() + args.len() * 8);
    let mut pieces = sql.split('?');
    if let Some(head) = pieces.next() {
        out.push_str(head);
    }
    for (arg, piece) in args.iter().zip(pieces) {
        arg.write_literal(&mut out);
        if out.len() + 4 > MAX_INTERPOLATED_LENGTH {
            return Err(QueryError::BufferOverflow {
                size: out.len(),
                limit: MAX_INTERPOLATED_LENGTH,
            });
        }
        out.push_str(piece);
    }
    Ok(out)
}

/// Escape control and quote characters with backslashes.
fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS[.ffffff]` in UTC, rounded to the microsecond.
/// The zero instant renders as `0000-00-00`.
fn format_timestamp<Z: TimeZone>(t: &DateTime<Z>) -> String {
    if is_zero_time(t) {
        return "0000-00-00".to_string();
    }
    let rounded = t.with_timezone(&Utc) + chrono::Duration::nanoseconds(500);
    let micros = rounded.nanosecond() / 1_000 % 1_000_000;
    let mut s = rounded.format("%Y-%m-%d %H:%M:%S").to_string();
    if micros != 0 {
        s.push_str(&format!(".{:06}", micros));
    }
    s
}

/// Shortest round-trip rendering; exponent form below 1e-4 and from 1e6 up.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let sci = format!("{:e}", v);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return v.to_string();
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..6).contains(&exp) {
        v.to_string()
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Parameter::Bool(value)
    }
}

macro_rules! int_parameter {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(impl From<$t> for Parameter {
            fn from(value: $t) -> Self {
                Parameter::$variant(<$target>::from(value))
            }
        })*
    };
}

int_parameter!(Int, i64, i8, i16, i32, i64);
int_parameter!(UInt, u64, u8, u16, u32, u64);

impl From<f32> for Parameter {
    fn from(value: f32) -> Self {
        Parameter::Float(f64::from(value))
    }
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Parameter::Float(value)
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Parameter::Text(value)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Parameter::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Parameter {
    fn from(value: Vec<u8>) -> Self {
        Parameter::Bytes(value)
    }
}

impl From<&[u8]> for Parameter {
    fn from(value: &[u8]) -> Self {
        Parameter::Bytes(value.to_vec())
    }
}

impl<Z: TimeZone> From<DateTime<Z>> for Parameter {
    fn from(value: DateTime<Z>) -> Self {
        Parameter::Timestamp(value.with_timezone(&Utc))
    }
}

impl<T: Into<Parameter>> From<Option<T>> for Parameter {
    fn from(value: Option<T>) -> Self {
        value.map_or(Parameter::Null, Into::into)
    }
}
