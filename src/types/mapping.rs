//! Column types and conversion of wire values into typed values.

use crate::connection::Config;
use crate::error::ConversionError;
use crate::transport::ColumnInfo;
use crate::types::datetime::{parse_time, zero_time};
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Declared type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AthenaType {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    /// `float` or `real`
    Float,
    Double,
    Boolean,
    Date,
    Time,
    TimeWithTimeZone,
    Timestamp,
    TimestampWithTimeZone,
    Char,
    Varchar,
    String,
    Varbinary,
    Binary,
    Json,
    Decimal,
    IpAddress,
    IntervalYearToMonth,
    IntervalDayToSecond,
    Array,
    Map,
    Row,
    Struct,
    Unknown,
}

impl AthenaType {
    /// Types whose values are handed to the caller as raw text.
    pub fn is_passthrough(&self) -> bool {
        !matches!(
            self,
            AthenaType::TinyInt
                | AthenaType::SmallInt
                | AthenaType::Integer
                | AthenaType::BigInt
                | AthenaType::Float
                | AthenaType::Double
                | AthenaType::Boolean
                | AthenaType::Date
                | AthenaType::Time
                | AthenaType::TimeWithTimeZone
                | AthenaType::Timestamp
                | AthenaType::TimestampWithTimeZone
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            AthenaType::Date
                | AthenaType::Time
                | AthenaType::TimeWithTimeZone
                | AthenaType::Timestamp
                | AthenaType::TimestampWithTimeZone
        )
    }

    /// Value used for absent cells under the typed-default policy.
    pub fn default_value(&self) -> Value {
        match self {
            AthenaType::TinyInt => Value::TinyInt(0),
            AthenaType::SmallInt => Value::SmallInt(0),
            AthenaType::Integer => Value::Integer(0),
            AthenaType::BigInt => Value::BigInt(0),
            AthenaType::Float => Value::Float(0.0),
            AthenaType::Double => Value::Double(0.0),
            AthenaType::Boolean => Value::Boolean(false),
            t if t.is_temporal() => Value::Time(zero_time()),
            _ => Value::Text(String::new()),
        }
    }

    /// Convert a present wire value.
    ///
    /// # Errors
    ///
    /// Numeric parse errors are returned as-is; booleans other than
    /// `true`/`false` fail with `ConversionError::UnknownBooleanLiteral`;
    /// times fail with a time-parse error.
    pub fn parse_value(&self, raw: &str) -> Result<Value, ConversionError> {
        let value = match self {
            AthenaType::TinyInt => Value::TinyInt(raw.parse()?),
            AthenaType::SmallInt => Value::SmallInt(raw.parse()?),
            AthenaType::Integer => Value::Integer(raw.parse()?),
            AthenaType::BigInt => Value::BigInt(raw.parse()?),
            AthenaType::Float => Value::Float(raw.parse()?),
            AthenaType::Double => Value::Double(raw.parse()?),
            AthenaType::Boolean => match raw {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                other => return Err(ConversionError::UnknownBooleanLiteral(other.to_string())),
            },
            t if t.is_temporal() => Value::Time(parse_time(t.as_str(), raw)?),
            _ => Value::Text(raw.to_string()),
        };
        Ok(value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AthenaType::TinyInt => "tinyint",
            AthenaType::SmallInt => "smallint",
            AthenaType::Integer => "integer",
            AthenaType::BigInt => "bigint",
            AthenaType::Float => "float",
            AthenaType::Double => "double",
            AthenaType::Boolean => "boolean",
            AthenaType::Date => "date",
            AthenaType::Time => "time",
            AthenaType::TimeWithTimeZone => "time with time zone",
            AthenaType::Timestamp => "timestamp",
            AthenaType::TimestampWithTimeZone => "timestamp with time zone",
            AthenaType::Char => "char",
            AthenaType::Varchar => "varchar",
            AthenaType::String => "string",
            AthenaType::Varbinary => "varbinary",
            AthenaType::Binary => "binary",
            AthenaType::Json => "json",
            AthenaType::Decimal => "decimal",
            AthenaType::IpAddress => "ipaddress",
            AthenaType::IntervalYearToMonth => "interval year to month",
            AthenaType::IntervalDayToSecond => "interval day to second",
            AthenaType::Array => "array",
            AthenaType::Map => "map",
            AthenaType::Row => "row",
            AthenaType::Struct => "struct",
            AthenaType::Unknown => "unknown",
        }
    }
}

impl FromStr for AthenaType {
    type Err = ConversionError;

    /// Parse a declared type name. Case is ignored, as is a trailing parameter
    /// list such as `(10,2)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let base = name.split('(').next().unwrap_or_default().trim();
        let ty = match base {
            "tinyint" => AthenaType::TinyInt,
            "smallint" => AthenaType::SmallInt,
            "integer" | "int" => AthenaType::Integer,
            "bigint" => AthenaType::BigInt,
            "float" | "real" => AthenaType::Float,
            "double" => AthenaType::Double,
            "boolean" => AthenaType::Boolean,
            "date" => AthenaType::Date,
            "time" => AthenaType::Time,
            "time with time zone" => AthenaType::TimeWithTimeZone,
            "timestamp" => AthenaType::Timestamp,
            "timestamp with time zone" => AthenaType::TimestampWithTimeZone,
            "char" => AthenaType::Char,
            "varchar" => AthenaType::Varchar,
            "string" => AthenaType::String,
            "varbinary" => AthenaType::Varbinary,
            "binary" => AthenaType::Binary,
            "json" => AthenaType::Json,
            "decimal" => AthenaType::Decimal,
            "ipaddress" => AthenaType::IpAddress,
            "interval year to month" => AthenaType::IntervalYearToMonth,
            "interval day to second" => AthenaType::IntervalDayToSecond,
            "array" => AthenaType::Array,
            "map" => AthenaType::Map,
            "row" => AthenaType::Row,
            "struct" => AthenaType::Struct,
            "unknown" => AthenaType::Unknown,
            _ => return Err(ConversionError::UnknownColumnType(s.to_string())),
        };
        Ok(ty)
    }
}

impl fmt::Display for AthenaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    /// Dates, times and timestamps, in the zone named by the value or UTC
    Time(DateTime<Tz>),
    /// Text and every pass-through type
    Text(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Any integer width widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Integer(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&DateTime<Tz>> {
        match self {
            Value::Time(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Time(t) => write!(f, "{}", t),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// What an absent cell becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingValuePolicy {
    /// An empty text value, whatever the column type
    EmptyString,
    /// The zero value of the column type
    TypedDefault,
    /// A `MissingData` error
    Error,
}

impl MissingValuePolicy {
    /// Empty string wins over typed default when both flags are set.
    pub fn from_config(config: &Config) -> Self {
        if config.is_missing_as_empty_string() {
            MissingValuePolicy::EmptyString
        } else if config.is_missing_as_default() {
            MissingValuePolicy::TypedDefault
        } else {
            MissingValuePolicy::Error
        }
    }
}

/// Converts wire cells into [`Value`]s under a connection's missing-value
/// policy and column masks.
#[derive(Debug, Clone)]
pub struct Coercer {
    policy: MissingValuePolicy,
    masks: HashMap<String, String>,
}

impl Coercer {
    pub fn new(policy: MissingValuePolicy, masks: HashMap<String, String>) -> Self {
        Self { policy, masks }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(MissingValuePolicy::from_config(config), config.masked_columns())
    }

    pub fn policy(&self) -> MissingValuePolicy {
        self.policy
    }

    /// Convert one cell of `column`.
    ///
    /// A mask configured for the column name is returned unconditionally,
    /// before the missing-value policy or the type is consulted.
    ///
    /// # Errors
    ///
    /// - `ConversionError::MissingData` for an absent cell under the error policy
    /// - `ConversionError::UnknownColumnType` for an unrecognised declared type
    /// - a parse error if the value does not fit the declared type
    pub fn coerce(&self, column: &ColumnInfo, raw: Option<&str>) -> Result<Value, ConversionError> {
        if let Some(mask) = self.masks.get(&column.name) {
            return Ok(Value::Text(mask.clone()));
        }

        let Some(raw) = raw else {
            return match self.policy {
                MissingValuePolicy::EmptyString => Ok(Value::Text(String::new())),
                MissingValuePolicy::TypedDefault => Ok(column
                    .type_name
                    .parse::<AthenaType>()
                    .map(|t| t.default_value())
                    .unwrap_or_else(|_| Value::Text(String::new()))),
                MissingValuePolicy::Error => Err(ConversionError::MissingData {
                    column: column.name.clone(),
                }),
            };
        };

        column.type_name.parse::<AthenaType>()?.parse_value(raw)
    }
}
