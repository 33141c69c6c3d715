//! Date and time wire formats.
//!
//! Values arrive as `YYYY-MM-DD`, `HH:MM:SS.fff` or `YYYY-MM-DD HH:MM:SS.fff`,
//! optionally followed by a space and an IANA zone name. Values without a zone
//! are read as UTC. Time-of-day values are anchored to 0000-01-01.

use crate::error::ConversionError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Wire layout of a date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire layout of a time of day.
pub const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Wire layout of a timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Zero instant, 0001-01-01 00:00:00 UTC. Stands in for absent times.
pub fn zero_time() -> DateTime<Tz> {
    let midnight = NaiveDate::from_ymd_opt(1, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN);
    Tz::UTC.from_utc_datetime(&midnight)
}

/// Whether `t` is the zero instant.
pub fn is_zero_time<Z: TimeZone>(t: &DateTime<Z>) -> bool {
    t.with_timezone(&Utc) == zero_time().with_timezone(&Utc)
}

/// Parse a date, time or timestamp value.
///
/// # Errors
///
/// - `ConversionError::UnknownTimeZone` if the zone suffix is not an IANA name
/// - `ConversionError::TimeParse` if no layout matches
pub fn parse_time(type_name: &str, value: &str) -> Result<DateTime<Tz>, ConversionError> {
    let (local, zone) = split_zone(value);
    let tz = match zone {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| ConversionError::UnknownTimeZone(name.to_string()))?,
        None => Tz::UTC,
    };

    let naive = parse_naive(local).map_err(|source| ConversionError::TimeParse {
        value: value.to_string(),
        type_name: type_name.to_string(),
        source,
    })?;

    Ok(tz
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive)))
}

/// Split off a trailing zone name. A last word starting with a digit is part of the value.
fn split_zone(value: &str) -> (&str, Option<&str>) {
    match value.rsplit_once(' ') {
        Some((local, zone)) if !zone.starts_with(|c: char| c.is_ascii_digit()) => {
            (local, Some(zone))
        }
        _ => (value, None),
    }
}

fn parse_naive(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    if let Ok(time) = NaiveTime::parse_from_str(value, TIME_FORMAT) {
        let anchor = NaiveDate::from_ymd_opt(0, 1, 1).unwrap_or_default();
        return Ok(anchor.and_time(time));
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_date() {
        let t = parse_time("date", "2020-02-29").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2020, 2, 29));
        assert_eq!(t.hour(), 0);
        assert_eq!(t.timezone(), Tz::UTC);
    }

    #[test]
    fn test_parse_time_of_day() {
        let t = parse_time("time", "13:45:01.250").unwrap();
        assert_eq!(t.year(), 0);
        assert_eq!((t.hour(), t.minute(), t.second()), (13, 45, 1));
        assert_eq!(t.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_parse_timestamp() {
        let t = parse_time("timestamp", "2019-12-31 23:59:59.999").unwrap();
        assert_eq!(t.year(), 2019);
        assert_eq!(t.nanosecond(), 999_000_000);
    }

    #[test]
    fn test_parse_timestamp_with_zone() {
        let t = parse_time(
            "timestamp with time zone",
            "2020-07-01 12:00:00.000 America/Los_Angeles",
        )
        .unwrap();
        assert_eq!(t.timezone(), chrono_tz::America::Los_Angeles);
        assert_eq!(t.with_timezone(&Utc).hour(), 19);
    }

    #[test]
    fn test_unknown_zone() {
        let err = parse_time("timestamp with time zone", "2020-07-01 12:00:00.000 Mars/Olympus")
            .unwrap_err();
        assert!(matches!(err, ConversionError::UnknownTimeZone(ref z) if z == "Mars/Olympus"));
    }

    #[test]
    fn test_unparsable_value() {
        let err = parse_time("date", "yesterday").unwrap_err();
        assert!(matches!(err, ConversionError::TimeParse { .. }));
    }

    #[test]
    fn test_zero_time() {
        let zero = zero_time();
        assert_eq!(zero.year(), 1);
        assert!(is_zero_time(&zero));
        assert!(!is_zero_time(&Utc::now()));
    }
}
