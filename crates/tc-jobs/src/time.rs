//! Timestamp decoding.
//!
//! Two parsers live here and they share no format tolerance:
//!
//! - [`parse_timestamp`] accepts epoch seconds, RFC 3339, and two legacy
//!   layouts, trying them in that order.
//! - [`LegacyTime`] reads and writes exactly one layout,
//!   `YYYY-MM-DD HH:MM:SS±HH`, with no fallback.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::JobError;

/// Space-separated legacy layout, no offset.
const LEGACY_SPACE_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";
/// Plus-separated legacy layout, no offset.
const LEGACY_PLUS_LAYOUT: &str = "%Y-%m-%d+%H:%M:%S";

/// A timestamp as it arrives in a request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampInput {
    /// A bare JSON integer, read as Unix epoch seconds.
    Epoch(i64),
    /// Any other JSON number. Only integral epoch seconds are valid, so
    /// these always fail to decode.
    Number(f64),
    /// Any textual encoding.
    Text(String),
}

impl TimestampInput {
    /// Decode into an instant.
    pub fn parse(&self) -> Result<DateTime<Utc>, JobError> {
        parse_timestamp(self)
    }
}

impl From<&str> for TimestampInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<DateTime<Utc>> for TimestampInput {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Text(t.to_rfc3339())
    }
}

/// Decode a request timestamp using the fallback chain.
pub fn parse_timestamp(input: &TimestampInput) -> Result<DateTime<Utc>, JobError> {
    match input {
        TimestampInput::Epoch(secs) => from_epoch(*secs, &secs.to_string()),
        TimestampInput::Number(n) => parse_timestamp_str(&format!("{:?}", n)),
        TimestampInput::Text(s) => parse_timestamp_str(s),
    }
}

/// Decode a textual timestamp; first matching encoding wins.
///
/// Order: epoch seconds, RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD+HH:MM:SS`.
/// The two legacy layouts carry no offset and are read as UTC.
pub fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>, JobError> {
    if let Ok(secs) = s.parse::<i64>() {
        return from_epoch(secs, s);
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }

    [LEGACY_SPACE_LAYOUT, LEGACY_PLUS_LAYOUT]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(s, layout).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| JobError::InvalidTimestamp(s.to_string()))
}

fn from_epoch(secs: i64, raw: &str) -> Result<DateTime<Utc>, JobError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| JobError::InvalidTimestamp(raw.to_string()))
}

/// A timestamp in the fixed `YYYY-MM-DD HH:MM:SS±HH` layout used by the
/// legacy job representation, for both reading and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LegacyTime(DateTime<FixedOffset>);

impl LegacyTime {
    /// Wrap an instant, keeping its offset.
    ///
    /// The layout only carries whole-hour offsets, so an offset such as
    /// `+05:30` is rejected rather than truncated on output.
    pub fn new(t: DateTime<FixedOffset>) -> Result<Self, JobError> {
        if t.offset().local_minus_utc() % 3600 != 0 {
            return Err(JobError::InvalidTimestamp(t.to_rfc3339()));
        }
        Ok(Self(t))
    }

    /// Parse the fixed layout. Anything else is an `InvalidTimestamp`.
    pub fn parse(s: &str) -> Result<Self, JobError> {
        let invalid = || JobError::InvalidTimestamp(s.to_string());

        let split = s.len().checked_sub(3).ok_or_else(invalid)?;
        let (head, offset) = (s.get(..split).ok_or_else(invalid)?, &s[split..]);

        let sign = match offset.as_bytes()[0] {
            b'+' => 1,
            b'-' => -1,
            _ => return Err(invalid()),
        };
        let digits = &offset[1..];
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits.parse().map_err(|_| invalid())?;
        let zone = FixedOffset::east_opt(sign * hours * 3600).ok_or_else(invalid)?;

        let naive = NaiveDateTime::parse_from_str(head, LEGACY_SPACE_LAYOUT).map_err(|_| invalid())?;
        zone.from_local_datetime(&naive)
            .single()
            .map(Self)
            .ok_or_else(invalid)
    }

    /// The instant in UTC.
    pub fn to_utc(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }

    /// The instant with its original offset.
    pub fn inner(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

impl From<DateTime<Utc>> for LegacyTime {
    fn from(t: DateTime<Utc>) -> Self {
        Self(t.fixed_offset())
    }
}

impl fmt::Display for LegacyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offset = self.0.offset().local_minus_utc();
        let sign = if offset < 0 { '-' } else { '+' };
        write!(
            f,
            "{}{}{:02}",
            self.0.format(LEGACY_SPACE_LAYOUT),
            sign,
            offset.abs() / 3600
        )
    }
}

impl FromStr for LegacyTime {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for LegacyTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LegacyTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_seconds_string() {
        let t = parse_timestamp_str("1534869508").unwrap();
        assert_eq!(t.timestamp(), 1534869508);
        assert_eq!(t.to_rfc3339(), "2018-08-21T16:38:28+00:00");
    }

    #[test]
    fn test_epoch_seconds_number() {
        let t = parse_timestamp(&TimestampInput::Epoch(1534869508)).unwrap();
        assert_eq!(t.timestamp(), 1534869508);
    }

    #[test]
    fn test_rfc3339_with_offset() {
        let t = parse_timestamp_str("2018-08-21T10:58:56-06:00").unwrap();
        assert_eq!(t.timestamp(), 1534870736);
    }

    #[test]
    fn test_legacy_space_layout() {
        let t = parse_timestamp_str("2018-10-31 1:12:06").unwrap();
        assert_eq!(t.timestamp(), 1540948326);
    }

    #[test]
    fn test_legacy_plus_layout() {
        let t = parse_timestamp_str("2018-10-31+01:12:06").unwrap();
        assert_eq!(t.timestamp(), 1540948326);
    }

    #[test]
    fn test_unparseable_timestamp() {
        let err = parse_timestamp_str("April 1, 2020").unwrap_err();
        assert!(matches!(err, JobError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_timestamp_input_decoding() {
        let n: TimestampInput = serde_json::from_str("1534869508").unwrap();
        assert_eq!(n, TimestampInput::Epoch(1534869508));
        let s: TimestampInput = serde_json::from_str(r#""2018-10-31 1:12:06""#).unwrap();
        assert_eq!(s, TimestampInput::Text("2018-10-31 1:12:06".into()));
        assert!(serde_json::from_str::<TimestampInput>("true").is_err());
    }

    #[test]
    fn test_non_integral_number_is_invalid() {
        let f: TimestampInput = serde_json::from_str("1534869508.0").unwrap();
        assert_eq!(f, TimestampInput::Number(1534869508.0));
        assert!(matches!(parse_timestamp(&f), Err(JobError::InvalidTimestamp(_))));

        let big: TimestampInput = serde_json::from_str("18446744073709551615").unwrap();
        assert!(matches!(big, TimestampInput::Number(_)));
        assert!(matches!(parse_timestamp(&big), Err(JobError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_legacy_time_requires_whole_hour_offset() {
        let t = DateTime::parse_from_rfc3339("2030-01-01T10:00:00-06:00").unwrap();
        assert_eq!(LegacyTime::new(t).unwrap().to_string(), "2030-01-01 10:00:00-06");

        let t = DateTime::parse_from_rfc3339("2030-01-01T10:00:00+05:30").unwrap();
        assert!(matches!(LegacyTime::new(t), Err(JobError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_legacy_time_parse_and_format() {
        let t = LegacyTime::parse("2009-11-10 23:00:00+00").unwrap();
        assert_eq!(t.to_utc().timestamp(), 1257894000);
        assert_eq!(t.to_string(), "2009-11-10 23:00:00+00");
    }

    #[test]
    fn test_legacy_time_negative_offset() {
        let t = LegacyTime::parse("2009-11-10 17:00:00-06").unwrap();
        assert_eq!(t.to_utc().timestamp(), 1257894000);
        assert_eq!(t.to_string(), "2009-11-10 17:00:00-06");
    }

    #[test]
    fn test_legacy_time_has_no_fallback() {
        assert!(LegacyTime::parse("2009-11-10T23:00:00Z").is_err());
        assert!(LegacyTime::parse("1257894000").is_err());
        assert!(LegacyTime::parse("2009-11-10 23:00:00").is_err());
        assert!(LegacyTime::parse("+0").is_err());
    }

    #[test]
    fn test_legacy_time_serde() {
        let t: LegacyTime = serde_json::from_str(r#""2009-11-10 23:00:00+00""#).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), r#""2009-11-10 23:00:00+00""#);
        assert!(serde_json::from_str::<LegacyTime>(r#""bad time""#).is_err());
    }
}
