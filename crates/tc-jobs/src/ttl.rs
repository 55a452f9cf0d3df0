//! TTL normalization.
//!
//! A TTL arrives either as a duration string (`"121m"`, `"48h"`) or as a
//! number of hours (possibly fractional) and always leaves as whole hours,
//! truncated.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Nanoseconds in one hour.
pub const NANOS_PER_HOUR: i64 = 3_600_000_000_000;

/// Largest TTL, in hours, whose nanosecond count still fits in an `i64`.
pub const MAX_TTL_HOURS: u64 = (i64::MAX / NANOS_PER_HOUR) as u64;

/// A TTL as it arrives in a request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TtlInput {
    /// Number of hours.
    Hours(f64),
    /// Duration string.
    Duration(String),
}

impl TtlInput {
    /// Zero hours and the empty string count as absent.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Hours(hours) => *hours == 0.0,
            Self::Duration(s) => s.is_empty(),
        }
    }
}

impl From<f64> for TtlInput {
    fn from(hours: f64) -> Self {
        Self::Hours(hours)
    }
}

impl From<&str> for TtlInput {
    fn from(s: &str) -> Self {
        Self::Duration(s.to_string())
    }
}

/// A normalized TTL in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TtlHours(u64);

impl TtlHours {
    /// Create from whole hours.
    pub const fn new(hours: u64) -> Self {
        Self(hours)
    }

    /// Get the number of hours.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Check if this is the "no duration" value.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TtlHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.0)
    }
}

/// Normalize a request TTL into whole hours.
pub fn normalize_ttl(input: &TtlInput) -> Result<TtlHours, JobError> {
    match input {
        TtlInput::Hours(hours) => normalize_hours(*hours),
        TtlInput::Duration(s) => normalize_duration(s),
    }
}

fn normalize_hours(hours: f64) -> Result<TtlHours, JobError> {
    if hours < 0.0 {
        return Err(JobError::NegativeTtl);
    }
    if hours.is_nan() || hours >= MAX_TTL_HOURS as f64 {
        return Err(JobError::TtlTooLarge { max: MAX_TTL_HOURS });
    }
    let nanos = (hours * NANOS_PER_HOUR as f64) as i64;
    Ok(TtlHours((nanos / NANOS_PER_HOUR) as u64))
}

fn normalize_duration(s: &str) -> Result<TtlHours, JobError> {
    match parse_duration(s) {
        Ok(nanos) if nanos >= NANOS_PER_HOUR => Ok(TtlHours((nanos / NANOS_PER_HOUR) as u64)),
        _ => Err(JobError::InvalidTtlString { max: MAX_TTL_HOURS }),
    }
}

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration {input:?}: {reason}")]
pub struct DurationParseError {
    input: String,
    reason: &'static str,
}

/// Parse a duration string into signed nanoseconds.
///
/// Accepts an optional sign followed by one or more `<number><unit>` pairs,
/// where the number may carry a fraction (`"1.5h"`, `"2h45m"`, `"-30s"`).
/// Units: `ns`, `us`, `µs`, `μs`, `ms`, `s`, `m`, `h`. A lone `"0"` is allowed.
pub fn parse_duration(input: &str) -> Result<i64, DurationParseError> {
    let err = |reason| DurationParseError {
        input: input.to_string(),
        reason,
    };

    let mut s = input;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Ok(0);
    }
    if s.is_empty() {
        return Err(err("empty duration"));
    }

    const LIMIT: u64 = 1 << 63;
    let mut total: u64 = 0;

    while !s.is_empty() {
        if !s.starts_with(|c: char| c == '.' || c.is_ascii_digit()) {
            return Err(err("expected a number"));
        }

        let (whole, rest) = leading_int(s).ok_or_else(|| err("number overflows"))?;
        let had_whole = rest.len() != s.len();
        s = rest;

        let mut fraction = 0u64;
        let mut scale = 1f64;
        let mut had_fraction = false;
        if let Some(rest) = s.strip_prefix('.') {
            let (f, sc, rest_after) = leading_fraction(rest);
            had_fraction = rest_after.len() != rest.len();
            fraction = f;
            scale = sc;
            s = rest_after;
        }
        if !had_whole && !had_fraction {
            return Err(err("expected a number"));
        }

        let unit_end = s
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(s.len());
        let unit = &s[..unit_end];
        s = &s[unit_end..];
        if unit.is_empty() {
            return Err(err("missing unit"));
        }
        let unit_nanos = unit_in_nanos(unit).ok_or_else(|| err("unknown unit"))?;

        if whole > LIMIT / unit_nanos {
            return Err(err("duration overflows"));
        }
        let mut value = whole * unit_nanos;
        if fraction > 0 {
            value += (fraction as f64 * (unit_nanos as f64 / scale)) as u64;
            if value > LIMIT {
                return Err(err("duration overflows"));
            }
        }

        total = total
            .checked_add(value)
            .filter(|t| *t <= LIMIT)
            .ok_or_else(|| err("duration overflows"))?;
    }

    if negative {
        return Ok((total as i128).wrapping_neg() as i64);
    }
    i64::try_from(total).map_err(|_| err("duration overflows"))
}

fn unit_in_nanos(unit: &str) -> Option<u64> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    })
}

/// Consume leading decimal digits. `None` on overflow.
fn leading_int(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let mut value: u64 = 0;
    for b in s[..end].bytes() {
        value = value.checked_mul(10)?.checked_add(u64::from(b - b'0'))?;
        if value > 1 << 63 {
            return None;
        }
    }
    Some((value, &s[end..]))
}

/// Consume leading fraction digits, dropping precision that would overflow.
fn leading_fraction(s: &str) -> (u64, f64, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let mut value: u64 = 0;
    let mut scale = 1f64;
    let mut overflowed = false;
    for b in s[..end].bytes() {
        if overflowed {
            continue;
        }
        match value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
        {
            Some(v) if v <= i64::MAX as u64 => {
                value = v;
                scale *= 10.0;
            }
            _ => overflowed = true,
        }
    }
    (value, scale, &s[end..])
}
