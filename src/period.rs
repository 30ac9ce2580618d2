//! Epoch timestamps and half-open query periods.
//!
//! All timestamps in the persisted model are plain epoch seconds (UTC).
//! A `Period` is the inclusive `[start, end]` window a caller wants a
//! timeseries restricted to, usually constructed from an ISO 8601
//! duration such as "P3D" counted back from the current time.

use chrono::{DateTime, Utc};
use std::fmt;

/// Seconds since the Unix epoch. Never negative in valid data.
pub type Epoch = i64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PeriodError {
    /// The string is not a parseable ISO 8601 duration.
    InvalidDuration(String),
    /// The epoch value is negative or not a base-10 integer.
    InvalidEpoch(String),
    /// The timestamp is not valid RFC 3339.
    InvalidTimestamp(String),
}

impl fmt::Display for PeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodError::InvalidDuration(s) => write!(f, "invalid ISO 8601 duration: {}", s),
            PeriodError::InvalidEpoch(s) => write!(f, "invalid epoch value: {}", s),
            PeriodError::InvalidTimestamp(s) => write!(f, "invalid RFC 3339 timestamp: {}", s),
        }
    }
}

impl std::error::Error for PeriodError {}

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Period {
    pub start: Epoch,
    pub end: Epoch,
}

impl Period {
    pub fn new(start: Epoch, end: Epoch) -> Self {
        Period { start, end }
    }

    /// Builds a period ending now whose length is the given ISO 8601
    /// duration. A duration longer than the Unix epoch itself clamps the
    /// start to 0.
    pub fn from_iso8601_duration(duration_str: &str) -> Result<Period, PeriodError> {
        let end = current_epoch();
        let start = parse_iso8601_duration(duration_str, end)?;
        Ok(Period { start, end })
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Number of seconds covered by the period.
    pub fn seconds(&self) -> i64 {
        self.end - self.start
    }
}

impl fmt::Display for Period {
    /// Renders the elapsed span back into ISO 8601 duration notation,
    /// e.g. a 3-day period prints as "P3D". Used when logging or echoing
    /// the effective period back to a caller.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_iso8601_duration(self.seconds()))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses a base-10 epoch string from a query parameter.
pub fn parse_epoch(epoch_str: &str) -> Result<Epoch, PeriodError> {
    let epoch: i64 = epoch_str
        .trim()
        .parse()
        .map_err(|_| PeriodError::InvalidEpoch(epoch_str.to_string()))?;

    if epoch < 0 {
        return Err(PeriodError::InvalidEpoch(epoch_str.to_string()));
    }

    Ok(epoch)
}

/// Parses an RFC 3339 timestamp (the provider's wire format) into epoch
/// seconds. Offsets are honored; the result is always UTC-based.
pub fn parse_rfc3339(timestamp: &str) -> Result<Epoch, PeriodError> {
    let dt = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|_| PeriodError::InvalidTimestamp(timestamp.to_string()))?;
    Ok(dt.with_timezone(&Utc).timestamp())
}

/// Parses an ISO 8601 duration and returns the epoch that many seconds
/// before `until`, floored at 0.
///
/// Calendar components use the usual fixed approximations
/// (year = 365.25 days, month = 30.4375 days); the service only ever
/// requests day-scale periods, where the arithmetic is exact.
pub fn parse_iso8601_duration(iso8601: &str, until: Epoch) -> Result<Epoch, PeriodError> {
    let seconds = iso8601_duration_seconds(iso8601)
        .ok_or_else(|| PeriodError::InvalidDuration(iso8601.to_string()))?;

    let start = until - seconds;
    Ok(start.max(0))
}

pub fn current_epoch() -> Epoch {
    Utc::now().timestamp()
}

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_YEAR: f64 = 365.25;
const DAYS_PER_MONTH: f64 = 30.4375;

/// Total seconds of an ISO 8601 duration string (PnYnMnWnDTnHnMnS),
/// rounded up to whole seconds. Returns `None` on malformed input.
fn iso8601_duration_seconds(s: &str) -> Option<i64> {
    let mut chars = s.chars().peekable();
    if chars.next()? != 'P' {
        return None;
    }

    let mut total = 0.0_f64;
    let mut in_time = false;
    let mut saw_component = false;

    while let Some(&c) = chars.peek() {
        if c == 'T' {
            if in_time {
                return None;
            }
            in_time = true;
            chars.next();
            continue;
        }

        // read the numeric part, allowing one decimal fraction
        let mut number = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() || d == '.' {
                number.push(d);
                chars.next();
            } else {
                break;
            }
        }
        let value: f64 = number.parse().ok()?;

        let designator = chars.next()?;
        let seconds = match (designator, in_time) {
            ('Y', false) => value * DAYS_PER_YEAR * SECONDS_PER_DAY,
            ('M', false) => value * DAYS_PER_MONTH * SECONDS_PER_DAY,
            ('W', false) => value * 7.0 * SECONDS_PER_DAY,
            ('D', false) => value * SECONDS_PER_DAY,
            ('H', true) => value * 3_600.0,
            ('M', true) => value * 60.0,
            ('S', true) => value,
            _ => return None,
        };
        total += seconds;
        saw_component = true;
    }

    // "P" and "PT" alone are not durations
    if !saw_component {
        return None;
    }

    Some(total.ceil() as i64)
}

/// Inverse of `iso8601_duration_seconds`, limited to day/time components.
fn format_iso8601_duration(total_seconds: i64) -> String {
    if total_seconds <= 0 {
        return "PT0S".to_string();
    }

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || seconds > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if seconds > 0 {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epoch_accepts_plain_integer() {
        assert_eq!(parse_epoch("1696161600").unwrap(), 1_696_161_600);
        assert_eq!(parse_epoch("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_epoch_rejects_negative_and_garbage() {
        assert!(matches!(
            parse_epoch("-5"),
            Err(PeriodError::InvalidEpoch(_))
        ));
        assert!(matches!(
            parse_epoch("yesterday"),
            Err(PeriodError::InvalidEpoch(_))
        ));
        assert!(matches!(parse_epoch(""), Err(PeriodError::InvalidEpoch(_))));
    }

    #[test]
    fn test_parse_rfc3339_honors_offset() {
        // 12:00 at +02:00 is 10:00 UTC
        let with_offset = parse_rfc3339("2023-10-01T12:00:00+02:00").unwrap();
        let utc = parse_rfc3339("2023-10-01T10:00:00Z").unwrap();
        assert_eq!(with_offset, utc);
    }

    #[test]
    fn test_parse_rfc3339_rejects_bare_date() {
        assert!(matches!(
            parse_rfc3339("2023-10-01"),
            Err(PeriodError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_duration_day_and_time_components() {
        assert_eq!(iso8601_duration_seconds("P3D"), Some(3 * 86_400));
        assert_eq!(iso8601_duration_seconds("PT3H"), Some(3 * 3_600));
        assert_eq!(
            iso8601_duration_seconds("P1DT12H"),
            Some(86_400 + 12 * 3_600)
        );
        assert_eq!(iso8601_duration_seconds("P2W"), Some(14 * 86_400));
        assert_eq!(iso8601_duration_seconds("PT90S"), Some(90));
    }

    #[test]
    fn test_duration_rejects_malformed_input() {
        assert_eq!(iso8601_duration_seconds(""), None);
        assert_eq!(iso8601_duration_seconds("P"), None);
        assert_eq!(iso8601_duration_seconds("3D"), None);
        assert_eq!(iso8601_duration_seconds("P3X"), None);
        // time designators are invalid outside the T section
        assert_eq!(iso8601_duration_seconds("P3H"), None);
    }

    #[test]
    fn test_start_is_floored_at_zero() {
        // asking for a century before 1970 clamps to the epoch
        let start = parse_iso8601_duration("P100Y", 86_400).unwrap();
        assert_eq!(start, 0);
    }

    #[test]
    fn test_period_validity() {
        assert!(Period::new(0, 1).is_valid());
        assert!(!Period::new(5, 5).is_valid());
        assert!(!Period::new(10, 5).is_valid());
    }

    #[test]
    fn test_period_display_round_trips_day_durations() {
        let p = Period::new(1_000_000, 1_000_000 + 3 * 86_400);
        assert_eq!(p.to_string(), "P3D");

        let p = Period::new(0, 86_400 + 3_600 + 90);
        assert_eq!(p.to_string(), "P1DT1H1M30S");
    }

    #[test]
    fn test_from_iso8601_duration_builds_valid_period() {
        let p = Period::from_iso8601_duration("P10D").unwrap();
        assert!(p.is_valid());
        assert_eq!(p.seconds(), 10 * 86_400);
    }

    #[test]
    fn test_from_iso8601_duration_rejects_garbage() {
        assert!(matches!(
            Period::from_iso8601_duration("ten days"),
            Err(PeriodError::InvalidDuration(_))
        ));
    }
}
