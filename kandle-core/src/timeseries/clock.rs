use chrono::{DateTime, Utc};
use kandle_types::Interval;

use crate::FcpError;

/// Unit of a raw integer timestamp arriving from upstream.
///
/// Binance archives switched from millisecond (13-digit) to microsecond
/// (16-digit) timestamps with the 2025 generation; both must decode to the
/// same canonical instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampUnit {
    /// Milliseconds since the Unix epoch (13 digits).
    Ms,
    /// Microseconds since the Unix epoch (16 digits).
    Us,
}

impl TimestampUnit {
    /// Detect the unit from the digit count of a raw timestamp.
    ///
    /// # Errors
    /// Returns `FcpError::Data` for non-positive values or digit counts other
    /// than 13 and 16.
    pub fn detect(raw: i64) -> Result<Self, FcpError> {
        let digits = match raw.checked_ilog10() {
            Some(d) if raw > 0 => d + 1,
            _ => {
                return Err(FcpError::data(format!(
                    "cannot detect timestamp unit of {raw}"
                )));
            }
        };
        match digits {
            13 => Ok(Self::Ms),
            16 => Ok(Self::Us),
            other => Err(FcpError::data(format!(
                "unrecognized timestamp with {other} digits: expected 13 (ms) or 16 (µs)"
            ))),
        }
    }

    /// Convert a raw value in this unit to canonical microseconds.
    #[must_use]
    pub const fn to_micros(self, raw: i64) -> i64 {
        match self {
            Self::Ms => raw * 1_000,
            Self::Us => raw,
        }
    }
}

/// Convert a microsecond epoch into a UTC instant.
///
/// # Errors
/// Returns `FcpError::Data` when the epoch is outside chrono's range.
pub fn utc_from_micros(us: i64) -> Result<DateTime<Utc>, FcpError> {
    DateTime::from_timestamp_micros(us)
        .ok_or_else(|| FcpError::data(format!("timestamp {us}µs outside representable range")))
}

/// Largest interval boundary at or before `t`.
#[must_use]
pub fn floor_to(t: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let us = t.timestamp_micros();
    let step = interval.micros();
    let aligned = us - us.rem_euclid(step);
    DateTime::from_timestamp_micros(aligned).unwrap_or(t)
}

/// Smallest interval boundary at or after `t`.
#[must_use]
pub fn ceil_to(t: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let us = t.timestamp_micros();
    let step = interval.micros();
    let rem = us.rem_euclid(step);
    if rem == 0 {
        return t;
    }
    DateTime::from_timestamp_micros(us - rem + step).unwrap_or(t)
}

/// Whether a bar opening at `open_time` has closed by `now`.
///
/// The REST layer filters on this so in-progress bars never reach callers.
#[must_use]
pub fn bar_complete(open_time: DateTime<Utc>, interval: Interval, now: DateTime<Utc>) -> bool {
    now.timestamp_micros() >= open_time.timestamp_micros() + interval.micros()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn detects_millisecond_and_microsecond_units() {
        // 2025-03-15T00:00:00Z in both units.
        let ms: i64 = 1_742_000_400_000;
        let us: i64 = 1_742_000_400_000_000;
        assert_eq!(TimestampUnit::detect(ms).unwrap(), TimestampUnit::Ms);
        assert_eq!(TimestampUnit::detect(us).unwrap(), TimestampUnit::Us);
        assert_eq!(
            TimestampUnit::Ms.to_micros(ms),
            TimestampUnit::Us.to_micros(us)
        );
    }

    #[test]
    fn rejects_unrecognized_digit_counts() {
        assert!(TimestampUnit::detect(1_742_000_400).is_err()); // seconds
        assert!(TimestampUnit::detect(-1).is_err());
    }

    #[test]
    fn floor_and_ceil_align_to_interval_boundaries() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 37, 12).unwrap();
        let floored = floor_to(t, Interval::H1);
        let ceiled = ceil_to(t, Interval::H1);
        assert_eq!(floored, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(ceiled, Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap());
        // Already aligned stays put.
        assert_eq!(ceil_to(floored, Interval::H1), floored);
    }

    #[test]
    fn in_progress_bar_is_incomplete() {
        let open = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let mid = Utc.with_ymd_and_hms(2024, 1, 1, 10, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        assert!(!bar_complete(open, Interval::H1, mid));
        assert!(bar_complete(open, Interval::H1, after));
    }
}
