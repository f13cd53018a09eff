//! Time-series utilities: ranges, boundary alignment, gap detection.

mod clock;
mod gaps;

pub use clock::{TimestampUnit, bar_complete, ceil_to, floor_to, utc_from_micros};
pub use gaps::{Gap, GapStats, detect_gaps, missing_ranges};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};

/// A half-open `[start, end)` range over UTC instants.
///
/// Source stages consume a set of these ("missing sub-ranges") and shrink it;
/// the final inclusive filter to the requested bounds happens at merge time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Construct a range. Callers must uphold `start <= end`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Lower bound as microsecond epoch.
    #[must_use]
    pub fn start_micros(&self) -> i64 {
        self.start.timestamp_micros()
    }

    /// Upper bound as microsecond epoch.
    #[must_use]
    pub fn end_micros(&self) -> i64 {
        self.end.timestamp_micros()
    }

    /// Whether the range covers no time at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// UTC calendar days touched by the range, in order.
    ///
    /// The exclusive upper bound means a range ending exactly at midnight
    /// does not include that day.
    #[must_use]
    pub fn days(&self) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        if self.is_empty() {
            return out;
        }
        let last = (self.end - ChronoDuration::microseconds(1)).date_naive();
        let mut day = self.start.date_naive();
        while day <= last {
            out.push(day);
            let Some(next) = day.succ_opt() else { break };
            day = next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn days_respects_exclusive_end() {
        let r = TimeRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
        );
        let days = r.days();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].to_string(), "2024-01-01");
        assert_eq!(days[1].to_string(), "2024-01-02");
    }

    #[test]
    fn empty_range_has_no_days() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(TimeRange::new(t, t).days().is_empty());
    }
}
