use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical kline interval tag with an integer-seconds magnitude.
///
/// Interval arithmetic is integer-only; the approximate month length
/// (30 days) matches the venue's own bucketing for `1M` archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Interval {
    /// 1 second (spot only on Binance).
    #[serde(rename = "1s")]
    S1,
    /// 1 minute.
    #[serde(rename = "1m")]
    M1,
    /// 3 minutes.
    #[serde(rename = "3m")]
    M3,
    /// 5 minutes.
    #[serde(rename = "5m")]
    M5,
    /// 15 minutes.
    #[serde(rename = "15m")]
    M15,
    /// 30 minutes.
    #[serde(rename = "30m")]
    M30,
    /// 1 hour.
    #[serde(rename = "1h")]
    H1,
    /// 2 hours.
    #[serde(rename = "2h")]
    H2,
    /// 4 hours.
    #[serde(rename = "4h")]
    H4,
    /// 6 hours.
    #[serde(rename = "6h")]
    H6,
    /// 8 hours.
    #[serde(rename = "8h")]
    H8,
    /// 12 hours.
    #[serde(rename = "12h")]
    H12,
    /// 1 day.
    #[serde(rename = "1d")]
    D1,
    /// 3 days.
    #[serde(rename = "3d")]
    D3,
    /// 1 week.
    #[serde(rename = "1w")]
    W1,
    /// 1 month (approximated as 30 days).
    #[serde(rename = "1M")]
    Mo1,
}

/// Error returned when parsing an unrecognized interval tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized interval tag: {tag:?}")]
pub struct ParseIntervalError {
    /// The rejected input.
    pub tag: String,
}

impl Interval {
    /// Every supported interval, finest first.
    pub const ALL: [Self; 16] = [
        Self::S1,
        Self::M1,
        Self::M3,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::H6,
        Self::H8,
        Self::H12,
        Self::D1,
        Self::D3,
        Self::W1,
        Self::Mo1,
    ];

    /// Canonical tag as it appears in URLs, cache paths, and REST queries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S1 => "1s",
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H8 => "8h",
            Self::H12 => "12h",
            Self::D1 => "1d",
            Self::D3 => "3d",
            Self::W1 => "1w",
            Self::Mo1 => "1M",
        }
    }

    /// Interval magnitude in whole seconds.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::S1 => 1,
            Self::M1 => 60,
            Self::M3 => 180,
            Self::M5 => 300,
            Self::M15 => 900,
            Self::M30 => 1800,
            Self::H1 => 3600,
            Self::H2 => 7200,
            Self::H4 => 14400,
            Self::H6 => 21600,
            Self::H8 => 28800,
            Self::H12 => 43200,
            Self::D1 => 86400,
            Self::D3 => 259_200,
            Self::W1 => 604_800,
            Self::Mo1 => 2_592_000,
        }
    }

    /// Interval magnitude in whole milliseconds.
    #[must_use]
    pub const fn millis(self) -> i64 {
        self.seconds() * 1_000
    }

    /// Interval magnitude in whole microseconds (the canonical internal unit).
    #[must_use]
    pub const fn micros(self) -> i64 {
        self.seconds() * 1_000_000
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|iv| iv.as_str() == s)
            .ok_or_else(|| ParseIntervalError { tag: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_table_is_consistent() {
        assert_eq!(Interval::M1.seconds(), 60);
        assert_eq!(Interval::H1.seconds(), 3600);
        assert_eq!(Interval::D1.seconds(), 86400);
        assert_eq!(Interval::W1.seconds(), 604_800);
        assert_eq!(Interval::Mo1.seconds(), 2_592_000);
    }

    #[test]
    fn tags_round_trip_through_from_str() {
        for iv in Interval::ALL {
            assert_eq!(iv.as_str().parse::<Interval>().unwrap(), iv);
        }
        assert!("7m".parse::<Interval>().is_err());
    }

    #[test]
    fn month_tag_is_uppercase() {
        // "1m" is one minute; the month tag must stay distinct.
        assert_eq!(Interval::Mo1.as_str(), "1M");
        assert_ne!(
            "1m".parse::<Interval>().unwrap(),
            "1M".parse::<Interval>().unwrap()
        );
    }
}
