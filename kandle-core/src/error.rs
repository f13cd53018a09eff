use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use kandle_types::{Interval, MarketType};
use thiserror::Error;

/// Unified error type for the kandle workspace.
///
/// The taxonomy mirrors the failover chain: configuration and availability
/// errors are fatal and raised before any I/O; source-layer errors are
/// recoverable within their stage; rate limiting is special-cased (never
/// retried, surfaces partial progress); the aggregate `NoData` is raised only
/// when a known-available range ends the chain empty.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FcpError {
    /// Contradictory or invalid configuration, detected before any I/O.
    #[error("configuration conflict: {reason}")]
    Config {
        /// What contradicts what (e.g. "enforce_source=CACHE requires use_cache=true").
        reason: String,
    },

    /// Symbol does not match the grammar of the target market.
    #[error("invalid symbol {symbol:?} for {market}: {reason}")]
    InvalidSymbol {
        /// The rejected symbol, verbatim.
        symbol: String,
        /// Market whose grammar was violated.
        market: MarketType,
        /// Human-readable reason.
        reason: String,
        /// A corrected form, when one can be derived.
        suggestion: Option<String>,
    },

    /// Interval not served by the target market.
    #[error("interval {interval} is not supported for {market}")]
    UnsupportedInterval {
        /// The unsupported interval.
        interval: Interval,
        /// Market that rejects it.
        market: MarketType,
    },

    /// The requested range starts before the symbol existed.
    #[error(
        "no data for {symbol} on {market}: requested {requested_start} but earliest available is {earliest_available}"
    )]
    DataNotAvailable {
        /// Symbol that failed preflight.
        symbol: String,
        /// Market consulted.
        market: MarketType,
        /// Requested range start.
        requested_start: DateTime<Utc>,
        /// Earliest listing date known for the symbol.
        earliest_available: DateTime<Utc>,
    },

    /// Non-2xx HTTP status from a source endpoint.
    #[error("HTTP error {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },

    /// Venue-level error payload (e.g. `{"code": -1121, "msg": ...}`).
    #[error("API error {code}: {message}")]
    Api {
        /// Venue error code.
        code: i64,
        /// Venue error message.
        message: String,
    },

    /// Transport-level failure (DNS, connect, TLS, mid-body disconnect).
    #[error("network error: {0}")]
    Network(String),

    /// A source request exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body was not decodable as the expected JSON shape.
    #[error("failed to decode JSON response: {0}")]
    JsonDecode(String),

    /// Downloaded archive digest does not match its CHECKSUM sibling.
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Archive URL.
        url: String,
        /// Digest from the CHECKSUM file.
        expected: String,
        /// Digest computed over the downloaded bytes.
        actual: String,
    },

    /// Archive download failed for a non-checksum reason.
    #[error("download failed for {url}: {reason}")]
    DownloadFailed {
        /// Archive URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The archive for a day is inside the publication-lag window.
    #[error("archive for {date} is not yet published")]
    Freshness {
        /// The unpublished day.
        date: NaiveDate,
    },

    /// HTTP 429/418. Never retried; partial progress surfaces to the caller.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Wait hint from the `Retry-After` header, or the 60s default.
        retry_after: Duration,
    },

    /// Every source came back empty for a known-available range.
    #[error("no data from any source for {symbol} over a known-available range")]
    NoData {
        /// Symbol whose chain ended empty.
        symbol: String,
    },

    /// A cache file failed validation.
    #[error("cache validation failed for {path}: {reason}")]
    CacheInvalid {
        /// Offending file.
        path: PathBuf,
        /// Which check failed.
        reason: String,
    },

    /// Issues with frame contents or frame operations (merge, cast, filter).
    #[error("data issue: {0}")]
    Data(String),
}

impl FcpError {
    /// Helper: build a `Config` error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Helper: build a `Network` error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Helper: build a `Data` error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Helper: build a `RateLimited` error with the default 60s hint.
    ///
    /// Sixty seconds matches the venue's per-minute accounting window; a
    /// shorter default re-triggers the limit and escalates 429 into 418.
    #[must_use]
    pub const fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            retry_after: match retry_after {
                Some(d) => d,
                None => Duration::from_secs(60),
            },
        }
    }

    /// Whether the REST retry policy may re-attempt after this error.
    ///
    /// Rate limits are excluded by construction: per-minute limits must reach
    /// the caller instead of being hammered on a seconds-scale backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http { .. }
                | Self::Api { .. }
                | Self::Network(_)
                | Self::Timeout(_)
                | Self::JsonDecode(_)
        )
    }

    /// Structured key/value payload for machine consumption.
    ///
    /// Empty for variants that carry nothing beyond their message.
    #[must_use]
    pub fn details(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Config { reason } => vec![("reason", reason.clone())],
            Self::InvalidSymbol {
                symbol,
                market,
                suggestion,
                ..
            } => {
                let mut d = vec![
                    ("symbol", symbol.clone()),
                    ("market_type", market.to_string()),
                ];
                if let Some(s) = suggestion {
                    d.push(("suggestion", s.clone()));
                }
                d
            }
            Self::UnsupportedInterval { interval, market } => vec![
                ("interval", interval.to_string()),
                ("market_type", market.to_string()),
            ],
            Self::DataNotAvailable {
                symbol,
                market,
                requested_start,
                earliest_available,
            } => vec![
                ("symbol", symbol.clone()),
                ("market_type", market.to_string()),
                ("requested_start", requested_start.to_rfc3339()),
                ("earliest_available", earliest_available.to_rfc3339()),
            ],
            Self::Http { status } => vec![("status", status.to_string())],
            Self::Api { code, message } => {
                vec![("code", code.to_string()), ("message", message.clone())]
            }
            Self::ChecksumMismatch {
                url,
                expected,
                actual,
            } => vec![
                ("url", url.clone()),
                ("expected", expected.clone()),
                ("actual", actual.clone()),
            ],
            Self::DownloadFailed { url, reason } => {
                vec![("url", url.clone()), ("reason", reason.clone())]
            }
            Self::Freshness { date } => vec![("date", date.to_string())],
            Self::RateLimited { retry_after } => {
                vec![("retry_after_secs", retry_after.as_secs().to_string())]
            }
            Self::NoData { symbol } => vec![("symbol", symbol.clone())],
            Self::CacheInvalid { path, reason } => vec![
                ("path", path.display().to_string()),
                ("reason", reason.clone()),
            ],
            _ => vec![],
        }
    }
}

impl From<polars::prelude::PolarsError> for FcpError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::Data(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_defaults_to_sixty_seconds() {
        let err = FcpError::rate_limited(None);
        match err {
            FcpError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(60));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn rate_limited_is_never_retryable() {
        assert!(!FcpError::rate_limited(None).is_retryable());
        assert!(FcpError::Http { status: 500 }.is_retryable());
        assert!(FcpError::JsonDecode("truncated".into()).is_retryable());
        assert!(!FcpError::config("bad flags").is_retryable());
    }

    #[test]
    fn details_carry_availability_fields() {
        let err = FcpError::DataNotAvailable {
            symbol: "BTCUSDT".into(),
            market: MarketType::FuturesUsdt,
            requested_start: DateTime::from_timestamp(1_420_070_400, 0).unwrap(),
            earliest_available: DateTime::from_timestamp(1_577_750_400, 0).unwrap(),
        };
        let details = err.details();
        assert!(details.iter().any(|(k, _)| *k == "earliest_available"));
        assert!(
            details
                .iter()
                .any(|(k, v)| *k == "market_type" && v == "FUTURES_USDT")
        );
    }
}
