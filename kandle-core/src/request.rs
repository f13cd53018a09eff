use chrono::{DateTime, Utc};
use kandle_types::{ChartType, DataProvider, EnforceSource, Interval, MarketType};

use crate::FcpError;
use crate::timeseries::TimeRange;

/// An immutable data request, valid for the lifetime of one `get_data` call.
///
/// Constraint checks that need no venue tables happen at build time;
/// market-specific symbol and interval validation happens in preflight,
/// still before any I/O.
#[derive(Debug, Clone)]
pub struct DataRequest {
    /// Venue serving the request.
    pub provider: DataProvider,
    /// Market segment.
    pub market: MarketType,
    /// Series kind (klines or funding rate).
    pub chart: ChartType,
    /// Trading symbol, venue grammar.
    pub symbol: String,
    /// Candle interval.
    pub interval: Interval,
    /// Inclusive range start (UTC).
    pub start: DateTime<Utc>,
    /// Inclusive range end (UTC).
    pub end: DateTime<Utc>,
    /// Optional restriction to a single source.
    pub enforce_source: EnforceSource,
    /// Whether the cache participates for this call.
    pub use_cache: bool,
    /// Retry attempts per source request.
    pub retry_count: u32,
}

impl DataRequest {
    /// Start building a request.
    #[must_use]
    pub fn builder() -> DataRequestBuilder {
        DataRequestBuilder::default()
    }

    /// The requested span as a half-open range (end exclusive for planning;
    /// the final filter is inclusive).
    #[must_use]
    pub const fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// Builder for [`DataRequest`] with pre-I/O validation.
#[derive(Debug, Default)]
pub struct DataRequestBuilder {
    provider: DataProvider,
    market: Option<MarketType>,
    chart: ChartType,
    symbol: Option<String>,
    interval: Option<Interval>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    enforce_source: EnforceSource,
    use_cache: Option<bool>,
    retry_count: Option<u32>,
}

impl DataRequestBuilder {
    /// Set the venue (default Binance).
    #[must_use]
    pub const fn provider(mut self, provider: DataProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Set the market segment (required).
    #[must_use]
    pub const fn market(mut self, market: MarketType) -> Self {
        self.market = Some(market);
        self
    }

    /// Set the series kind (default klines).
    #[must_use]
    pub const fn chart(mut self, chart: ChartType) -> Self {
        self.chart = chart;
        self
    }

    /// Set the trading symbol (required).
    #[must_use]
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Set the candle interval (required).
    #[must_use]
    pub const fn interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Set the inclusive range bounds (required).
    #[must_use]
    pub const fn range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Restrict the chain to one source.
    #[must_use]
    pub const fn enforce_source(mut self, enforce: EnforceSource) -> Self {
        self.enforce_source = enforce;
        self
    }

    /// Toggle cache participation (default true).
    #[must_use]
    pub const fn use_cache(mut self, yes: bool) -> Self {
        self.use_cache = Some(yes);
        self
    }

    /// Retry attempts per source request (default 3).
    #[must_use]
    pub const fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    /// Validate and build the request.
    ///
    /// # Errors
    /// - `FcpError::Config` for missing required fields, an inverted range,
    ///   or the `enforce_source = CACHE` / `use_cache = false` contradiction.
    pub fn build(self) -> Result<DataRequest, FcpError> {
        let market = self
            .market
            .ok_or_else(|| FcpError::config("market type is required"))?;
        let symbol = self
            .symbol
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FcpError::config("symbol is required"))?;
        let interval = self
            .interval
            .ok_or_else(|| FcpError::config("interval is required"))?;
        let (start, end) = match (self.start, self.end) {
            (Some(s), Some(e)) => (s, e),
            _ => return Err(FcpError::config("time range is required")),
        };
        if start >= end {
            return Err(FcpError::config(format!(
                "start {start} must precede end {end}"
            )));
        }

        let use_cache = self.use_cache.unwrap_or(true);
        if self.enforce_source == EnforceSource::Cache && !use_cache {
            return Err(FcpError::config(
                "enforce_source=CACHE contradicts use_cache=false",
            ));
        }

        Ok(DataRequest {
            provider: self.provider,
            market,
            chart: self.chart,
            symbol,
            interval,
            start,
            end,
            enforce_source: self.enforce_source,
            use_cache,
            retry_count: self.retry_count.unwrap_or(3),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DataRequestBuilder {
        DataRequest::builder()
            .market(MarketType::Spot)
            .symbol("BTCUSDT")
            .interval(Interval::H1)
            .range(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            )
    }

    #[test]
    fn builds_with_defaults() {
        let req = base().build().unwrap();
        assert_eq!(req.provider, DataProvider::Binance);
        assert_eq!(req.chart, ChartType::Klines);
        assert!(req.use_cache);
        assert_eq!(req.retry_count, 3);
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DataRequest::builder()
            .market(MarketType::Spot)
            .symbol("BTCUSDT")
            .interval(Interval::H1)
            .range(
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, FcpError::Config { .. }));
    }

    #[test]
    fn rejects_cache_enforcement_without_cache() {
        let err = base()
            .enforce_source(EnforceSource::Cache)
            .use_cache(false)
            .build()
            .unwrap_err();
        assert!(matches!(err, FcpError::Config { .. }));
    }
}
