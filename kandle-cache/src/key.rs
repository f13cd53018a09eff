use std::path::PathBuf;

use chrono::NaiveDate;
use kandle_types::{ChartType, DataProvider, Interval, MarketType};

/// Identity of one daily cache file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Venue the data came from.
    pub provider: DataProvider,
    /// Market segment.
    pub market: MarketType,
    /// Series kind.
    pub chart: ChartType,
    /// Trading symbol (canonicalized on render).
    pub symbol: String,
    /// Candle interval.
    pub interval: Interval,
    /// UTC day the file covers.
    pub date: NaiveDate,
}

impl CacheKey {
    /// Build a key for a kline day.
    #[must_use]
    pub fn new(
        provider: DataProvider,
        market: MarketType,
        chart: ChartType,
        symbol: impl Into<String>,
        interval: Interval,
        date: NaiveDate,
    ) -> Self {
        Self {
            provider,
            market,
            chart,
            symbol: symbol.into(),
            interval,
            date,
        }
    }

    /// Symbol as it appears in paths: uppercased, with the `_PERP` suffix
    /// appended for coin-margined perpetuals that do not already carry a
    /// delivery code.
    #[must_use]
    pub fn canonical_symbol(&self) -> String {
        let upper = self.symbol.to_uppercase();
        if self.market == MarketType::FuturesCoin
            && !upper.ends_with("_PERP")
            && !upper.chars().any(|c| c.is_ascii_digit())
        {
            return format!("{upper}_PERP");
        }
        upper
    }

    /// Path of the file relative to the cache root:
    /// `{provider}/{market_path}/{chart_path}/daily/{SYMBOL}/{interval}/{YYYY-MM-DD}.arrow`.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::from(self.provider.as_str());
        path.push(self.market.vision_path());
        path.push(self.chart.vision_path());
        path.push("daily");
        path.push(self.canonical_symbol());
        path.push(self.interval.as_str());
        path.push(format!("{}.arrow", self.date));
        path
    }

    /// Directory holding every daily file for this symbol and interval,
    /// relative to the cache root.
    #[must_use]
    pub fn series_dir(&self) -> PathBuf {
        let mut path = PathBuf::from(self.provider.as_str());
        path.push(self.market.vision_path());
        path.push(self.chart.vision_path());
        path.push("daily");
        path.push(self.canonical_symbol());
        path.push(self.interval.as_str());
        path
    }
}
