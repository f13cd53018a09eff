use core::fmt;
use serde::{Deserialize, Serialize};

/// Data provider (venue) whose endpoints serve the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DataProvider {
    /// Binance: spot, USDT/coin-margined futures, options, plus the Vision bulk archive.
    #[default]
    Binance,
    /// OKX: spot and swap candles via the v5 market endpoints. No bulk archive.
    Okx,
}

impl DataProvider {
    /// Lowercase provider tag as used in cache paths and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Okx => "okx",
        }
    }

    /// Whether the provider publishes a daily bulk archive (the Vision transport).
    #[must_use]
    pub const fn has_bulk_archive(self) -> bool {
        matches!(self, Self::Binance)
    }
}

impl fmt::Display for DataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market segment a symbol trades in.
///
/// The segment determines endpoint family, per-request record limits,
/// supported intervals, symbol grammar, and the `market_path` fragment of
/// both archive URLs and cache paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum MarketType {
    /// Spot market (`BTCUSDT`).
    Spot,
    /// USDT-margined futures, "UM" (`BTCUSDT`).
    FuturesUsdt,
    /// Coin-margined futures, "CM" (`BTCUSD_PERP` or delivery-dated).
    FuturesCoin,
    /// European-style options (`BTC-230630-60000-C`).
    Options,
}

impl MarketType {
    /// Uppercase tag used in error messages and provenance logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "SPOT",
            Self::FuturesUsdt => "FUTURES_USDT",
            Self::FuturesCoin => "FUTURES_COIN",
            Self::Options => "OPTIONS",
        }
    }

    /// `market_path` fragment shared by the Vision URL grammar and the cache tree.
    #[must_use]
    pub const fn vision_path(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::FuturesUsdt => "futures/um",
            Self::FuturesCoin => "futures/cm",
            Self::Options => "options",
        }
    }

    /// True for either futures segment.
    #[must_use]
    pub const fn is_futures(self) -> bool {
        matches!(self, Self::FuturesUsdt | Self::FuturesCoin)
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of series being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ChartType {
    /// Fixed-interval OHLCV candles.
    #[default]
    Klines,
    /// Funding-rate settlements (futures only, 8h natural cadence on most venues).
    FundingRate,
}

impl ChartType {
    /// `chart_path` fragment shared by the Vision URL grammar and the cache tree.
    #[must_use]
    pub const fn vision_path(self) -> &'static str {
        match self {
            Self::Klines => "klines",
            Self::FundingRate => "fundingRate",
        }
    }

    /// Uppercase tag used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Klines => "KLINES",
            Self::FundingRate => "FUNDING_RATE",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_paths_match_archive_grammar() {
        assert_eq!(MarketType::Spot.vision_path(), "spot");
        assert_eq!(MarketType::FuturesUsdt.vision_path(), "futures/um");
        assert_eq!(MarketType::FuturesCoin.vision_path(), "futures/cm");
        assert_eq!(MarketType::Options.vision_path(), "options");
    }

    #[test]
    fn funding_rate_uses_camel_case_path() {
        assert_eq!(ChartType::FundingRate.vision_path(), "fundingRate");
    }
}
