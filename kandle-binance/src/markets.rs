use kandle_core::FcpError;
use kandle_types::{DataProvider, Interval, MarketType};

/// Endpoint layout, record limits, and interval support for one market on
/// one provider.
#[derive(Debug, Clone)]
pub struct MarketCapabilities {
    /// Primary REST base URL.
    pub primary_endpoint: &'static str,
    /// Backup base URLs, consulted on 5xx from the primary.
    pub backup_endpoints: &'static [&'static str],
    /// Relative kline path on those bases.
    pub kline_path: &'static str,
    /// Relative funding-rate path, when the market settles funding.
    pub funding_rate_path: Option<&'static str>,
    /// Intervals the market serves natively.
    pub supported_intervals: &'static [Interval],
    /// Example of the symbol grammar, used in error messages.
    pub symbol_format: &'static str,
    /// Maximum records per REST request.
    pub max_limit: usize,
    /// Symbol used when a caller supplies none.
    pub default_symbol: &'static str,
}

impl MarketCapabilities {
    /// Every base URL, primary first.
    #[must_use]
    pub fn endpoints(&self) -> Vec<&'static str> {
        let mut out = Vec::with_capacity(1 + self.backup_endpoints.len());
        out.push(self.primary_endpoint);
        out.extend_from_slice(self.backup_endpoints);
        out
    }

    /// Whether the market serves an interval natively.
    #[must_use]
    pub fn supports_interval(&self, interval: Interval) -> bool {
        self.supported_intervals.contains(&interval)
    }
}

/// All intervals (spot serves 1s data).
const ALL_INTERVALS: [Interval; 16] = Interval::ALL;

/// Futures markets serve everything except 1s.
const FUTURES_INTERVALS: [Interval; 15] = [
    Interval::M1,
    Interval::M3,
    Interval::M5,
    Interval::M15,
    Interval::M30,
    Interval::H1,
    Interval::H2,
    Interval::H4,
    Interval::H6,
    Interval::H8,
    Interval::H12,
    Interval::D1,
    Interval::D3,
    Interval::W1,
    Interval::Mo1,
];

/// OKX serves a reduced set (no 1s/3d, no 8h).
const OKX_INTERVALS: [Interval; 13] = [
    Interval::M1,
    Interval::M3,
    Interval::M5,
    Interval::M15,
    Interval::M30,
    Interval::H1,
    Interval::H2,
    Interval::H4,
    Interval::H6,
    Interval::H12,
    Interval::D1,
    Interval::W1,
    Interval::Mo1,
];

static BINANCE_SPOT: MarketCapabilities = MarketCapabilities {
    primary_endpoint: "https://api.binance.com",
    backup_endpoints: &[
        "https://api-gcp.binance.com",
        "https://api1.binance.com",
        "https://api2.binance.com",
        "https://api3.binance.com",
        "https://api4.binance.com",
    ],
    kline_path: "/api/v3/klines",
    funding_rate_path: None,
    supported_intervals: &ALL_INTERVALS,
    symbol_format: "BTCUSDT",
    max_limit: 1000,
    default_symbol: "BTCUSDT",
};

static BINANCE_FUTURES_USDT: MarketCapabilities = MarketCapabilities {
    primary_endpoint: "https://fapi.binance.com",
    backup_endpoints: &[
        "https://fapi-gcp.binance.com",
        "https://fapi1.binance.com",
        "https://fapi2.binance.com",
        "https://fapi3.binance.com",
    ],
    kline_path: "/fapi/v1/klines",
    funding_rate_path: Some("/fapi/v1/fundingRate"),
    supported_intervals: &FUTURES_INTERVALS,
    symbol_format: "BTCUSDT",
    max_limit: 1500,
    default_symbol: "BTCUSDT",
};

static BINANCE_FUTURES_COIN: MarketCapabilities = MarketCapabilities {
    primary_endpoint: "https://dapi.binance.com",
    backup_endpoints: &[
        "https://dapi-gcp.binance.com",
        "https://dapi1.binance.com",
        "https://dapi2.binance.com",
        "https://dapi3.binance.com",
    ],
    kline_path: "/dapi/v1/klines",
    funding_rate_path: Some("/dapi/v1/fundingRate"),
    supported_intervals: &FUTURES_INTERVALS,
    symbol_format: "BTCUSD_PERP",
    max_limit: 1500,
    default_symbol: "BTCUSD_PERP",
};

static BINANCE_OPTIONS: MarketCapabilities = MarketCapabilities {
    primary_endpoint: "https://eapi.binance.com",
    backup_endpoints: &[],
    kline_path: "/eapi/v1/klines",
    funding_rate_path: None,
    supported_intervals: &FUTURES_INTERVALS,
    symbol_format: "BTC-230630-60000-C",
    max_limit: 1000,
    default_symbol: "BTC-230630-60000-C",
};

static OKX_SPOT: MarketCapabilities = MarketCapabilities {
    primary_endpoint: "https://www.okx.com",
    backup_endpoints: &[],
    kline_path: "/api/v5/market/candles",
    funding_rate_path: None,
    supported_intervals: &OKX_INTERVALS,
    symbol_format: "BTC-USDT",
    max_limit: 300,
    default_symbol: "BTC-USDT",
};

static OKX_SWAP: MarketCapabilities = MarketCapabilities {
    primary_endpoint: "https://www.okx.com",
    backup_endpoints: &[],
    kline_path: "/api/v5/market/history-candles",
    funding_rate_path: Some("/api/v5/public/funding-rate-history"),
    supported_intervals: &OKX_INTERVALS,
    symbol_format: "BTC-USD-SWAP",
    max_limit: 300,
    default_symbol: "BTC-USD-SWAP",
};

/// Capability table lookup.
///
/// # Errors
/// Returns `FcpError::Config` for provider/market combinations the engine
/// does not serve (OKX has no coin-margined or options table here).
pub fn capabilities(
    provider: DataProvider,
    market: MarketType,
) -> Result<&'static MarketCapabilities, FcpError> {
    match (provider, market) {
        (DataProvider::Binance, MarketType::Spot) => Ok(&BINANCE_SPOT),
        (DataProvider::Binance, MarketType::FuturesUsdt) => Ok(&BINANCE_FUTURES_USDT),
        (DataProvider::Binance, MarketType::FuturesCoin) => Ok(&BINANCE_FUTURES_COIN),
        (DataProvider::Binance, MarketType::Options) => Ok(&BINANCE_OPTIONS),
        (DataProvider::Okx, MarketType::Spot) => Ok(&OKX_SPOT),
        (DataProvider::Okx, MarketType::FuturesUsdt) => Ok(&OKX_SWAP),
        (provider, market) => Err(FcpError::config(format!(
            "no capability table for {provider} {market}"
        ))),
    }
}

/// Validate interval support for a market, pre-I/O.
///
/// # Errors
/// Returns `FcpError::UnsupportedInterval` when the market cannot serve the
/// interval natively.
pub fn ensure_interval_supported(
    provider: DataProvider,
    market: MarketType,
    interval: Interval,
) -> Result<(), FcpError> {
    let caps = capabilities(provider, market)?;
    if caps.supports_interval(interval) {
        Ok(())
    } else {
        Err(FcpError::UnsupportedInterval { interval, market })
    }
}
