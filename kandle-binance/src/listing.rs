//! Symbol listing dates for the availability preflight.
//!
//! One embedded CSV per market type maps symbols to their earliest archived
//! date. Loading happens once per process; lookups are O(1). Symbols absent
//! from the tables are *unknown*, not unavailable: they pass preflight and
//! the source chain gets to try (and usually fail) the request.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use kandle_types::{Interval, MarketType};
use tracing::warn;

const SPOT_CSV: &str = include_str!("../data/spot_earliest_dates.csv");
const UM_CSV: &str = include_str!("../data/um_earliest_dates.csv");
const CM_CSV: &str = include_str!("../data/cm_earliest_dates.csv");

/// Listing information for one symbol on one market.
#[derive(Debug, Clone)]
pub struct SymbolAvailability {
    /// Symbol in venue grammar.
    pub symbol: String,
    /// First UTC instant with archived data.
    pub earliest: DateTime<Utc>,
    /// Intervals with archived data; `None` means every market-supported one.
    pub intervals: Option<Vec<Interval>>,
}

type Table = HashMap<String, SymbolAvailability>;

fn parse_table(raw: &str, market: MarketType) -> Table {
    let mut out = Table::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(raw.as_bytes());
    for record in reader.records() {
        let Ok(record) = record else { continue };
        let (Some(symbol), Some(date)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let Ok(date) = date.parse::<NaiveDate>() else {
            warn!(market = %market, symbol, date, "bad listing date in embedded table");
            continue;
        };
        let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
            continue;
        };
        let intervals = record.get(2).filter(|v| *v != "all").map(|v| {
            v.split(';')
                .filter_map(|tag| Interval::from_str(tag).ok())
                .collect()
        });
        out.insert(
            symbol.to_string(),
            SymbolAvailability {
                symbol: symbol.to_string(),
                earliest: midnight.and_utc(),
                intervals,
            },
        );
    }
    out
}

fn tables() -> &'static HashMap<MarketType, Table> {
    static TABLES: OnceLock<HashMap<MarketType, Table>> = OnceLock::new();
    TABLES.get_or_init(|| {
        HashMap::from([
            (MarketType::Spot, parse_table(SPOT_CSV, MarketType::Spot)),
            (
                MarketType::FuturesUsdt,
                parse_table(UM_CSV, MarketType::FuturesUsdt),
            ),
            (
                MarketType::FuturesCoin,
                parse_table(CM_CSV, MarketType::FuturesCoin),
            ),
        ])
    })
}

/// Look up listing info for a symbol. `None` means the symbol is unknown to
/// the tables (which is not the same as unavailable).
#[must_use]
pub fn symbol_availability(market: MarketType, symbol: &str) -> Option<&'static SymbolAvailability> {
    tables().get(&market)?.get(&symbol.to_uppercase())
}

/// The futures market whose listing should be cross-checked for a
/// non-futures request, together with the futures-grammar symbol to look up.
///
/// Futures requests get no counterpart check.
#[must_use]
pub fn futures_counterpart(market: MarketType, symbol: &str) -> Option<(MarketType, String)> {
    if market.is_futures() {
        return None;
    }
    Some((MarketType::FuturesUsdt, symbol.to_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn btcusdt_um_lists_at_end_of_2019() {
        let info = symbol_availability(MarketType::FuturesUsdt, "BTCUSDT").unwrap();
        assert_eq!(info.earliest.date_naive().to_string(), "2019-12-31");
    }

    #[test]
    fn lookup_is_case_insensitive_on_input() {
        assert!(symbol_availability(MarketType::Spot, "btcusdt").is_some());
    }

    #[test]
    fn unknown_symbols_return_none() {
        assert!(symbol_availability(MarketType::Spot, "NOPEUSDT").is_none());
    }

    #[test]
    fn futures_requests_have_no_counterpart_check() {
        assert!(futures_counterpart(MarketType::FuturesUsdt, "BTCUSDT").is_none());
        assert!(futures_counterpart(MarketType::FuturesCoin, "BTCUSD_PERP").is_none());
        let (market, symbol) = futures_counterpart(MarketType::Spot, "BTCUSDT").unwrap();
        assert_eq!(market, MarketType::FuturesUsdt);
        assert_eq!(symbol, "BTCUSDT");
    }
}
