//! Pre-I/O validation: symbol grammar, interval support, and the
//! symbol-listing availability check.

use kandle_binance::{listing, markets, symbols};
use kandle_core::{DataRequest, FcpError};
use tracing::warn;

/// Run the preflight. Returns whether the symbol is *known* to the listing
/// tables; the aggregate empty-result error only applies to known symbols.
///
/// # Errors
/// - `FcpError::InvalidSymbol` / `FcpError::UnsupportedInterval` for grammar
///   and capability violations.
/// - `FcpError::DataNotAvailable` when the requested start precedes the
///   symbol's earliest listed date.
pub(crate) fn run(req: &DataRequest) -> Result<bool, FcpError> {
    symbols::validate_symbol(req.provider, req.market, &req.symbol)?;
    markets::ensure_interval_supported(req.provider, req.market, req.interval)?;

    let canonical = symbols::canonical_symbol(req.provider, req.market, &req.symbol);
    let mut known = false;
    if let Some(info) = listing::symbol_availability(req.market, &canonical) {
        known = true;
        if req.start < info.earliest {
            return Err(FcpError::DataNotAvailable {
                symbol: canonical,
                market: req.market,
                requested_start: req.start,
                earliest_available: info.earliest,
            });
        }
    }

    // Non-futures requests starting before the futures counterpart existed
    // get a structured warning, never a failure.
    if let Some((futures_market, futures_symbol)) =
        listing::futures_counterpart(req.market, &canonical)
    {
        if let Some(info) = listing::symbol_availability(futures_market, &futures_symbol) {
            if req.start < info.earliest {
                let earliest = info.earliest.date_naive();
                eprintln!(
                    "FUTURES COUNTERPART WARNING: {futures_symbol} has no {market} data before {earliest}; requested start is {start}",
                    market = futures_market,
                    start = req.start.date_naive(),
                );
                warn!(
                    symbol = %futures_symbol,
                    futures_market = %futures_market,
                    %earliest,
                    requested_start = %req.start.date_naive(),
                    "futures counterpart listed after the requested start"
                );
            }
        }
    }

    Ok(known)
}
