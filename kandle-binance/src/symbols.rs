//! Strict symbol validation and canonicalization per market and provider.
//!
//! Validation is deliberately unforgiving: a symbol in the wrong grammar
//! would silently 404 its way through the whole source chain, so rejecting
//! it up front, with a suggested correction, is the cheaper failure.

use kandle_core::FcpError;
use kandle_types::{DataProvider, MarketType};

const OPTIONS_SYMBOL_PARTS: usize = 4;

/// Transform a symbol into the grammar the target market expects.
///
/// Binance coin-margined perpetuals gain `_PERP` (a `USDT` tail is rewritten
/// to `USD_PERP`); OKX symbols are hyphenated, with USDT-margined swaps
/// rendered as `BASE-USD-SWAP`. Symbols already in shape pass through.
#[must_use]
pub fn canonical_symbol(provider: DataProvider, market: MarketType, symbol: &str) -> String {
    let symbol = symbol.to_uppercase();
    match provider {
        DataProvider::Binance => canonical_binance(market, symbol),
        DataProvider::Okx => canonical_okx(market, symbol),
        _ => unreachable!("unknown DataProvider variant"),
    }
}

fn canonical_binance(market: MarketType, symbol: String) -> String {
    if market != MarketType::FuturesCoin {
        return symbol;
    }
    if symbol.ends_with("_PERP") || symbol.chars().any(|c| c.is_ascii_digit()) {
        return symbol;
    }
    if let Some(base) = symbol.strip_suffix("USDT") {
        return format!("{base}USD_PERP");
    }
    format!("{symbol}_PERP")
}

fn canonical_okx(market: MarketType, symbol: String) -> String {
    if symbol.contains('-') {
        return symbol;
    }
    match market {
        MarketType::FuturesUsdt => {
            let base = symbol.strip_suffix("USDT").unwrap_or(&symbol);
            format!("{base}-USD-SWAP")
        }
        _ => {
            for quote in ["USDT", "BUSD", "USDC"] {
                if let Some(base) = symbol.strip_suffix(quote) {
                    if !base.is_empty() {
                        return format!("{base}-{quote}");
                    }
                }
            }
            for quote in ["BTC", "ETH", "USD"] {
                if let Some(base) = symbol.strip_suffix(quote) {
                    if !base.is_empty() {
                        return format!("{base}-{quote}");
                    }
                }
            }
            symbol
        }
    }
}

/// Validate a symbol against the market grammar.
///
/// # Errors
/// Returns `FcpError::InvalidSymbol` carrying a suggested correction when
/// one can be derived.
pub fn validate_symbol(
    provider: DataProvider,
    market: MarketType,
    symbol: &str,
) -> Result<(), FcpError> {
    if symbol.is_empty() {
        return Err(FcpError::InvalidSymbol {
            symbol: String::new(),
            market,
            reason: "symbol cannot be empty".into(),
            suggestion: None,
        });
    }

    match provider {
        DataProvider::Okx => validate_okx(market, symbol),
        DataProvider::Binance => validate_binance(market, symbol),
        _ => unreachable!("unknown DataProvider variant"),
    }
}

fn validate_okx(market: MarketType, symbol: &str) -> Result<(), FcpError> {
    if !symbol.contains('-') {
        return Err(FcpError::InvalidSymbol {
            symbol: symbol.into(),
            market,
            reason: "OKX symbols use the hyphenated form".into(),
            suggestion: Some(canonical_symbol(DataProvider::Okx, market, symbol)),
        });
    }
    if market == MarketType::FuturesUsdt && !symbol.ends_with("-SWAP") {
        let base = symbol.split('-').next().unwrap_or(symbol);
        return Err(FcpError::InvalidSymbol {
            symbol: symbol.into(),
            market,
            reason: "OKX swap symbols end with -SWAP".into(),
            suggestion: Some(format!("{base}-USD-SWAP")),
        });
    }
    Ok(())
}

fn validate_binance(market: MarketType, symbol: &str) -> Result<(), FcpError> {
    match market {
        MarketType::FuturesCoin => {
            let is_perp = symbol.ends_with("_PERP");
            let is_delivery = symbol.chars().any(|c| c.is_ascii_digit());
            if !is_perp && !is_delivery {
                return Err(FcpError::InvalidSymbol {
                    symbol: symbol.into(),
                    market,
                    reason: "coin-margined perpetuals end with _PERP".into(),
                    suggestion: Some(canonical_symbol(DataProvider::Binance, market, symbol)),
                });
            }
        }
        MarketType::Spot => {
            if let Some(base) = symbol.strip_suffix("_PERP") {
                let mut suggestion = base.to_string();
                if suggestion.ends_with("USD") {
                    suggestion.push('T');
                }
                return Err(FcpError::InvalidSymbol {
                    symbol: symbol.into(),
                    market,
                    reason: "this looks like a coin-margined futures symbol".into(),
                    suggestion: Some(suggestion),
                });
            }
        }
        MarketType::Options => {
            let parts: Vec<&str> = symbol.split('-').collect();
            let tagged = symbol.ends_with("-C") || symbol.ends_with("-P");
            if parts.len() != OPTIONS_SYMBOL_PARTS || !tagged {
                return Err(FcpError::InvalidSymbol {
                    symbol: symbol.into(),
                    market,
                    reason: "options symbols follow BASE-YYMMDD-STRIKE-C/P".into(),
                    suggestion: None,
                });
            }
        }
        MarketType::FuturesUsdt => {}
        _ => {}
    }
    Ok(())
}
