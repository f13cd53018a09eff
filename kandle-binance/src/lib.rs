//! kandle-binance
//!
//! Binance connector for the kandle failover chain. Two `KlineSource`
//! implementations live here:
//!
//! - [`VisionSource`]: the bulk daily archive (zipped CSV + SHA-256 checksum
//!   sibling) at `data.binance.vision`, one day per fetch.
//! - [`RestSource`]: the live kline REST API, paginated by the per-market
//!   record limit, with rate-limit-aware window fetching.
//!
//! Supporting tables cover per-market endpoints and limits (`markets`),
//! strict symbol grammar with suggested corrections (`symbols`), and the
//! symbol listing-date preflight data (`listing`). The OKX capability and
//! symbol tables ride along for callers that plan requests against that
//! venue.
#![warn(missing_docs)]

mod http;
mod klines;

/// Symbol listing dates and availability lookups.
pub mod listing;
/// Per-market endpoint, limit, and interval capability tables.
pub mod markets;
/// The live REST kline source.
pub mod rest;
/// Strict symbol validation and canonicalization.
pub mod symbols;
/// The Vision bulk-archive source.
pub mod vision;
/// Process-wide per-endpoint request-weight accounting.
pub mod weights;

pub use listing::{SymbolAvailability, futures_counterpart, symbol_availability};
pub use markets::{MarketCapabilities, capabilities};
pub use rest::RestSource;
pub use symbols::{canonical_symbol, validate_symbol};
pub use vision::VisionSource;
pub use weights::RateLimitTracker;
