//! kandle-cache
//!
//! Daily Arrow IPC cache for candle frames.
//!
//! One file per `(provider, market, chart, symbol, interval, date)` key, laid
//! out in a deterministic tree under the cache root. Files are written to a
//! sibling temp file and renamed into place, so readers never observe a
//! partial file; reads sniff magic bytes (`ARROW1` for IPC, `PAR1` for legacy
//! Parquet) instead of trusting the extension. Corrupt files are logged and
//! treated as misses; only explicit maintenance may delete them.
#![warn(missing_docs)]

mod key;
mod store;

pub use key::CacheKey;
pub use store::{ArrowCache, ValidateOptions};
