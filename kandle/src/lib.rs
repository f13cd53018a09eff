//! Kandle retrieves complete, ordered, deduplicated OHLCV series by merging
//! three asymmetric sources.
//!
//! Overview
//! - Runs an availability preflight before any I/O and fails loud instead of
//!   returning silently-empty frames.
//! - Executes the source chain in priority order (CACHE → VISION → REST by
//!   default), shrinking the set of missing sub-ranges after each stage.
//! - Resolves overlaps by source priority (REST > CACHE > VISION > UNKNOWN)
//!   in a single lazy merge pass.
//! - Persists freshly fetched days back into the Arrow IPC cache tree so the
//!   next request is local.
//!
//! Key behaviors and trade-offs
//! - Rate limits: a 429/418 mid-REST never discards earlier data. The frame
//!   comes back with `rate_limited` and `fcp_partial` set instead.
//! - Per-day archive failures are confined to their day; the REST stage gets
//!   a chance at whatever the archive could not serve.
//! - Cache corruption is a miss, never an error; only explicit maintenance
//!   deletes files.
//! - An empty result for a known-available range raises; for unknown symbols
//!   it is a legal outcome.
//!
//! ```no_run
//! use kandle::{Kandle, DataRequest, Interval, MarketType};
//! use chrono::{TimeZone, Utc};
//!
//! # async fn run() -> Result<(), kandle::FcpError> {
//! let engine = Kandle::builder().build()?;
//! let req = DataRequest::builder()
//!     .market(MarketType::FuturesUsdt)
//!     .symbol("BTCUSDT")
//!     .interval(Interval::H1)
//!     .range(
//!         Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
//!         Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
//!     )
//!     .build()?;
//! let frame = engine.get_data(&req).await?;
//! println!("{} rows, rate_limited={}", frame.records(), frame.rate_limited);
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

pub(crate) mod core;
mod engine;

pub use core::{Kandle, KandleBuilder};

// Re-export the domain types so most callers need only this crate.
pub use kandle_core::{
    ChartType, DataProvider, DataRequest, DataRequestBuilder, DataSource, EnforceSource, FcpConfig,
    FcpError, GapConfig, Interval, KlineSource, MarketFrame, MarketType, MergePipeline,
    RetryConfig, SourceBatch, TimeRange,
};

pub use kandle_cache::{ArrowCache, CacheKey};
