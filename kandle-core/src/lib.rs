//! kandle-core
//!
//! Core types, traits, and utilities shared across the kandle ecosystem.
//!
//! - `error`: the failover-chain error taxonomy.
//! - `request`: the immutable per-call request type.
//! - `source`: the `KlineSource` trait implemented by cache/archive/REST stages.
//! - `schema`: the canonical OHLCV column contract and standardization.
//! - `merge`: the priority merge pipeline (REST > CACHE > VISION > UNKNOWN).
//! - `timeseries`: gap detection, boundary alignment, and timestamp units.
//! - `retry`: the backoff-with-jitter retry policy shared by source layers.
#![warn(missing_docs)]

/// Core error type shared by the orchestrator and all source layers.
pub mod error;
/// Frame wrapper carrying the rate-limit / partial metadata flags.
pub mod frame;
/// Priority merge pipeline over tagged lazy frames.
pub mod merge;
/// The immutable request type and its builder.
pub mod request;
/// Retry policy with exponential backoff and uniform jitter.
pub mod retry;
/// Canonical column contract, alias mapping, and dtype standardization.
pub mod schema;
/// Source trait and per-stage batch type.
pub mod source;
/// Gap detection, interval alignment, and timestamp-unit handling.
pub mod timeseries;

pub use error::FcpError;
pub use frame::MarketFrame;
pub use merge::MergePipeline;
pub use request::{DataRequest, DataRequestBuilder};
pub use retry::RetryPolicy;
pub use source::{KlineSource, SourceBatch};
pub use timeseries::{
    Gap, GapStats, TimeRange, TimestampUnit, bar_complete, ceil_to, detect_gaps, floor_to,
    missing_ranges, utc_from_micros,
};

// Re-export the foundational types so downstream crates can depend on
// kandle-core alone.
pub use kandle_types::{
    ChartType, DataProvider, DataSource, EnforceSource, FcpConfig, GapConfig, Interval,
    MarketType, RetryConfig,
};
