//! Configuration types shared by the orchestrator and the source layers.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DataSource;

/// Retry policy knobs for a single source request (one archive file, one
/// REST window).
///
/// Rate-limit errors are never retried regardless of these settings;
/// per-minute limits must surface to the caller instead of being hammered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included).
    pub attempts: u32,
    /// Floor of the exponential backoff.
    pub min_backoff: Duration,
    /// Cap of the exponential backoff.
    pub max_backoff: Duration,
    /// Uniform jitter added on top of each backoff, sampled from `[0, jitter]`.
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(120),
            jitter: Duration::from_secs(1),
        }
    }
}

/// Gap-detector thresholds.
///
/// Two thresholds exist because archive publishers jitter around UTC
/// midnight: a spacing that would count as a gap intraday is routine at a
/// day boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapConfig {
    /// Fraction above the expected interval that counts as a gap (0.3 = 30%).
    pub gap_threshold: f64,
    /// Separate, more tolerant fraction for day-boundary transitions.
    pub day_boundary_threshold: f64,
    /// Minimum input span (hours) below which gap analysis is advisory only.
    pub min_span_hours: i64,
    /// Whether to warn when the input is shorter than `min_span_hours`.
    pub enforce_min_span: bool,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            gap_threshold: 0.3,
            day_boundary_threshold: 1.5,
            min_span_hours: 23,
            enforce_min_span: true,
        }
    }
}

/// Engine-wide configuration for the failover source chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcpConfig {
    /// Cache tree root. `None` resolves to the platform default, unless the
    /// cache-dir environment override is set at call time.
    pub cache_root: Option<PathBuf>,
    /// Whether the cache participates at all (read and write).
    pub use_cache: bool,
    /// Stage order for the failover chain. Sources absent from this list are
    /// never consulted.
    pub source_priority: Vec<DataSource>,
    /// Retry policy applied per source request.
    pub retry: RetryConfig,
    /// Gap-detector thresholds.
    pub gap: GapConfig,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Cap on pooled HTTP connections per host.
    pub max_connections: usize,
    /// Bound on concurrent per-day fetches inside the cache and archive stages.
    pub fanout: usize,
}

impl Default for FcpConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            use_cache: true,
            source_priority: vec![DataSource::Cache, DataSource::Vision, DataSource::Rest],
            retry: RetryConfig::default(),
            gap: GapConfig::default(),
            http_timeout: Duration::from_secs(30),
            max_connections: 50,
            fanout: 4,
        }
    }
}
