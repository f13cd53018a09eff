use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kandle_binance::{RestSource, VisionSource};
use kandle_core::{FcpError, KlineSource};
use kandle_types::{DataSource, FcpConfig, GapConfig, RetryConfig};

/// Orchestrator running the failover source chain for each request.
pub struct Kandle {
    pub(crate) cfg: FcpConfig,
    pub(crate) sources: Vec<Arc<dyn KlineSource>>,
}

impl Kandle {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> KandleBuilder {
        KandleBuilder::new()
    }
}

/// Builder for a [`Kandle`] engine.
pub struct KandleBuilder {
    cfg: FcpConfig,
    sources: Vec<Arc<dyn KlineSource>>,
}

impl Default for KandleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KandleBuilder {
    /// Create a builder with sensible defaults.
    ///
    /// Behavior and trade-offs:
    /// - The default chain is CACHE → VISION → REST with the cache enabled;
    ///   the cache root resolves to `./cache` unless overridden here or via
    ///   the cache-dir environment flag at call time.
    /// - Without explicit sources, `build` wires the Binance archive and REST
    ///   sources over one shared HTTP client (30s timeout, 50 pooled
    ///   connections per host).
    /// - Retry defaults: 3 attempts, exponential backoff 1s..120s, 0–1s
    ///   jitter, rate limits never retried.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: FcpConfig::default(),
            sources: vec![],
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn with_config(mut self, cfg: FcpConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Set the cache tree root.
    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cfg.cache_root = Some(root.into());
        self
    }

    /// Enable or disable the cache stage (read and write).
    #[must_use]
    pub const fn use_cache(mut self, yes: bool) -> Self {
        self.cfg.use_cache = yes;
        self
    }

    /// Reorder or restrict the source chain.
    #[must_use]
    pub fn with_source_priority(mut self, priority: Vec<DataSource>) -> Self {
        self.cfg.source_priority = priority;
        self
    }

    /// Override the retry policy applied per source request.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.cfg.retry = retry;
        self
    }

    /// Override the gap-detector thresholds.
    #[must_use]
    pub fn with_gap_config(mut self, gap: GapConfig) -> Self {
        self.cfg.gap = gap;
        self
    }

    /// Override the per-request HTTP timeout.
    #[must_use]
    pub const fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.http_timeout = timeout;
        self
    }

    /// Bound the per-day fan-out inside the cache and archive stages.
    #[must_use]
    pub const fn with_fanout(mut self, fanout: usize) -> Self {
        self.cfg.fanout = fanout;
        self
    }

    /// Register a source, replacing the defaults for its provenance tag.
    ///
    /// The cache stage is built internally from the cache configuration;
    /// sources registered here cover the VISION and REST (or UNKNOWN) slots.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn KlineSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Build the engine, wiring the Binance sources when none were given.
    ///
    /// # Errors
    /// Returns `FcpError::Network` when the shared HTTP client cannot be
    /// constructed.
    pub fn build(mut self) -> Result<Kandle, FcpError> {
        if self.sources.is_empty() {
            let client = reqwest::Client::builder()
                .timeout(self.cfg.http_timeout)
                .pool_max_idle_per_host(self.cfg.max_connections)
                .build()
                .map_err(|e| FcpError::network(format!("http client construction failed: {e}")))?;
            self.sources = vec![
                Arc::new(VisionSource::new(client.clone(), &self.cfg)),
                Arc::new(RestSource::new(client, &self.cfg)),
            ];
        }
        Ok(Kandle {
            cfg: self.cfg,
            sources: self.sources,
        })
    }
}
