//! The failover orchestration loop: preflight, staged source chain with
//! missing-range recomputation, priority merge, final filter.

mod cache_stage;
mod preflight;

use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use kandle_cache::{ArrowCache, CacheKey};
use kandle_core::schema::{self, open_time_micros};
use kandle_core::timeseries::missing_ranges;
use kandle_core::{
    DataRequest, DataSource, EnforceSource, FcpError, KlineSource, MarketFrame, MergePipeline,
};
use kandle_types::ChartType;
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::core::Kandle;
use cache_stage::CacheStage;

/// Cache-root override, observed on every call.
const ENV_CACHE_DIR: &str = "KANDLE_CACHE_DIR";
/// Cache kill-switch ("1" or "true"), observed on every call.
const ENV_DISABLE_CACHE: &str = "KANDLE_DISABLE_CACHE";

const MICROS_PER_DAY: i64 = 86_400_000_000;

impl Kandle {
    /// Retrieve a complete, ordered, deduplicated series for the request.
    ///
    /// Stages run in the configured priority order; each consumes the
    /// residual missing sub-ranges and narrows them for the next. Overlaps
    /// resolve by source priority. A rate-limit signal mid-chain preserves
    /// everything fetched so far and surfaces via the frame metadata.
    ///
    /// # Errors
    /// - Configuration, symbol, and interval violations before any I/O.
    /// - `FcpError::DataNotAvailable` from the availability preflight.
    /// - `FcpError::NoData` when the full chain ends empty for a
    ///   known-available symbol.
    pub async fn get_data(&self, req: &DataRequest) -> Result<MarketFrame, FcpError> {
        let started = Instant::now();
        let known = preflight::run(req)?;
        let cache = self.effective_cache(req)?;

        let chain: Vec<DataSource> = match req.enforce_source.only() {
            Some(source) => vec![source],
            None => self.cfg.source_priority.clone(),
        };

        let requested = req.range();
        let mut missing = vec![requested];
        let mut pipeline = MergePipeline::new();
        let mut accumulated: Vec<LazyFrame> = Vec::new();
        let mut rate_limited = false;

        for stage in chain {
            if missing.is_empty() {
                break;
            }
            let batch = match stage {
                DataSource::Cache => {
                    let Some(cache) = &cache else { continue };
                    CacheStage::new(cache.clone()).fetch(req, &missing).await?
                }
                DataSource::Unknown => continue,
                tag => {
                    let Some(source) = self.sources.iter().find(|s| s.source() == tag) else {
                        debug!(stage = %tag, "no source registered for stage");
                        continue;
                    };
                    source.fetch(req, &missing).await?
                }
            };

            let stage_rate_limited = batch.rate_limited;
            rate_limited |= stage_rate_limited;

            if batch.frame.height() > 0 {
                debug!(stage = %stage, rows = batch.frame.height(), "stage contributed rows");
                if stage != DataSource::Cache {
                    if let Some(cache) = &cache {
                        persist_days(cache, req, &batch.frame);
                    }
                }
                accumulated.push(batch.frame.clone().lazy());
                let combined = concat(
                    accumulated.clone(),
                    UnionArgs {
                        rechunk: true,
                        to_supertypes: true,
                        diagonal: true,
                        ..Default::default()
                    },
                )?
                .collect()?;
                missing = missing_ranges(&combined, req.interval, &requested)?;
                pipeline.add_source(batch.frame, stage);
            }

            if stage_rate_limited {
                // Nothing downstream may discard what earlier stages built.
                break;
            }
        }

        let merged = pipeline.collect()?;
        let frame = schema::filter_range(
            merged.lazy(),
            requested.start_micros(),
            requested.end_micros() - 1,
        )
        .collect()?;

        // Upstream anomalies stay in the frame; they are flagged, never
        // synthesized away.
        if let Ok(violations) = schema::ohlc_violations(&frame) {
            if violations > 0 {
                warn!(violations, rows = frame.height(), "rows violate OHLC sanity");
            }
        }

        if frame.height() == 0 && known && req.enforce_source == EnforceSource::Auto && !rate_limited
        {
            return Err(FcpError::NoData {
                symbol: req.symbol.clone(),
            });
        }

        let result = MarketFrame {
            frame,
            rate_limited,
            fcp_partial: rate_limited || !missing.is_empty(),
        };

        if !result.is_empty() {
            if let Ok(distribution) = result.source_distribution() {
                for (tag, rows) in &distribution {
                    debug!(source = %tag, rows, total = result.records(), "merge distribution");
                }
            }
        }
        info!(
            symbol = %req.symbol,
            rows = result.records(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            rate_limited = result.rate_limited,
            partial = result.fcp_partial,
            "request complete"
        );
        Ok(result)
    }

    /// Resolve the cache for this call, honoring the environment flags
    /// without a process restart.
    fn effective_cache(&self, req: &DataRequest) -> Result<Option<ArrowCache>, FcpError> {
        let env_disabled = std::env::var(ENV_DISABLE_CACHE)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let enabled = self.cfg.use_cache && req.use_cache && !env_disabled;
        if !enabled {
            if req.enforce_source == EnforceSource::Cache {
                return Err(FcpError::config(
                    "enforce_source=CACHE but the cache is disabled",
                ));
            }
            return Ok(None);
        }
        let root = std::env::var(ENV_CACHE_DIR)
            .ok()
            .map(PathBuf::from)
            .or_else(|| self.cfg.cache_root.clone())
            .unwrap_or_else(|| PathBuf::from("cache"));
        Ok(Some(ArrowCache::new(root)))
    }
}

/// Write complete fetched days back into the cache tree. Partial days stay
/// uncached so the next request re-evaluates them.
fn persist_days(cache: &ArrowCache, req: &DataRequest, frame: &DataFrame) {
    if req.chart != ChartType::Klines {
        return;
    }
    let step_secs = req.interval.seconds();
    if step_secs > 86_400 {
        // Daily packaging cannot hold coarser cadences.
        return;
    }
    let expected_rows = usize::try_from(86_400 / step_secs).unwrap_or(0).max(1);

    let Ok(times) = open_time_micros(frame) else {
        return;
    };
    let (Some(first), Some(last)) = (times.first(), times.last()) else {
        return;
    };

    let mut day_start = first - first.rem_euclid(MICROS_PER_DAY);
    while day_start <= *last {
        let day_end = day_start + MICROS_PER_DAY;
        let slice = schema::filter_range(frame.clone().lazy(), day_start, day_end - 1).collect();
        let Ok(mut slice) = slice else {
            day_start = day_end;
            continue;
        };
        if slice.height() == expected_rows {
            if let Some(day) = date_from_micros(day_start) {
                let key = CacheKey::new(
                    req.provider,
                    req.market,
                    req.chart,
                    &req.symbol,
                    req.interval,
                    day,
                );
                if cache.exists(&key) {
                    debug!(%day, "cache file already present, clobbering with equivalent content");
                }
                match cache.write(&key, &mut slice) {
                    Ok(Some(path)) => debug!(path = %path.display(), "persisted fetched day"),
                    Ok(None) => {}
                    Err(err) => warn!(%day, error = %err, "cache write failed"),
                }
            }
        }
        day_start = day_end;
    }
}

fn date_from_micros(us: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp_micros(us).map(|dt| dt.date_naive())
}
