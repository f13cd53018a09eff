use async_trait::async_trait;
use kandle_cache::{ArrowCache, CacheKey};
use kandle_core::schema::{self, OPEN_TIME};
use kandle_core::{DataRequest, DataSource, FcpError, KlineSource, SourceBatch, TimeRange};
use polars::prelude::*;
use tracing::debug;

/// The cache stage: lazily scans daily files intersecting the missing
/// ranges and restricts each to its range's span.
pub(crate) struct CacheStage {
    cache: ArrowCache,
}

impl CacheStage {
    pub(crate) const fn new(cache: ArrowCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl KlineSource for CacheStage {
    fn source(&self) -> DataSource {
        DataSource::Cache
    }

    async fn fetch(
        &self,
        req: &DataRequest,
        missing: &[TimeRange],
    ) -> Result<SourceBatch, FcpError> {
        let mut frames: Vec<LazyFrame> = Vec::new();
        let mut hits = 0usize;
        for range in missing {
            for day in range.days() {
                let key = CacheKey::new(
                    req.provider,
                    req.market,
                    req.chart,
                    &req.symbol,
                    req.interval,
                    day,
                );
                if let Some(lf) = self.cache.scan(&key) {
                    // Legacy files may carry millisecond timestamps or alias
                    // columns; standardize before filtering on µs bounds.
                    let Ok(lf) = schema::standardize(lf) else {
                        continue;
                    };
                    hits += 1;
                    frames.push(schema::filter_range(
                        lf,
                        range.start_micros(),
                        range.end_micros() - 1,
                    ));
                }
            }
        }
        debug!(hits, "cache stage scanned daily files");
        if frames.is_empty() {
            return Ok(SourceBatch::empty());
        }

        let combined = concat(
            frames,
            UnionArgs {
                rechunk: true,
                to_supertypes: true,
                diagonal: true,
                ..Default::default()
            },
        )?
        .sort([OPEN_TIME], SortMultipleOptions::default())
        .collect()?;
        Ok(SourceBatch::new(combined))
    }
}
