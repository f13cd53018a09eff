use async_trait::async_trait;
use kandle_types::DataSource;
use polars::prelude::DataFrame;

use crate::FcpError;
use crate::request::DataRequest;
use crate::schema;
use crate::timeseries::TimeRange;

/// What one stage of the failover chain produced.
#[derive(Debug)]
pub struct SourceBatch {
    /// Rows fetched by the stage, standardized but not yet merged.
    pub frame: DataFrame,
    /// True when a rate-limit signal stopped the stage early. The rows in
    /// `frame` are everything fetched before the signal.
    pub rate_limited: bool,
}

impl SourceBatch {
    /// A batch with rows and the rate-limit flag clear.
    #[must_use]
    pub const fn new(frame: DataFrame) -> Self {
        Self {
            frame,
            rate_limited: false,
        }
    }

    /// A legitimately empty batch.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(schema::empty_frame())
    }
}

/// One stage of the failover chain: cache, bulk archive, or live REST.
///
/// A source receives the request plus the current set of missing sub-ranges
/// and returns whatever rows it can supply for them. Partial failure inside
/// a source must never discard rows already fetched: return them and let the
/// gap detector shrink the missing set for the next stage.
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// Which provenance tag this source writes.
    fn source(&self) -> DataSource;

    /// Fetch rows for the missing sub-ranges.
    ///
    /// # Errors
    /// Implementations raise only for failures that invalidate the whole
    /// stage; per-day or per-window failures are confined and logged, with
    /// the affected span simply left missing.
    async fn fetch(
        &self,
        req: &DataRequest,
        missing: &[TimeRange],
    ) -> Result<SourceBatch, FcpError>;
}
