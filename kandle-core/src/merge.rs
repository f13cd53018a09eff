//! Priority merge over tagged source frames.
//!
//! The merge is a pure pipeline: standardize each tagged lazy frame,
//! concatenate diagonally (absorbing minor schema differences), sort by
//! `(open_time, priority)`, dedupe on `open_time` keeping the last (highest
//! priority) row, then re-sort. Nothing mutates in place and the result
//! materializes once.

use kandle_types::DataSource;
use polars::prelude::*;
use tracing::debug;

use crate::FcpError;
use crate::schema::{self, DATA_SOURCE, OPEN_TIME};

const PRIORITY: &str = "_priority";

/// Expression mapping the provenance column to its merge priority.
///
/// Fixed map: `UNKNOWN:0, VISION:1, CACHE:2, REST:3`. Unrecognized tags fall
/// to 0 so they lose every conflict.
#[must_use]
pub fn source_priority_expr() -> Expr {
    when(col(DATA_SOURCE).eq(lit(DataSource::Rest.as_str())))
        .then(lit(i32::from(DataSource::Rest.priority())))
        .when(col(DATA_SOURCE).eq(lit(DataSource::Cache.as_str())))
        .then(lit(i32::from(DataSource::Cache.priority())))
        .when(col(DATA_SOURCE).eq(lit(DataSource::Vision.as_str())))
        .then(lit(i32::from(DataSource::Vision.priority())))
        .otherwise(lit(i32::from(DataSource::Unknown.priority())))
}

/// Accumulates tagged lazy frames and collapses them into one ordered,
/// deduplicated frame.
#[derive(Default)]
pub struct MergePipeline {
    frames: Vec<LazyFrame>,
}

impl MergePipeline {
    /// An empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an eager frame under a provenance tag.
    ///
    /// Empty frames are skipped; a `_data_source` column already present on
    /// the frame wins over the tag (rows keep their original provenance).
    pub fn add_source(&mut self, df: DataFrame, source: DataSource) {
        if df.height() == 0 {
            debug!(source = %source, "skipping empty frame");
            return;
        }
        self.add_lazy(df.lazy(), source);
    }

    /// Add a lazy frame under a provenance tag.
    pub fn add_lazy(&mut self, lf: LazyFrame, source: DataSource) {
        let mut lf = lf;
        let tagged = match lf.collect_schema() {
            Ok(schema) if schema.contains(DATA_SOURCE) => lf,
            _ => lf.with_column(lit(source.as_str()).alias(DATA_SOURCE)),
        };
        self.frames.push(tagged);
        debug!(source = %source, "added source to merge pipeline");
    }

    /// Whether no source contributed any rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Collapse all sources into the final frame.
    ///
    /// # Errors
    /// Returns `FcpError::Data` when standardization or the union fails
    /// (schema drift that casting could not absorb).
    pub fn collect(self) -> Result<DataFrame, FcpError> {
        if self.frames.is_empty() {
            return Ok(schema::empty_frame());
        }

        let mut standardized = Vec::with_capacity(self.frames.len());
        for lf in self.frames {
            standardized.push(schema::standardize(lf)?);
        }

        let combined = if standardized.len() == 1 {
            standardized.pop().unwrap_or_else(|| schema::empty_frame().lazy())
        } else {
            concat(
                standardized,
                UnionArgs {
                    rechunk: true,
                    to_supertypes: true,
                    diagonal: true,
                    ..Default::default()
                },
            )?
        };

        let sorted = combined
            .with_column(source_priority_expr().alias(PRIORITY))
            .sort([OPEN_TIME, PRIORITY], SortMultipleOptions::default())
            .collect()?;

        let subset = vec![OPEN_TIME.to_string()];
        let deduped =
            sorted.unique::<String, String>(Some(&subset), UniqueKeepStrategy::Last, None)?;

        let out = deduped
            .drop(PRIORITY)?
            .lazy()
            .sort([OPEN_TIME], SortMultipleOptions::default())
            .collect()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged_frame(times_us: Vec<i64>, close: f64) -> DataFrame {
        let n = times_us.len();
        df!(
            OPEN_TIME => times_us,
            "open" => vec![close; n],
            "high" => vec![close; n],
            "low" => vec![close; n],
            "close" => vec![close; n],
            "volume" => vec![1.0f64; n],
        )
        .unwrap()
    }

    #[test]
    fn rest_wins_duplicate_open_times() {
        let mut pipeline = MergePipeline::new();
        pipeline.add_source(tagged_frame(vec![1_000_000, 2_000_000], 10.0), DataSource::Cache);
        pipeline.add_source(tagged_frame(vec![2_000_000, 3_000_000], 20.0), DataSource::Rest);

        let out = pipeline.collect().unwrap();
        assert_eq!(out.height(), 3);
        let close = out.column("close").unwrap().f64().unwrap();
        assert_eq!(close.get(0), Some(10.0)); // cache-only row
        assert_eq!(close.get(1), Some(20.0)); // conflict: REST wins
        assert_eq!(close.get(2), Some(20.0)); // rest-only row
    }

    #[test]
    fn cache_beats_vision_on_conflicts() {
        let mut pipeline = MergePipeline::new();
        pipeline.add_source(tagged_frame(vec![1_000_000], 5.0), DataSource::Vision);
        pipeline.add_source(tagged_frame(vec![1_000_000], 7.0), DataSource::Cache);

        let out = pipeline.collect().unwrap();
        assert_eq!(out.height(), 1);
        let close = out.column("close").unwrap().f64().unwrap();
        assert_eq!(close.get(0), Some(7.0));
    }

    #[test]
    fn empty_pipeline_yields_canonical_empty_frame() {
        let out = MergePipeline::new().collect().unwrap();
        assert_eq!(out.height(), 0);
        assert!(out.get_column_names_str().contains(&OPEN_TIME));
    }

    #[test]
    fn priority_column_does_not_leak() {
        let mut pipeline = MergePipeline::new();
        pipeline.add_source(tagged_frame(vec![1_000_000], 1.0), DataSource::Rest);
        let out = pipeline.collect().unwrap();
        assert!(!out.get_column_names_str().contains(&PRIORITY));
        assert!(out.get_column_names_str().contains(&DATA_SOURCE));
    }
}
