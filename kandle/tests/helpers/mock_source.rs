use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use kandle_core::schema::{OPEN_TIME, standardize};
use kandle_core::{DataRequest, DataSource, FcpError, KlineSource, SourceBatch, TimeRange};
use polars::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted source: serves a fixed set of hourly rows intersecting the
/// missing ranges, optionally cutting off with a rate-limit flag after a
/// given number of rows.
pub struct MockSource {
    tag: DataSource,
    rows_us: Vec<i64>,
    close: f64,
    rate_limit_after: Option<usize>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(tag: DataSource, rows_us: Vec<i64>, close: f64) -> Self {
        Self {
            tag,
            rows_us,
            close,
            rate_limit_after: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty(tag: DataSource) -> Self {
        Self::new(tag, vec![], 0.0)
    }

    pub fn with_rate_limit_after(mut self, rows: usize) -> Self {
        self.rate_limit_after = Some(rows);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KlineSource for MockSource {
    fn source(&self) -> DataSource {
        self.tag
    }

    async fn fetch(
        &self,
        _req: &DataRequest,
        missing: &[TimeRange],
    ) -> Result<SourceBatch, FcpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut served: Vec<i64> = self
            .rows_us
            .iter()
            .copied()
            .filter(|t| {
                missing
                    .iter()
                    .any(|r| *t >= r.start_micros() && *t < r.end_micros())
            })
            .collect();
        served.sort_unstable();

        let mut rate_limited = false;
        if let Some(cutoff) = self.rate_limit_after {
            if served.len() > cutoff {
                served.truncate(cutoff);
                rate_limited = true;
            }
        }

        if served.is_empty() {
            let mut batch = SourceBatch::empty();
            batch.rate_limited = rate_limited;
            return Ok(batch);
        }
        Ok(SourceBatch {
            frame: frame_with(&served, self.close),
            rate_limited,
        })
    }
}

/// Canonical frame with constant OHLCV values at the given open times.
pub fn frame_with(times_us: &[i64], close: f64) -> DataFrame {
    let n = times_us.len();
    let close_times: Vec<i64> = times_us.iter().map(|t| t + 3_599_999_999).collect();
    let df = df!(
        OPEN_TIME => times_us.to_vec(),
        "open" => vec![close; n],
        "high" => vec![close + 1.0; n],
        "low" => vec![close - 1.0; n],
        "close" => vec![close; n],
        "volume" => vec![10.0f64; n],
        "close_time" => close_times,
        "quote_asset_volume" => vec![close * 10.0; n],
        "count" => vec![5i64; n],
        "taker_buy_volume" => vec![4.0f64; n],
        "taker_buy_quote_volume" => vec![close * 4.0; n],
    )
    .unwrap();
    standardize(df.lazy()).unwrap().collect().unwrap()
}

/// Hourly open times (µs) covering `count` bars from `start`.
pub fn hourly(start: DateTime<Utc>, count: usize) -> Vec<i64> {
    let base = start.timestamp_micros();
    (0..count as i64).map(|h| base + h * 3_600_000_000).collect()
}

/// Hourly open times for one full UTC day.
pub fn day_of_hours(date: NaiveDate) -> Vec<i64> {
    let start = date
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists")
        .and_utc();
    hourly(start, 24)
}
