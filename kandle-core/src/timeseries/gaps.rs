//! Gap detection over monotonic candle series.
//!
//! Gap fields use int64 milliseconds; at the volumes this engine moves,
//! boxed timestamps per gap are measurable overhead in diagnostics-heavy
//! runs.

use kandle_types::{GapConfig, Interval};
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::schema::open_time_micros;
use crate::timeseries::{TimeRange, utc_from_micros};
use crate::FcpError;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// A detected gap between two adjacent rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Timestamp of the row before the gap (ms epoch).
    pub start_ms: i64,
    /// Timestamp of the row after the gap (ms epoch).
    pub end_ms: i64,
    /// Missing time beyond one expected interval (ms).
    pub duration_ms: i64,
    /// Number of expected rows absent between the two.
    pub missing_points: i64,
    /// Whether the gap spans a UTC midnight.
    pub crosses_day_boundary: bool,
}

/// Summary statistics over one gap-detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapStats {
    /// Total gaps found.
    pub total_gaps: usize,
    /// Gaps spanning a UTC midnight.
    pub day_boundary_gaps: usize,
    /// Gaps fully inside a day.
    pub non_boundary_gaps: usize,
    /// Longest gap (ms).
    pub max_gap_duration_ms: i64,
    /// Rows examined.
    pub total_records: usize,
}

/// Detect gaps in a candle frame for a fixed expected interval.
///
/// A spacing counts as a gap when it exceeds `interval × (1 + threshold)`;
/// transitions across UTC midnight use the separate, more tolerant
/// day-boundary threshold to absorb publisher jitter. Inputs spanning less
/// than the configured minimum (default 23h) produce a warning rather than
/// an error: single daily files yield misleading gap analysis.
///
/// # Errors
/// Returns `FcpError::Data` when the frame lacks a usable `open_time`.
pub fn detect_gaps(
    df: &DataFrame,
    interval: Interval,
    cfg: &GapConfig,
) -> Result<(Vec<Gap>, GapStats), FcpError> {
    let times = open_time_micros(df)?;
    if times.len() < 2 {
        warn!(rows = times.len(), "too few rows for gap detection");
        return Ok((
            vec![],
            GapStats {
                total_records: times.len(),
                ..GapStats::default()
            },
        ));
    }

    if cfg.enforce_min_span {
        let span_hours = (times[times.len() - 1] - times[0]) / 3_600_000_000;
        if span_hours < cfg.min_span_hours {
            warn!(
                span_hours,
                min_span_hours = cfg.min_span_hours,
                "input spans less than the minimum for reliable gap analysis"
            );
        }
    }

    let expected = interval.micros();
    let regular_limit = threshold_micros(expected, cfg.gap_threshold);
    let boundary_limit = threshold_micros(expected, cfg.day_boundary_threshold);

    let mut gaps = Vec::new();
    for pair in times.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let dt = next - prev;
        let crosses = prev.div_euclid(MICROS_PER_DAY) != next.div_euclid(MICROS_PER_DAY);
        let limit = if crosses { boundary_limit } else { regular_limit };
        if dt > limit {
            gaps.push(Gap {
                start_ms: prev / 1_000,
                end_ms: next / 1_000,
                duration_ms: (dt - expected) / 1_000,
                missing_points: dt / expected - 1,
                crosses_day_boundary: crosses,
            });
        }
    }

    let mut stats = GapStats {
        total_gaps: gaps.len(),
        total_records: times.len(),
        ..GapStats::default()
    };
    for gap in &gaps {
        if gap.crosses_day_boundary {
            stats.day_boundary_gaps += 1;
        }
        stats.max_gap_duration_ms = stats.max_gap_duration_ms.max(gap.duration_ms);
    }
    stats.non_boundary_gaps = stats.total_gaps - stats.day_boundary_gaps;

    debug!(
        total = stats.total_gaps,
        day_boundary = stats.day_boundary_gaps,
        "gap detection pass complete"
    );
    Ok((gaps, stats))
}

fn threshold_micros(expected: i64, threshold: f64) -> i64 {
    // Integer µs throughout; the fractional threshold is the one sanctioned
    // float, applied once.
    expected + (expected as f64 * threshold) as i64
}

/// Sub-ranges of `requested` not covered by the accumulated frame.
///
/// Each row covers `[open_time, open_time + interval)`; anything else inside
/// the requested range is missing and becomes work for the next source in
/// the chain.
///
/// # Errors
/// Returns `FcpError::Data` when timestamps cannot be extracted or converted.
pub fn missing_ranges(
    df: &DataFrame,
    interval: Interval,
    requested: &TimeRange,
) -> Result<Vec<TimeRange>, FcpError> {
    let step = interval.micros();
    let lo = requested.start_micros();
    let hi = requested.end_micros();
    if lo >= hi {
        return Ok(vec![]);
    }

    let times: Vec<i64> = open_time_micros(df)?
        .into_iter()
        .filter(|t| *t >= lo - step && *t < hi)
        .collect();
    if times.is_empty() {
        return Ok(vec![*requested]);
    }

    let mut out = Vec::new();
    if times[0] > lo {
        out.push(TimeRange::new(requested.start, utc_from_micros(times[0])?));
    }
    let mut covered_until = times[0] + step;
    for pair in times.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next - prev > step {
            out.push(TimeRange::new(
                utc_from_micros(prev + step)?,
                utc_from_micros(next)?,
            ));
        }
        covered_until = next + step;
    }
    if covered_until < hi {
        out.push(TimeRange::new(utc_from_micros(covered_until)?, requested.end));
    }
    Ok(out)
}
