//! Canonical OHLCV column contract and schema standardization.
//!
//! Every source (cache files, archive CSVs, REST payloads) funnels through
//! [`standardize`] before frames are concatenated: column aliases are mapped
//! to canonical names, timestamps are unified to microsecond-UTC datetimes,
//! and numeric dtypes are cast once at this boundary. The merger can then
//! union frames without type mismatches.

use polars::prelude::*;

use crate::FcpError;

/// Period-start timestamp column (µs, UTC). The primary key of every frame.
pub const OPEN_TIME: &str = "open_time";
/// Period-end timestamp column (µs, UTC).
pub const CLOSE_TIME: &str = "close_time";
/// Provenance tag column (`CACHE` / `VISION` / `REST` / `UNKNOWN`).
pub const DATA_SOURCE: &str = "_data_source";
/// Funding-rate value column (funding-rate charts only).
pub const FUNDING_RATE: &str = "funding_rate";

/// Canonical kline columns in contract order, provenance excluded.
pub const KLINE_COLUMNS: [&str; 11] = [
    OPEN_TIME,
    "open",
    "high",
    "low",
    "close",
    "volume",
    CLOSE_TIME,
    "quote_asset_volume",
    "count",
    "taker_buy_volume",
    "taker_buy_quote_volume",
];

/// Upstream column aliases mapped to canonical names.
///
/// Sources vary: REST arrays are positional but legacy cache files and
/// archive CSVs carry whichever header generation wrote them.
const ALIASES: [(&str, &str); 11] = [
    ("quote_volume", "quote_asset_volume"),
    ("quote_vol", "quote_asset_volume"),
    ("trades", "count"),
    ("number_of_trades", "count"),
    ("taker_buy_base", "taker_buy_volume"),
    ("taker_buy_base_volume", "taker_buy_volume"),
    ("taker_buy_base_asset_volume", "taker_buy_volume"),
    ("taker_buy_quote", "taker_buy_quote_volume"),
    ("taker_buy_quote_asset_volume", "taker_buy_quote_volume"),
    ("time", OPEN_TIME),
    ("timestamp", OPEN_TIME),
];

/// Columns cast to `f64` when present.
const FLOAT_COLUMNS: [&str; 9] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "quote_asset_volume",
    "taker_buy_volume",
    "taker_buy_quote_volume",
    FUNDING_RATE,
];

/// The canonical timestamp dtype: microseconds, UTC.
#[must_use]
pub fn datetime_us_utc() -> DataType {
    DataType::Datetime(TimeUnit::Microseconds, Some(TimeZone::UTC))
}

/// An empty frame with the canonical kline schema.
///
/// Used wherever a stage legitimately produced no rows, so downstream
/// concatenation still sees conformant dtypes.
#[must_use]
pub fn empty_frame() -> DataFrame {
    let schema = Schema::from_iter([
        Field::new(OPEN_TIME.into(), datetime_us_utc()),
        Field::new("open".into(), DataType::Float64),
        Field::new("high".into(), DataType::Float64),
        Field::new("low".into(), DataType::Float64),
        Field::new("close".into(), DataType::Float64),
        Field::new("volume".into(), DataType::Float64),
        Field::new(CLOSE_TIME.into(), datetime_us_utc()),
        Field::new("quote_asset_volume".into(), DataType::Float64),
        Field::new("count".into(), DataType::Int64),
        Field::new("taker_buy_volume".into(), DataType::Float64),
        Field::new("taker_buy_quote_volume".into(), DataType::Float64),
    ]);
    DataFrame::empty_with_schema(&schema)
}

/// Standardize a lazy frame to the canonical contract.
///
/// - Renames known aliases to canonical names (only when the canonical name
///   is not already taken).
/// - Drops the upstream `ignore` column and pandas index remnants.
/// - Casts timestamps to Datetime(µs, UTC), floats to `f64`, `count` to `i64`.
///
/// # Errors
/// Returns `FcpError::Data` when the schema cannot be resolved.
pub fn standardize(lf: LazyFrame) -> Result<LazyFrame, FcpError> {
    let mut lf = lf;
    let schema = lf.collect_schema()?;

    let mut existing: Vec<&str> = Vec::new();
    let mut renamed: Vec<&str> = Vec::new();
    for (alias, canonical) in ALIASES {
        if schema.contains(alias) && !schema.contains(canonical) {
            existing.push(alias);
            renamed.push(canonical);
        }
    }
    if !existing.is_empty() {
        lf = lf.rename(existing, renamed, true);
    }

    let schema = lf.collect_schema()?;
    let keep: Vec<Expr> = schema
        .iter_names()
        .filter(|name| {
            let n = name.as_str();
            n != "ignore" && n != "__index_level_0__" && n != "original_timestamp"
        })
        .map(|name| col(name.as_str()))
        .collect();
    let mut lf = lf.select(keep);

    let schema = lf.collect_schema()?;
    let mut casts: Vec<Expr> = Vec::new();
    for name in [OPEN_TIME, CLOSE_TIME] {
        if schema.contains(name) {
            casts.push(col(name).cast(datetime_us_utc()));
        }
    }
    for name in FLOAT_COLUMNS {
        if schema.contains(name) {
            casts.push(col(name).cast(DataType::Float64));
        }
    }
    if schema.contains("count") {
        casts.push(col("count").cast(DataType::Int64));
    }
    if schema.contains(DATA_SOURCE) {
        casts.push(col(DATA_SOURCE).cast(DataType::String));
    }
    if !casts.is_empty() {
        lf = lf.with_columns(casts);
    }
    Ok(lf)
}

/// Restrict a standardized lazy frame to `[start_us, end_us]` (inclusive)
/// on `open_time`.
#[must_use]
pub fn filter_range(lf: LazyFrame, start_us: i64, end_us: i64) -> LazyFrame {
    let ot = col(OPEN_TIME).cast(DataType::Int64);
    lf.filter(ot.clone().gt_eq(lit(start_us)).and(ot.lt_eq(lit(end_us))))
}

/// Count rows violating OHLC sanity: `low ≤ min(open, close)`,
/// `high ≥ max(open, close)`, `volume ≥ 0`.
///
/// Upstream anomalies are permitted in the output: they are counted and
/// flagged, never dropped or repaired.
///
/// # Errors
/// Returns `FcpError::Data` when the filter cannot be evaluated.
pub fn ohlc_violations(df: &DataFrame) -> Result<usize, FcpError> {
    let schema = df.schema();
    if !["open", "high", "low", "close"]
        .iter()
        .all(|c| schema.contains(c))
    {
        return Ok(0);
    }
    let mut mask = col("low")
        .gt(col("open"))
        .or(col("low").gt(col("close")))
        .or(col("high").lt(col("open")))
        .or(col("high").lt(col("close")));
    if schema.contains("volume") {
        mask = mask.or(col("volume").lt(lit(0.0f64)));
    }
    let bad = df.clone().lazy().filter(mask).collect()?;
    Ok(bad.height())
}

/// Extract `open_time` as sorted microsecond epochs.
///
/// # Errors
/// Returns `FcpError::Data` when the column is missing or non-temporal.
pub fn open_time_micros(df: &DataFrame) -> Result<Vec<i64>, FcpError> {
    if df.height() == 0 {
        return Ok(vec![]);
    }
    let cast = df.column(OPEN_TIME)?.cast(&datetime_us_utc())?;
    let physical = cast.cast(&DataType::Int64)?;
    let mut out: Vec<i64> = physical.i64()?.into_no_null_iter().collect();
    out.sort_unstable();
    Ok(out)
}
