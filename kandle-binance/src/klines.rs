//! Column accumulator shared by the archive CSV decoder and the REST JSON
//! decoder.

use kandle_core::schema::{self, CLOSE_TIME, OPEN_TIME};
use kandle_core::{FcpError, TimestampUnit};
use polars::prelude::*;

/// Collects kline fields row by row, detecting the timestamp unit from the
/// first row and normalizing everything to canonical microseconds.
#[derive(Default)]
pub(crate) struct KlineColumns {
    unit: Option<TimestampUnit>,
    open_time: Vec<i64>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    close_time: Vec<i64>,
    quote_asset_volume: Vec<f64>,
    count: Vec<i64>,
    taker_buy_volume: Vec<f64>,
    taker_buy_quote_volume: Vec<f64>,
}

/// One raw kline row, timestamps still in their upstream unit.
pub(crate) struct RawKline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub quote_asset_volume: f64,
    pub count: i64,
    pub taker_buy_volume: f64,
    pub taker_buy_quote_volume: f64,
}

impl KlineColumns {
    pub(crate) fn len(&self) -> usize {
        self.open_time.len()
    }

    /// Append a row, dispatching 13- vs 16-digit timestamps on first use.
    pub(crate) fn push(&mut self, row: RawKline) -> Result<(), FcpError> {
        let unit = match self.unit {
            Some(unit) => unit,
            None => {
                let unit = TimestampUnit::detect(row.open_time)?;
                self.unit = Some(unit);
                unit
            }
        };
        self.open_time.push(unit.to_micros(row.open_time));
        self.open.push(row.open);
        self.high.push(row.high);
        self.low.push(row.low);
        self.close.push(row.close);
        self.volume.push(row.volume);
        self.close_time.push(unit.to_micros(row.close_time));
        self.quote_asset_volume.push(row.quote_asset_volume);
        self.count.push(row.count);
        self.taker_buy_volume.push(row.taker_buy_volume);
        self.taker_buy_quote_volume.push(row.taker_buy_quote_volume);
        Ok(())
    }

    /// Materialize the canonical frame. Empty input yields the canonical
    /// empty frame.
    pub(crate) fn into_frame(self) -> Result<DataFrame, FcpError> {
        if self.open_time.is_empty() {
            return Ok(schema::empty_frame());
        }
        let df = df!(
            OPEN_TIME => self.open_time,
            "open" => self.open,
            "high" => self.high,
            "low" => self.low,
            "close" => self.close,
            "volume" => self.volume,
            CLOSE_TIME => self.close_time,
            "quote_asset_volume" => self.quote_asset_volume,
            "count" => self.count,
            "taker_buy_volume" => self.taker_buy_volume,
            "taker_buy_quote_volume" => self.taker_buy_quote_volume,
        )?;
        Ok(schema::standardize(df.lazy())?.collect()?)
    }
}
