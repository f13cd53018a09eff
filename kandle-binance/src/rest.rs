//! The live REST kline source.
//!
//! Each missing range is paginated into windows of `limit × interval`;
//! windows are fetched sequentially with retries and endpoint rotation.
//! Rate-limit signals are handled as values at the stage boundary: the
//! accumulated windows are returned with the `rate_limited` flag instead of
//! raising away data earlier stages already produced.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use kandle_core::schema::{self, FUNDING_RATE, OPEN_TIME};
use kandle_core::{
    DataRequest, DataSource, FcpError, KlineSource, RetryPolicy, SourceBatch, TimeRange,
};
use kandle_types::{ChartType, FcpConfig, RetryConfig};
use polars::prelude::*;
use serde_json::Value;
use tracing::{debug, warn};

use crate::http::{map_reqwest, status_error};
use crate::klines::{KlineColumns, RawKline};
use crate::markets::{MarketCapabilities, capabilities};
use crate::symbols::canonical_symbol;
use crate::weights::RateLimitTracker;

/// Live REST source paginated by the venue's per-request record limit.
pub struct RestSource {
    client: reqwest::Client,
    base_override: Option<String>,
    retry_cfg: RetryConfig,
    http_timeout: Duration,
}

impl RestSource {
    /// Build the source over a shared HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client, cfg: &FcpConfig) -> Self {
        Self {
            client,
            base_override: None,
            retry_cfg: cfg.retry.clone(),
            http_timeout: cfg.http_timeout,
        }
    }

    /// Replace every venue endpoint with one base URL (tests).
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_override = Some(base.into());
        self
    }

    fn bases(&self, caps: &'static MarketCapabilities) -> Vec<String> {
        match &self.base_override {
            Some(base) => vec![base.clone()],
            None => caps.endpoints().into_iter().map(String::from).collect(),
        }
    }

    /// Fetch one window with retries. A 5xx rotates to the next endpoint on
    /// the following attempt; `RateLimited` aborts immediately and bubbles
    /// up unwrapped.
    async fn window(
        &self,
        bases: &[String],
        path: &str,
        req: &DataRequest,
        retry: &RetryPolicy,
        start_us: i64,
        end_us: i64,
        limit: usize,
    ) -> Result<DataFrame, FcpError> {
        let symbol = canonical_symbol(req.provider, req.market, &req.symbol);
        retry
            .run(
                |attempt| {
                    let base = &bases[attempt as usize % bases.len()];
                    let symbol = symbol.clone();
                    async move {
                        self.request_window(base, path, req, &symbol, start_us, end_us, limit)
                            .await
                    }
                },
                FcpError::is_retryable,
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn request_window(
        &self,
        base: &str,
        path: &str,
        req: &DataRequest,
        symbol: &str,
        start_us: i64,
        end_us: i64,
        limit: usize,
    ) -> Result<DataFrame, FcpError> {
        // The external REST contract is milliseconds.
        let start_ms = start_us / 1_000;
        let end_ms = end_us / 1_000;
        let mut query: Vec<(&str, String)> = vec![
            ("symbol", symbol.to_string()),
            ("startTime", start_ms.to_string()),
            ("endTime", end_ms.to_string()),
            ("limit", limit.to_string()),
        ];
        if req.chart == ChartType::Klines {
            query.push(("interval", req.interval.as_str().to_string()));
        }

        let url = format!("{base}{path}");
        let used = RateLimitTracker::global().record(base, 1);
        debug!(%url, start_ms, end_ms, limit, minute_weight = used, "requesting window");
        let resp = self
            .client
            .get(&url)
            .query(&query)
            .timeout(self.http_timeout)
            .send()
            .await
            .map_err(|e| map_reqwest(&e, self.http_timeout))?;
        if !resp.status().is_success() {
            return Err(status_error(&resp));
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| FcpError::JsonDecode(e.to_string()))?;
        match req.chart {
            ChartType::Klines => parse_kline_rows(&value),
            ChartType::FundingRate => parse_funding_rows(&value),
            _ => Err(FcpError::config(format!(
                "chart type {} has no REST decoder",
                req.chart
            ))),
        }
    }
}

#[async_trait]
impl KlineSource for RestSource {
    fn source(&self) -> DataSource {
        DataSource::Rest
    }

    async fn fetch(
        &self,
        req: &DataRequest,
        missing: &[TimeRange],
    ) -> Result<SourceBatch, FcpError> {
        let caps = capabilities(req.provider, req.market)?;
        let path = match req.chart {
            ChartType::FundingRate => caps.funding_rate_path.ok_or_else(|| {
                FcpError::config(format!("{} settles no funding on {}", req.market, req.provider))
            })?,
            _ => caps.kline_path,
        };
        let bases = self.bases(caps);
        let retry = RetryPolicy::new(&self.retry_cfg).with_attempts(req.retry_count.max(1));

        let step = req.interval.micros();
        let window_span = caps.max_limit as i64 * step;
        let now_us = Utc::now().timestamp_micros();

        let mut acc: Vec<LazyFrame> = Vec::new();
        let mut rate_limited = false;

        'ranges: for range in missing {
            // Floor the start and ceil the end so window edges land on
            // server-side row boundaries.
            let mut cursor = range.start_micros() - range.start_micros().rem_euclid(step);
            let range_end = {
                let end = range.end_micros();
                let rem = end.rem_euclid(step);
                if rem == 0 { end } else { end - rem + step }
            };

            while cursor < range_end && cursor < now_us {
                let window_end = (cursor + window_span).min(range_end);
                match self
                    .window(&bases, path, req, &retry, cursor, window_end, caps.max_limit)
                    .await
                {
                    Ok(df) => {
                        let rows = df.height();
                        if rows == 0 {
                            // Nothing this far: pre-listing or past the
                            // newest complete bar.
                            break;
                        }
                        let times = schema::open_time_micros(&df)?;
                        let Some(last) = times.last().copied() else {
                            break;
                        };
                        acc.push(df.lazy());
                        let next = last + step;
                        if next <= cursor {
                            warn!(cursor, last, "server returned rows behind the cursor");
                            break;
                        }
                        cursor = next;
                        if rows < caps.max_limit && window_end >= range_end {
                            break;
                        }
                    }
                    Err(FcpError::RateLimited { retry_after }) => {
                        warn!(
                            retry_after_secs = retry_after.as_secs(),
                            "rate limited mid-stage, returning partial data"
                        );
                        rate_limited = true;
                        break 'ranges;
                    }
                    Err(err) => {
                        warn!(error = %err, "window failed after retries, leaving it as a residual gap");
                        cursor = window_end;
                    }
                }
            }
        }

        if acc.is_empty() {
            let mut batch = SourceBatch::empty();
            batch.rate_limited = rate_limited;
            return Ok(batch);
        }

        let mut lf = concat(
            acc,
            UnionArgs {
                rechunk: true,
                to_supertypes: true,
                diagonal: true,
                ..Default::default()
            },
        )?
        .sort([OPEN_TIME], SortMultipleOptions::default());

        if req.chart == ChartType::Klines {
            // Never hand an in-progress bar to callers.
            let newest_complete = now_us - step;
            lf = lf.filter(
                col(OPEN_TIME)
                    .cast(DataType::Int64)
                    .lt_eq(lit(newest_complete)),
            );
        }

        let frame = lf.collect()?;
        Ok(SourceBatch {
            frame,
            rate_limited,
        })
    }
}

/// Decode the 12-element kline wire arrays. The trailing `ignore` element is
/// dropped; numeric fields arrive as JSON strings.
fn parse_kline_rows(value: &Value) -> Result<DataFrame, FcpError> {
    let rows = as_rows(value)?;
    let mut columns = KlineColumns::default();
    for row in rows {
        let fields = row
            .as_array()
            .ok_or_else(|| FcpError::JsonDecode("kline row is not an array".into()))?;
        if fields.len() < 11 {
            return Err(FcpError::JsonDecode(format!(
                "kline row has {} elements, expected at least 11",
                fields.len()
            )));
        }
        columns.push(RawKline {
            open_time: json_i64(&fields[0])?,
            open: json_f64(&fields[1])?,
            high: json_f64(&fields[2])?,
            low: json_f64(&fields[3])?,
            close: json_f64(&fields[4])?,
            volume: json_f64(&fields[5])?,
            close_time: json_i64(&fields[6])?,
            quote_asset_volume: json_f64(&fields[7])?,
            count: json_i64(&fields[8])?,
            taker_buy_volume: json_f64(&fields[9])?,
            taker_buy_quote_volume: json_f64(&fields[10])?,
        })?;
    }
    columns.into_frame()
}

/// Decode funding-rate objects into `(open_time, funding_rate)` rows.
fn parse_funding_rows(value: &Value) -> Result<DataFrame, FcpError> {
    let rows = as_rows(value)?;
    let mut times: Vec<i64> = Vec::with_capacity(rows.len());
    let mut rates: Vec<f64> = Vec::with_capacity(rows.len());
    for row in rows {
        let time = row
            .get("fundingTime")
            .ok_or_else(|| FcpError::JsonDecode("funding row lacks fundingTime".into()))?;
        let rate = row
            .get("fundingRate")
            .ok_or_else(|| FcpError::JsonDecode("funding row lacks fundingRate".into()))?;
        let raw = json_i64(time)?;
        let unit = kandle_core::TimestampUnit::detect(raw)?;
        times.push(unit.to_micros(raw));
        rates.push(json_f64(rate)?);
    }
    if times.is_empty() {
        return Ok(schema::empty_frame());
    }
    let df = df!(
        OPEN_TIME => times,
        FUNDING_RATE => rates,
    )?;
    Ok(schema::standardize(df.lazy())?.collect()?)
}

fn as_rows(value: &Value) -> Result<&Vec<Value>, FcpError> {
    if let Some(rows) = value.as_array() {
        return Ok(rows);
    }
    // Error payloads come back as objects: {"code": -1121, "msg": "..."}.
    if let Some(code) = value.get("code").and_then(Value::as_i64) {
        let message = value
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown API error")
            .to_string();
        return Err(FcpError::Api { code, message });
    }
    Err(FcpError::JsonDecode("expected a JSON array of rows".into()))
}

fn json_i64(value: &Value) -> Result<i64, FcpError> {
    if let Some(v) = value.as_i64() {
        return Ok(v);
    }
    value
        .as_str()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| FcpError::JsonDecode(format!("expected integer, got {value}")))
}

fn json_f64(value: &Value) -> Result<f64, FcpError> {
    if let Some(v) = value.as_f64() {
        return Ok(v);
    }
    value
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| FcpError::JsonDecode(format!("expected number, got {value}")))
}
