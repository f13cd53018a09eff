//! The Vision bulk-archive source: one zipped daily CSV per fetch, with a
//! SHA-256 `.CHECKSUM` sibling.
//!
//! Failures are confined to their day: a bad download, checksum mismatch, or
//! undecodable CSV leaves that day in the missing set for the REST stage.
//! Days inside the publication-lag window are skipped outright, since the
//! archive publisher runs roughly a day behind.

use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use futures::StreamExt;
use kandle_core::schema::OPEN_TIME;
use kandle_core::{
    DataRequest, DataSource, FcpError, KlineSource, RetryPolicy, SourceBatch, TimeRange,
};
use kandle_types::{ChartType, FcpConfig};
use polars::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::http::{map_reqwest, status_error};
use crate::klines::{KlineColumns, RawKline};
use crate::symbols::canonical_symbol;

const DEFAULT_BASE: &str = "https://data.binance.vision";

/// Bulk-archive source for daily zipped CSVs.
pub struct VisionSource {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    fanout: usize,
    http_timeout: Duration,
    publication_lag: ChronoDuration,
}

impl VisionSource {
    /// Build the source over a shared HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client, cfg: &FcpConfig) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE.to_string(),
            retry: RetryPolicy::new(&cfg.retry),
            fanout: cfg.fanout.max(1),
            http_timeout: cfg.http_timeout,
            publication_lag: ChronoDuration::hours(24),
        }
    }

    /// Point the source at a different archive host (tests).
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    /// Archive URL for one day. A pure function of the request key.
    #[must_use]
    pub fn archive_url(&self, req: &DataRequest, date: NaiveDate) -> String {
        let symbol = canonical_symbol(req.provider, req.market, &req.symbol);
        let interval = req.interval.as_str();
        format!(
            "{base}/data/{market}/daily/{chart}/{symbol}/{interval}/{symbol}-{interval}-{date}.zip",
            base = self.base_url,
            market = req.market.vision_path(),
            chart = req.chart.vision_path(),
        )
    }

    /// Download one file with retries. 4xx is terminal (the archive either
    /// has the file or it does not); 5xx and transport errors retry.
    async fn download(&self, url: &str, attempts: u32) -> Result<Vec<u8>, FcpError> {
        let retry = self.retry.clone().with_attempts(attempts.max(1));
        retry
            .run(
                |_| async move {
                    let resp = self
                        .client
                        .get(url)
                        .timeout(self.http_timeout)
                        .send()
                        .await
                        .map_err(|e| map_reqwest(&e, self.http_timeout))?;
                    if !resp.status().is_success() {
                        return Err(status_error(&resp));
                    }
                    let bytes = resp
                        .bytes()
                        .await
                        .map_err(|e| map_reqwest(&e, self.http_timeout))?;
                    Ok(bytes.to_vec())
                },
                |err| match err {
                    FcpError::Http { status } => *status >= 500,
                    FcpError::Network(_) | FcpError::Timeout(_) => true,
                    _ => false,
                },
            )
            .await
    }

    /// Fetch, verify, and decode one archived day.
    async fn fetch_day(&self, req: &DataRequest, date: NaiveDate) -> Result<DataFrame, FcpError> {
        let url = self.archive_url(req, date);
        let checksum_url = format!("{url}.CHECKSUM");

        let archive = self.download(&url, req.retry_count).await?;
        let checksum = self.download(&checksum_url, req.retry_count).await?;

        let expected = parse_checksum(&checksum).ok_or_else(|| FcpError::DownloadFailed {
            url: checksum_url,
            reason: "checksum file carries no hex digest".into(),
        })?;
        let actual = hex_digest(&archive);
        if !actual.eq_ignore_ascii_case(&expected) {
            return Err(FcpError::ChecksumMismatch {
                url,
                expected,
                actual,
            });
        }

        let csv_bytes = extract_single_csv(&archive, &url)?;
        decode_kline_csv(&csv_bytes)
    }
}

#[async_trait]
impl KlineSource for VisionSource {
    fn source(&self) -> DataSource {
        DataSource::Vision
    }

    async fn fetch(
        &self,
        req: &DataRequest,
        missing: &[TimeRange],
    ) -> Result<SourceBatch, FcpError> {
        if req.chart == ChartType::FundingRate {
            debug!("funding-rate series are not archived daily; deferring to REST");
            return Ok(SourceBatch::empty());
        }
        if !req.provider.has_bulk_archive() {
            debug!(provider = %req.provider, "provider has no bulk archive");
            return Ok(SourceBatch::empty());
        }

        let horizon = (Utc::now() - self.publication_lag).date_naive();
        let mut days: BTreeSet<NaiveDate> = BTreeSet::new();
        for range in missing {
            days.extend(range.days());
        }
        let eligible: Vec<NaiveDate> = days
            .into_iter()
            .filter(|day| {
                if *day >= horizon {
                    debug!(%day, "inside publication lag, deferring to REST");
                    false
                } else {
                    true
                }
            })
            .collect();
        if eligible.is_empty() {
            return Ok(SourceBatch::empty());
        }

        let results: Vec<(NaiveDate, Result<DataFrame, FcpError>)> =
            futures::stream::iter(eligible.into_iter().map(|day| async move {
                (day, self.fetch_day(req, day).await)
            }))
            .buffered(self.fanout)
            .collect()
            .await;

        let mut frames: Vec<LazyFrame> = Vec::new();
        for (day, result) in results {
            match result {
                Ok(df) if df.height() > 0 => frames.push(df.lazy()),
                Ok(_) => debug!(%day, "archived day decoded empty"),
                Err(err) => {
                    warn!(%day, error = %err, "archive day failed, leaving it for the next source");
                }
            }
        }
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

/// First whitespace-separated token of the CHECKSUM file, when it looks like
/// a hex digest.
fn parse_checksum(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let token = text.split_whitespace().next()?;
    if token.len() == 64 && token.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(token.to_lowercase())
    } else {
        None
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// The archive must contain exactly one CSV.
fn extract_single_csv(bytes: &[u8], url: &str) -> Result<Vec<u8>, FcpError> {
    let failed = |reason: String| FcpError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| failed(format!("invalid zip: {e}")))?;
    if archive.len() != 1 {
        return Err(failed(format!(
            "expected exactly one file in archive, found {}",
            archive.len()
        )));
    }
    let mut file = archive
        .by_index(0)
        .map_err(|e| failed(format!("unreadable zip entry: {e}")))?;
    let mut out = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
    file.read_to_end(&mut out)
        .map_err(|e| failed(format!("zip entry read failed: {e}")))?;
    Ok(out)
}

/// Decode the kline CSV. 2025+ archives carry a header row and 16-digit
/// timestamps; older ones have neither. Both decode to the same frame.
fn decode_kline_csv(bytes: &[u8]) -> Result<DataFrame, FcpError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut columns = KlineColumns::default();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| FcpError::data(format!("bad CSV record: {e}")))?;
        let first_is_numeric = record
            .get(0)
            .is_some_and(|f| f.trim().parse::<i64>().is_ok());
        if idx == 0 && !first_is_numeric {
            continue; // header row
        }
        if record.len() < 11 {
            return Err(FcpError::data(format!(
                "kline CSV row has {} fields, expected at least 11",
                record.len()
            )));
        }
        columns.push(RawKline {
            open_time: csv_i64(&record, 0)?,
            open: csv_f64(&record, 1)?,
            high: csv_f64(&record, 2)?,
            low: csv_f64(&record, 3)?,
            close: csv_f64(&record, 4)?,
            volume: csv_f64(&record, 5)?,
            close_time: csv_i64(&record, 6)?,
            quote_asset_volume: csv_f64(&record, 7)?,
            count: csv_i64(&record, 8)?,
            taker_buy_volume: csv_f64(&record, 9)?,
            taker_buy_quote_volume: csv_f64(&record, 10)?,
            // field 11 ("ignore") is dropped by contract
        })?;
    }
    debug!(rows = columns.len(), "decoded archive CSV");
    columns.into_frame()
}

fn csv_i64(record: &csv::StringRecord, idx: usize) -> Result<i64, FcpError> {
    let raw = record
        .get(idx)
        .ok_or_else(|| FcpError::data(format!("CSV field {idx} missing")))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| FcpError::data(format!("CSV field {idx} is not an integer: {raw:?}")))
}

fn csv_f64(record: &csv::StringRecord, idx: usize) -> Result<f64, FcpError> {
    let raw = record
        .get(idx)
        .ok_or_else(|| FcpError::data(format!("CSV field {idx} missing")))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| FcpError::data(format!("CSV field {idx} is not a number: {raw:?}")))
}
