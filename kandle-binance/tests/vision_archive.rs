use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use kandle_binance::VisionSource;
use kandle_core::{DataRequest, KlineSource, TimeRange};
use kandle_types::{FcpConfig, Interval, MarketType, RetryConfig};
use sha2::{Digest, Sha256};
use std::io::Write;

fn fast_config() -> FcpConfig {
    FcpConfig {
        retry: RetryConfig {
            attempts: 1,
            min_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(2),
            jitter: std::time::Duration::ZERO,
        },
        ..FcpConfig::default()
    }
}

fn request() -> DataRequest {
    DataRequest::builder()
        .market(MarketType::FuturesUsdt)
        .symbol("BTCUSDT")
        .interval(Interval::H1)
        .range(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
        .retry_count(1)
        .build()
        .unwrap()
}

fn day_range() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
    )
}

fn hourly_csv(rows: usize) -> String {
    let mut out = String::new();
    for h in 0..rows {
        let open = 1_704_067_200_000u64 + h as u64 * 3_600_000;
        let close = open + 3_599_999;
        out.push_str(&format!(
            "{open},42000.0,42500.0,41900.0,42250.0,13.0,{close},546000.0,42,6.5,273000.0,0\n"
        ));
    }
    out
}

fn zip_with_csv(name: &str, csv: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        writer
            .start_file(name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(csv.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    buf
}

fn hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

const ARCHIVE_PATH: &str = "/data/futures/um/daily/klines/BTCUSDT/1h/BTCUSDT-1h-2024-01-01.zip";

#[tokio::test]
async fn verified_archive_day_decodes_to_a_full_frame() {
    let server = MockServer::start();
    let archive = zip_with_csv("BTCUSDT-1h-2024-01-01.csv", &hourly_csv(24));
    let checksum = format!("{}  BTCUSDT-1h-2024-01-01.zip\n", hex(&archive));

    server.mock(|when, then| {
        when.method(GET).path(ARCHIVE_PATH);
        then.status(200).body(archive.clone());
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("{ARCHIVE_PATH}.CHECKSUM"));
        then.status(200).body(checksum);
    });

    let source =
        VisionSource::new(reqwest::Client::new(), &fast_config()).with_base_url(server.base_url());
    let batch = source.fetch(&request(), &[day_range()]).await.unwrap();

    assert_eq!(batch.frame.height(), 24);
    assert!(!batch.rate_limited);
}

#[tokio::test]
async fn checksum_mismatch_confines_the_day() {
    let server = MockServer::start();
    let archive = zip_with_csv("BTCUSDT-1h-2024-01-01.csv", &hourly_csv(24));
    let bogus = format!("{}  BTCUSDT-1h-2024-01-01.zip\n", "0".repeat(64));

    server.mock(|when, then| {
        when.method(GET).path(ARCHIVE_PATH);
        then.status(200).body(archive.clone());
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("{ARCHIVE_PATH}.CHECKSUM"));
        then.status(200).body(bogus);
    });

    let source =
        VisionSource::new(reqwest::Client::new(), &fast_config()).with_base_url(server.base_url());
    let batch = source.fetch(&request(), &[day_range()]).await.unwrap();

    // The day fails closed: no rows, no error, REST gets its chance.
    assert_eq!(batch.frame.height(), 0);
}

#[tokio::test]
async fn missing_archive_falls_through_quietly() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(404).body("not found");
    });

    let source =
        VisionSource::new(reqwest::Client::new(), &fast_config()).with_base_url(server.base_url());
    let batch = source.fetch(&request(), &[day_range()]).await.unwrap();
    assert_eq!(batch.frame.height(), 0);
}

#[tokio::test]
async fn url_grammar_matches_the_vision_layout() {
    let source = VisionSource::new(reqwest::Client::new(), &fast_config());
    let url = source.archive_url(&request(), "2024-01-01".parse().unwrap());
    assert_eq!(
        url,
        "https://data.binance.vision/data/futures/um/daily/klines/BTCUSDT/1h/BTCUSDT-1h-2024-01-01.zip"
    );
}
