use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use kandle_binance::RestSource;
use kandle_core::{DataRequest, KlineSource, TimeRange};
use kandle_types::{FcpConfig, Interval, MarketType, RetryConfig};

fn fast_config() -> FcpConfig {
    FcpConfig {
        retry: RetryConfig {
            attempts: 2,
            min_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(2),
            jitter: std::time::Duration::ZERO,
        },
        ..FcpConfig::default()
    }
}

fn request(hours: u32) -> DataRequest {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    DataRequest::builder()
        .market(MarketType::Spot)
        .symbol("BTCUSDT")
        .interval(Interval::H1)
        .range(start, start + chrono::Duration::hours(i64::from(hours)))
        .retry_count(2)
        .build()
        .unwrap()
}

fn kline_rows(start_ms: i64, count: usize) -> String {
    let rows: Vec<String> = (0..count)
        .map(|i| {
            let open = start_ms + i as i64 * 3_600_000;
            let close = open + 3_599_999;
            format!(
                "[{open},\"42000.0\",\"42500.0\",\"41900.0\",\"42250.0\",\"13.0\",{close},\"546000.0\",42,\"6.5\",\"273000.0\",\"0\"]"
            )
        })
        .collect();
    format!("[{}]", rows.join(","))
}

const START_MS: i64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z

#[tokio::test]
async fn single_window_returns_complete_bars() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v3/klines");
        then.status(200)
            .header("content-type", "application/json")
            .body(kline_rows(START_MS, 3));
    });

    let source =
        RestSource::new(reqwest::Client::new(), &fast_config()).with_base_url(server.base_url());
    let batch = source.fetch(&request(3), &[request(3).range()]).await.unwrap();

    assert_eq!(batch.frame.height(), 3);
    assert!(!batch.rate_limited);
}

#[tokio::test]
async fn rate_limit_mid_pagination_returns_partial_rows() {
    let server = MockServer::start();
    // First window: a full page of 1000 rows.
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v3/klines")
            .query_param("startTime", START_MS.to_string());
        then.status(200)
            .header("content-type", "application/json")
            .body(kline_rows(START_MS, 1000));
    });
    // Second window: the venue slams the door.
    let second_start = START_MS + 1000 * 3_600_000;
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v3/klines")
            .query_param("startTime", second_start.to_string());
        then.status(429).header("retry-after", "30").body("");
    });

    let req = request(1500);
    let source =
        RestSource::new(reqwest::Client::new(), &fast_config()).with_base_url(server.base_url());
    let batch = source.fetch(&req, &[req.range()]).await.unwrap();

    // Everything fetched before the 429 survives; the flag carries the caveat.
    assert_eq!(batch.frame.height(), 1000);
    assert!(batch.rate_limited);
}

#[tokio::test]
async fn rate_limit_on_first_window_yields_flagged_empty_batch() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v3/klines");
        then.status(429).body("");
    });

    let req = request(3);
    let source =
        RestSource::new(reqwest::Client::new(), &fast_config()).with_base_url(server.base_url());
    let batch = source.fetch(&req, &[req.range()]).await.unwrap();

    assert_eq!(batch.frame.height(), 0);
    assert!(batch.rate_limited);
}

#[tokio::test]
async fn server_errors_are_retried_then_left_as_gaps() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v3/klines");
        then.status(500).body("oops");
    });

    let req = request(3);
    let source =
        RestSource::new(reqwest::Client::new(), &fast_config()).with_base_url(server.base_url());
    let batch = source.fetch(&req, &[req.range()]).await.unwrap();

    // Retried per policy, then the window became a residual gap.
    assert_eq!(batch.frame.height(), 0);
    assert!(!batch.rate_limited);
    mock.assert_hits(2);
}

#[tokio::test]
async fn in_progress_bars_never_reach_the_caller() {
    let step_ms = 3_600_000i64;
    let now_ms = Utc::now().timestamp_millis();
    let current_open = now_ms - now_ms.rem_euclid(step_ms);
    let prev_open = current_open - step_ms;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v3/klines");
        then.status(200)
            .header("content-type", "application/json")
            .body(kline_rows(prev_open, 2)); // closed bar + the live one
    });

    let start = Utc.timestamp_millis_opt(prev_open).unwrap();
    let end = Utc.timestamp_millis_opt(current_open + step_ms).unwrap();
    let req = DataRequest::builder()
        .market(MarketType::Spot)
        .symbol("BTCUSDT")
        .interval(Interval::H1)
        .range(start, end)
        .retry_count(1)
        .build()
        .unwrap();

    let source =
        RestSource::new(reqwest::Client::new(), &fast_config()).with_base_url(server.base_url());
    let batch = source.fetch(&req, &[req.range()]).await.unwrap();

    // Only the closed bar survives the completeness filter.
    assert_eq!(batch.frame.height(), 1);
}

#[tokio::test]
async fn venue_error_payloads_become_api_errors_not_rows() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v3/klines");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"code":-1121,"msg":"Invalid symbol."}"#);
    });

    let req = request(3);
    let source =
        RestSource::new(reqwest::Client::new(), &fast_config()).with_base_url(server.base_url());
    let batch = source.fetch(&req, &[req.range()]).await.unwrap();

    // The API error is confined to the window; nothing pretends to be data.
    assert_eq!(batch.frame.height(), 0);
}
