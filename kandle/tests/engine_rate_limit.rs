//! A rate limit mid-REST must never raise away data already fetched; the
//! frame carries the caveat in metadata instead.

mod helpers;

use chrono::{TimeZone, Utc};
use helpers::mock_source::{MockSource, day_of_hours, frame_with};
use kandle::{
    ArrowCache, CacheKey, ChartType, DataProvider, DataRequest, DataSource, Interval, Kandle,
    MarketType,
};
use std::sync::Arc;

#[tokio::test]
async fn partial_rest_rows_survive_a_rate_limit() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ArrowCache::new(dir.path());

    // Day 1 is cached; days 2-7 would need REST.
    let date = "2024-01-01".parse().unwrap();
    let mut cached = frame_with(&day_of_hours(date), 1.0);
    cache
        .write(
            &CacheKey::new(
                DataProvider::Binance,
                MarketType::FuturesUsdt,
                ChartType::Klines,
                "BTCUSDT",
                Interval::H1,
                date,
            ),
            &mut cached,
        )
        .unwrap();

    // REST serves one day's worth and then hits the limit.
    let mut rest_rows = Vec::new();
    for day in ["2024-01-02", "2024-01-03", "2024-01-04"] {
        rest_rows.extend(day_of_hours(day.parse().unwrap()));
    }
    let rest = Arc::new(MockSource::new(DataSource::Rest, rest_rows, 3.0).with_rate_limit_after(24));
    let vision = Arc::new(MockSource::empty(DataSource::Vision));

    let engine = Kandle::builder()
        .with_cache_root(dir.path())
        .with_source(vision)
        .with_source(rest)
        .build()
        .unwrap();

    let req = DataRequest::builder()
        .market(MarketType::FuturesUsdt)
        .symbol("BTCUSDT")
        .interval(Interval::H1)
        .range(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        )
        .build()
        .unwrap();

    let frame = engine.get_data(&req).await.unwrap();

    // 24 cached + 24 REST rows, no exception.
    assert_eq!(frame.records(), 48);
    assert!(frame.rate_limited);
    assert!(frame.fcp_partial);

    let mut distribution = frame.source_distribution().unwrap();
    distribution.sort();
    assert_eq!(
        distribution,
        vec![("CACHE".to_string(), 24), ("REST".to_string(), 24)]
    );
}

#[tokio::test]
async fn rate_limit_with_no_rows_still_returns_flagged_frame() {
    let dir = tempfile::tempdir().unwrap();
    let rest = Arc::new(
        MockSource::new(
            DataSource::Rest,
            day_of_hours("2024-01-01".parse().unwrap()),
            3.0,
        )
        .with_rate_limit_after(0),
    );
    let vision = Arc::new(MockSource::empty(DataSource::Vision));

    let engine = Kandle::builder()
        .with_cache_root(dir.path())
        .with_source(vision)
        .with_source(rest)
        .build()
        .unwrap();

    let req = DataRequest::builder()
        .market(MarketType::FuturesUsdt)
        .symbol("BTCUSDT")
        .interval(Interval::H1)
        .range(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
        .build()
        .unwrap();

    let frame = engine.get_data(&req).await.unwrap();
    assert_eq!(frame.records(), 0);
    assert!(frame.rate_limited);
    assert!(frame.fcp_partial);
}
