use kandle_core::merge::MergePipeline;
use kandle_core::schema::{DATA_SOURCE, OPEN_TIME};
use kandle_types::DataSource;
use polars::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn arb_source() -> impl Strategy<Value = DataSource> {
    prop_oneof![
        Just(DataSource::Unknown),
        Just(DataSource::Vision),
        Just(DataSource::Cache),
        Just(DataSource::Rest),
    ]
}

/// Timestamps drawn from a small grid so collisions across frames are common.
fn arb_times() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::btree_set(0i64..200, 0..40)
        .prop_map(|set| set.into_iter().map(|t| t * 60_000_000).collect())
}

fn close_for(source: DataSource, ts: i64) -> f64 {
    f64::from(source.priority()) * 1_000.0 + (ts % 997) as f64
}

fn frame_for(source: DataSource, times: &[i64]) -> DataFrame {
    let closes: Vec<f64> = times.iter().map(|t| close_for(source, *t)).collect();
    df!(
        OPEN_TIME => times.to_vec(),
        "open" => closes.clone(),
        "high" => closes.clone(),
        "low" => closes.clone(),
        "close" => closes,
    )
    .unwrap()
}

proptest! {
    #[test]
    fn merged_output_is_sorted_deduped_and_priority_resolved(
        inputs in proptest::collection::vec((arb_source(), arb_times()), 0..6)
    ) {
        // Expected winner per timestamp: the highest-priority contributing source.
        let mut winner: BTreeMap<i64, DataSource> = BTreeMap::new();
        for (source, times) in &inputs {
            for t in times {
                winner
                    .entry(*t)
                    .and_modify(|w| {
                        if source.priority() > w.priority() {
                            *w = *source;
                        }
                    })
                    .or_insert(*source);
            }
        }

        let mut pipeline = MergePipeline::new();
        for (source, times) in &inputs {
            pipeline.add_source(frame_for(*source, times), *source);
        }
        let out = pipeline.collect().unwrap();

        prop_assert_eq!(out.height(), winner.len());
        if out.height() == 0 {
            return Ok(());
        }

        let ts = out
            .column(OPEN_TIME)
            .unwrap()
            .cast(&DataType::Int64)
            .unwrap();
        let ts = ts.i64().unwrap();
        let close = out.column("close").unwrap().f64().unwrap();
        let tags = out.column(DATA_SOURCE).unwrap();
        let tags = tags.str().unwrap();

        let mut prev: Option<i64> = None;
        for idx in 0..out.height() {
            let t = ts.get(idx).unwrap();
            // Strictly increasing implies no duplicates.
            if let Some(p) = prev {
                prop_assert!(p < t);
            }
            prev = Some(t);

            let expected = winner.get(&t).copied().unwrap();
            prop_assert_eq!(tags.get(idx).unwrap(), expected.as_str());
            prop_assert_eq!(close.get(idx).unwrap(), close_for(expected, t));
        }
    }

    #[test]
    fn merge_is_insensitive_to_source_registration_order(
        times_a in arb_times(),
        times_b in arb_times(),
    ) {
        let mut forward = MergePipeline::new();
        forward.add_source(frame_for(DataSource::Cache, &times_a), DataSource::Cache);
        forward.add_source(frame_for(DataSource::Rest, &times_b), DataSource::Rest);

        let mut reverse = MergePipeline::new();
        reverse.add_source(frame_for(DataSource::Rest, &times_b), DataSource::Rest);
        reverse.add_source(frame_for(DataSource::Cache, &times_a), DataSource::Cache);

        let f = forward.collect().unwrap();
        let r = reverse.collect().unwrap();
        prop_assert_eq!(f.height(), r.height());
        if f.height() > 0 {
            prop_assert!(f.equals(&r));
        }
    }
}
