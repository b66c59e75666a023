//! Property-based tests for windowing, grouping, distinct and join operators

use flowwatch_types::Tuple;
use processor::aggregation::counter;
use processor::config::JoinConfig;
use processor::core::{filter_groups, join_fields};
use processor::join::{JoinOperator, JoinSide};
use processor::pipeline::{CollectingSink, Operator, PipelineBuilder};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// Non-decreasing timestamps on a quarter-second grid, so window boundaries
/// are exact in floating point.
fn timestamps_strategy() -> impl Strategy<Value = Vec<f64>> {
    (0u32..40, prop::collection::vec(0u32..8, 1..60)).prop_map(|(start, gaps)| {
        let mut ticks = start;
        gaps.into_iter()
            .map(|gap| {
                ticks += gap;
                ticks as f64 * 0.25
            })
            .collect()
    })
}

/// Per-window arrival orders: every key arrives once on each side, with the
/// two sides interleaved arbitrarily.
fn windows_strategy() -> impl Strategy<Value = Vec<Vec<(JoinSide, i64)>>> {
    prop::collection::vec(prop::collection::btree_set(0i64..10, 0..6), 1..6).prop_flat_map(
        |windows| {
            windows
                .into_iter()
                .map(|keys| {
                    let arrivals: Vec<(JoinSide, i64)> = keys
                        .iter()
                        .flat_map(|&k| [(JoinSide::Left, k), (JoinSide::Right, k)])
                        .collect();
                    Just(arrivals).prop_shuffle()
                })
                .collect::<Vec<_>>()
        },
    )
}

fn keys_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..10, 0..100)
}

proptest! {
    /// Every record lands in window `floor((t - t0) / width)` and exactly one
    /// flush is emitted per window through the last one.
    #[test]
    fn epoch_ids_follow_record_time(times in timestamps_strategy()) {
        let sink = CollectingSink::new("sink");
        let mut head = PipelineBuilder::new("epoch")
            .epoch(1.0, "eid")
            .build(Box::new(sink.clone()))
            .unwrap();

        for &t in &times {
            head.accept(Tuple::new().with("time", t)).unwrap();
        }
        head.flush(Tuple::new()).unwrap();

        let t0 = times[0];
        let records = sink.records();
        prop_assert_eq!(records.len(), times.len());
        for (record, &t) in records.iter().zip(&times) {
            prop_assert_eq!(record.get_int("eid").unwrap(), (t - t0).floor() as i64);
        }

        let last = (times[times.len() - 1] - t0).floor() as i64;
        let flushed: Vec<i64> = sink.flushes().iter().map(|f| f.get_int("eid").unwrap()).collect();
        prop_assert_eq!(flushed, (0..=last).collect::<Vec<_>>());
    }

    /// Per-key counts sum to the number of records and match a direct tally.
    #[test]
    fn groupby_counts_match_tally(keys in keys_strategy()) {
        let sink = CollectingSink::new("sink");
        let mut head = PipelineBuilder::new("count")
            .groupby(filter_groups(&["k"]), counter, "n")
            .build(Box::new(sink.clone()))
            .unwrap();

        let mut tally: HashMap<i64, i64> = HashMap::new();
        for &k in &keys {
            head.accept(Tuple::new().with("k", k)).unwrap();
            *tally.entry(k).or_default() += 1;
        }
        head.flush(Tuple::new()).unwrap();

        let records = sink.records();
        prop_assert_eq!(records.len(), tally.len());
        for record in &records {
            let k = record.get_int("k").unwrap();
            prop_assert_eq!(record.get_int("n").unwrap(), tally[&k]);
        }
        let total: i64 = records.iter().map(|r| r.get_int("n").unwrap()).sum();
        prop_assert_eq!(total, keys.len() as i64);
    }

    /// Distinct forwards exactly one record per key, in first-seen order.
    #[test]
    fn distinct_forwards_each_key_once(keys in keys_strategy()) {
        let sink = CollectingSink::new("sink");
        let mut head = PipelineBuilder::new("distinct")
            .distinct(filter_groups(&["k"]))
            .build(Box::new(sink.clone()))
            .unwrap();

        for &k in &keys {
            head.accept(Tuple::new().with("k", k)).unwrap();
        }

        let mut seen = BTreeSet::new();
        let expected: Vec<i64> = keys.iter().copied().filter(|k| seen.insert(*k)).collect();
        let forwarded: Vec<i64> = sink.records().iter().map(|r| r.get_int("k").unwrap()).collect();
        prop_assert_eq!(forwarded, expected);
    }

    /// Within one epoch, a join emits one record per key present on both sides.
    #[test]
    fn join_matches_key_intersection(
        left_keys in prop::collection::btree_set(0i64..30, 0..20),
        right_keys in prop::collection::btree_set(0i64..30, 0..20),
    ) {
        let sink = CollectingSink::new("sink");
        let (mut left, mut right) = JoinOperator::new(
            "join",
            &JoinConfig::default(),
            join_fields(filter_groups(&["k"]), &["l"]),
            join_fields(filter_groups(&["k"]), &["r"]),
            Box::new(sink.clone()),
        )
        .unwrap()
        .into_inputs();

        for &k in &left_keys {
            left.accept(Tuple::new().with("k", k).with("eid", 0i64).with("l", k)).unwrap();
        }
        for &k in &right_keys {
            right.accept(Tuple::new().with("k", k).with("eid", 0i64).with("r", -k)).unwrap();
        }

        let matched: BTreeSet<i64> = sink.records().iter().map(|r| r.get_int("k").unwrap()).collect();
        let expected: BTreeSet<i64> = left_keys.intersection(&right_keys).copied().collect();
        prop_assert_eq!(&matched, &expected);
        prop_assert_eq!(sink.records().len(), expected.len());

        let stats = left.stats();
        prop_assert_eq!(stats.left_pending, left_keys.len() - expected.len());
        prop_assert_eq!(stats.right_pending, right_keys.len() - expected.len());
    }

    /// Across consecutive windows with per-side flushes, every pair yields
    /// exactly one merged record in its own window, nothing stays pending once
    /// a window's pairs have arrived, and every window but the last is flushed.
    #[test]
    fn join_drains_each_window(windows in windows_strategy()) {
        let sink = CollectingSink::new("sink");
        let (mut left, mut right) = JoinOperator::new(
            "join",
            &JoinConfig::default(),
            join_fields(filter_groups(&["k"]), &["l"]),
            join_fields(filter_groups(&["k"]), &["r"]),
            Box::new(sink.clone()),
        )
        .unwrap()
        .into_inputs();

        for (eid, arrivals) in windows.iter().enumerate() {
            let eid = eid as i64;
            let before = sink.records().len();

            for &(side, k) in arrivals {
                let record = Tuple::new().with("k", k).with("eid", eid);
                match side {
                    JoinSide::Left => left.accept(record.with("l", k)).unwrap(),
                    JoinSide::Right => right.accept(record.with("r", k + 100)).unwrap(),
                }
            }
            left.flush(Tuple::new().with("eid", eid)).unwrap();
            right.flush(Tuple::new().with("eid", eid)).unwrap();

            let stats = left.stats();
            prop_assert_eq!(stats.left_pending, 0);
            prop_assert_eq!(stats.right_pending, 0);

            let merged = sink.records()[before..].to_vec();
            prop_assert_eq!(merged.len(), arrivals.len() / 2);
            for record in &merged {
                let k = record.get_int("k").unwrap();
                prop_assert_eq!(record.get_int("eid").unwrap(), eid);
                prop_assert_eq!(record.get_int("l").unwrap(), k);
                prop_assert_eq!(record.get_int("r").unwrap(), k + 100);
            }
        }

        let flushed: Vec<i64> = sink.flushes().iter().map(|f| f.get_int("eid").unwrap()).collect();
        prop_assert_eq!(flushed, (0..windows.len() as i64 - 1).collect::<Vec<_>>());
    }
}
