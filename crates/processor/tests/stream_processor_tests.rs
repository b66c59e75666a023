//! End-to-end tests for operator chains
//!
//! Test Coverage:
//! - Epoch tagging and window flushes
//! - Grouped reductions per window
//! - Epoch-synchronized joins
//! - Distinct suppression feeding reductions
//! - Split fan-out and multi-feed execution

use flowwatch_types::net::fields::*;
use flowwatch_types::net::{IPPROTO_TCP, TCP_ACK, TCP_SYN};
use flowwatch_types::Tuple;
use processor::aggregation::{counter, sum_ints};
use processor::config::JoinConfig;
use processor::core::*;
use processor::join::JoinOperator;
use processor::pipeline::*;
use processor::window::EpochOperator;
use std::net::Ipv4Addr;

fn host(n: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, n)
}

fn packet(time: f64, src: u8, dst: u8, flags: i64) -> Tuple {
    Tuple::new()
        .with(TIME, time)
        .with(IPV4_PROTO, IPPROTO_TCP)
        .with(IPV4_SRC, host(src))
        .with(IPV4_DST, host(dst))
        .with(IPV4_LEN, 60i64)
        .with(L4_SPORT, 40000i64)
        .with(L4_DPORT, 80i64)
        .with(L4_FLAGS, flags)
}

// ============================================================================
// EPOCH WINDOWS
// ============================================================================

mod epoch_tests {
    use super::*;

    #[test]
    fn test_one_flush_per_window() {
        let sink = CollectingSink::new("sink");
        let mut epoch = EpochOperator::new("epoch", 1.0, "eid", Box::new(sink.clone())).unwrap();

        for t in 0..5 {
            epoch.accept(Tuple::new().with(TIME, t as f64)).unwrap();
        }
        epoch.flush(Tuple::new()).unwrap();

        let records = sink.records();
        let tags: Vec<i64> = records.iter().map(|r| r.get_int("eid").unwrap()).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4]);

        let flushes: Vec<i64> = sink
            .flushes()
            .iter()
            .map(|f| f.get_int("eid").unwrap())
            .collect();
        assert_eq!(flushes, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_each_flush_precedes_next_window_records() {
        let sink = CollectingSink::new("sink");
        let mut epoch = EpochOperator::new("epoch", 1.0, "eid", Box::new(sink.clone())).unwrap();

        epoch.accept(Tuple::new().with(TIME, 0.0)).unwrap();
        epoch.accept(Tuple::new().with(TIME, 1.5)).unwrap();

        let events = sink.events();
        assert!(matches!(events[0], SinkEvent::Record(_)));
        assert!(matches!(events[1], SinkEvent::Flush(_)));
        assert!(matches!(events[2], SinkEvent::Record(_)));
    }

    #[test]
    fn test_gap_flushes_empty_windows() {
        let sink = CollectingSink::new("sink");
        let mut epoch = EpochOperator::new("epoch", 0.5, "eid", Box::new(sink.clone())).unwrap();

        epoch.accept(Tuple::new().with(TIME, 10.0)).unwrap();
        epoch.accept(Tuple::new().with(TIME, 12.2)).unwrap();

        assert_eq!(sink.flushes().len(), 4);
        assert_eq!(sink.records()[1].get_int("eid").unwrap(), 4);
    }

    #[test]
    fn test_missing_time_is_a_data_error() {
        let sink = CollectingSink::new("sink");
        let mut epoch = EpochOperator::new("epoch", 1.0, "eid", Box::new(sink)).unwrap();

        let err = epoch.accept(Tuple::new().with("other", 1i64)).unwrap_err();
        assert!(err.is_data_error());
    }
}

// ============================================================================
// GROUPED REDUCTIONS
// ============================================================================

mod groupby_tests {
    use super::*;

    #[test]
    fn test_count_all_packets_in_window() {
        let sink = CollectingSink::new("sink");
        let mut head = PipelineBuilder::new("count_pkts")
            .epoch(1.0, "eid")
            .groupby(single_group, counter, "pkts")
            .build(Box::new(sink.clone()))
            .unwrap();

        for i in 0..20 {
            head.accept(packet(i as f64 * 0.01, 1, 2, TCP_SYN)).unwrap();
        }
        head.flush(Tuple::new()).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_int("pkts").unwrap(), 20);
    }

    #[test]
    fn test_bytes_per_destination_across_windows() {
        let sink = CollectingSink::new("sink");
        let mut head = PipelineBuilder::new("bytes")
            .epoch(1.0, "eid")
            .groupby(filter_groups(&[IPV4_DST]), sum_ints(IPV4_LEN), "bytes")
            .build(Box::new(sink.clone()))
            .unwrap();

        head.accept(packet(0.0, 1, 2, TCP_ACK)).unwrap();
        head.accept(packet(0.1, 1, 3, TCP_ACK)).unwrap();
        head.accept(packet(0.2, 1, 2, TCP_ACK)).unwrap();
        head.accept(packet(1.1, 1, 2, TCP_ACK)).unwrap();
        head.flush(Tuple::new()).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get_ipv4(IPV4_DST).unwrap(), host(2));
        assert_eq!(records[0].get_int("bytes").unwrap(), 120);
        assert_eq!(records[1].get_ipv4(IPV4_DST).unwrap(), host(3));
        assert_eq!(records[2].get_int("eid").unwrap(), 1);
        assert_eq!(records[2].get_int("bytes").unwrap(), 60);
    }
}

// ============================================================================
// JOINS
// ============================================================================

mod join_tests {
    use super::*;

    fn syns_minus_acks(sink: &CollectingSink) -> (BoxedOperator, BoxedOperator) {
        let alerts = PipelineBuilder::new("syn_ack")
            .map("diff", |t: Tuple| {
                let diff = t.get_int("syns")? - t.get_int("acks")?;
                Ok(t.with("syns-acks", diff))
            })
            .filter("threshold", key_geq_int("syns-acks", 3))
            .build(Box::new(sink.clone()))
            .unwrap();

        let (left, right) = JoinOperator::new(
            "syn_ack.join",
            &JoinConfig::default(),
            join_fields(rename_filtered_keys(&[(IPV4_DST, "host")]), &["syns"]),
            join_fields(rename_filtered_keys(&[(IPV4_DST, "host")]), &["acks"]),
            alerts,
        )
        .unwrap()
        .into_inputs();

        let syns = PipelineBuilder::new("syns")
            .groupby(filter_groups(&[IPV4_DST]), counter, "syns")
            .build(Box::new(left))
            .unwrap();
        let acks = PipelineBuilder::new("acks")
            .groupby(filter_groups(&[IPV4_DST]), counter, "acks")
            .build(Box::new(right))
            .unwrap();
        (syns, acks)
    }

    #[test]
    fn test_syns_minus_acks_alert() {
        let sink = CollectingSink::new("alerts");
        let (mut syns, mut acks) = syns_minus_acks(&sink);

        for _ in 0..50 {
            syns.accept(packet(0.0, 1, 7, TCP_SYN).with("eid", 0i64)).unwrap();
        }
        for _ in 0..10 {
            acks.accept(packet(0.0, 1, 7, TCP_ACK).with("eid", 0i64)).unwrap();
        }
        syns.flush(Tuple::new().with("eid", 0i64)).unwrap();
        acks.flush(Tuple::new().with("eid", 0i64)).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_ipv4("host").unwrap(), host(7));
        assert_eq!(records[0].get_int("syns-acks").unwrap(), 40);
    }

    #[test]
    fn test_below_threshold_suppressed() {
        let sink = CollectingSink::new("alerts");
        let (mut syns, mut acks) = syns_minus_acks(&sink);

        for _ in 0..3 {
            syns.accept(packet(0.0, 1, 7, TCP_SYN).with("eid", 0i64)).unwrap();
        }
        acks.accept(packet(0.0, 1, 7, TCP_ACK).with("eid", 0i64)).unwrap();
        syns.flush(Tuple::new().with("eid", 0i64)).unwrap();
        acks.flush(Tuple::new().with("eid", 0i64)).unwrap();

        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_epochs_only_match_within_window() {
        let sink = CollectingSink::new("joined");
        let (mut left, mut right) = JoinOperator::new(
            "join",
            &JoinConfig::default(),
            join_fields(filter_groups(&["host"]), &["a"]),
            join_fields(filter_groups(&["host"]), &["b"]),
            Box::new(sink.clone()),
        )
        .unwrap()
        .into_inputs();

        left.accept(Tuple::new().with("host", 1i64).with("eid", 0i64).with("a", 1i64))
            .unwrap();
        right
            .accept(Tuple::new().with("host", 1i64).with("eid", 1i64).with("b", 2i64))
            .unwrap();
        assert!(sink.records().is_empty());

        left.accept(Tuple::new().with("host", 1i64).with("eid", 1i64).with("a", 3i64))
            .unwrap();
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_int("a").unwrap(), 3);
        assert_eq!(records[0].get_int("b").unwrap(), 2);

        // Right moved past epoch 0 before left did.
        let flushed: Vec<i64> = sink
            .flushes()
            .iter()
            .map(|f| f.get_int("eid").unwrap())
            .collect();
        assert_eq!(flushed, vec![0]);
    }
}

// ============================================================================
// DISTINCT
// ============================================================================

mod distinct_tests {
    use super::*;

    #[test]
    fn test_super_spreader_chain() {
        let sink = CollectingSink::new("alerts");
        let mut head = PipelineBuilder::new("super_spreader")
            .epoch(1.0, "eid")
            .distinct(filter_groups(&[IPV4_SRC, IPV4_DST]))
            .groupby(filter_groups(&[IPV4_SRC]), counter, "dsts")
            .filter("threshold", key_geq_int("dsts", 40))
            .build(Box::new(sink.clone()))
            .unwrap();

        for dst in 0..45u8 {
            head.accept(packet(0.1, 9, dst, TCP_SYN)).unwrap();
            head.accept(packet(0.2, 9, dst, TCP_ACK)).unwrap();
        }
        head.flush(Tuple::new()).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_ipv4(IPV4_SRC).unwrap(), host(9));
        assert_eq!(records[0].get_int("dsts").unwrap(), 45);
    }

    #[test]
    fn test_duplicates_allowed_again_in_next_window() {
        let sink = CollectingSink::new("sink");
        let mut head = PipelineBuilder::new("distinct")
            .epoch(1.0, "eid")
            .distinct(filter_groups(&[IPV4_SRC]))
            .build(Box::new(sink.clone()))
            .unwrap();

        head.accept(packet(0.0, 1, 2, TCP_SYN)).unwrap();
        head.accept(packet(0.5, 1, 2, TCP_SYN)).unwrap();
        head.accept(packet(1.0, 1, 2, TCP_SYN)).unwrap();

        assert_eq!(sink.records().len(), 2);
    }
}

// ============================================================================
// FAN-OUT AND EXECUTION
// ============================================================================

mod execution_tests {
    use super::*;

    #[test]
    fn test_split_delivers_to_both_branches_in_order() {
        let first = CollectingSink::new("first");
        let second = CollectingSink::new("second");
        let mut split = SplitOperator::new(
            "split",
            Box::new(first.clone()),
            Box::new(second.clone()),
        );

        split.accept(Tuple::new().with("n", 1i64)).unwrap();
        split.flush(Tuple::new().with("eid", 0i64)).unwrap();

        assert_eq!(first.records().len(), 1);
        assert_eq!(second.records().len(), 1);
        assert_eq!(second.flushes().len(), 1);
    }

    #[test]
    fn test_dump_sink_renders_records() {
        let mut dump = DumpSink::new("dump", Vec::new()).with_flush_markers(true);
        dump.accept(Tuple::new().with("pkts", 3i64)).unwrap();
        dump.flush(Tuple::new()).unwrap();

        let text = String::from_utf8(dump.into_inner()).unwrap();
        assert!(text.contains("\"pkts\" => 3"));
        assert!(text.ends_with("[flush]\n"));
    }

    #[tokio::test]
    async fn test_join_feeds_through_executor() {
        let sink = CollectingSink::new("joined");
        let (left, right) = JoinOperator::new(
            "join",
            &JoinConfig::default(),
            join_fields(filter_groups(&["host"]), &["a"]),
            join_fields(filter_groups(&["host"]), &["b"]),
            Box::new(sink.clone()),
        )
        .unwrap()
        .into_inputs();

        let mut executor = FeedExecutor::new("join", 16).unwrap();
        let left_feed = executor.register(Box::new(left));
        let right_feed = executor.register(Box::new(right));

        let lefts = tokio::spawn(async move {
            for h in 0..10i64 {
                let t = Tuple::new().with("host", h).with("eid", 0i64).with("a", h);
                left_feed.send(t).await.unwrap();
            }
        });
        let rights = tokio::spawn(async move {
            for h in 0..10i64 {
                let t = Tuple::new().with("host", h).with("eid", 0i64).with("b", h * 2);
                right_feed.send(t).await.unwrap();
            }
        });

        let stats = executor.run().await.unwrap();
        lefts.await.unwrap();
        rights.await.unwrap();

        assert_eq!(stats.records_processed, 20);
        let records = sink.records();
        assert_eq!(records.len(), 10);
        for record in records {
            assert_eq!(record.get_int("b").unwrap(), record.get_int("a").unwrap() * 2);
        }
    }
}
