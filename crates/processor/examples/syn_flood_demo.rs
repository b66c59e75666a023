//! SYN flood detection over a synthetic packet trace
//!
//! This example demonstrates:
//! - Building a multi-chain detection query
//! - Driving it from a producer task through the feed executor
//! - Printing alerts with a dump sink
//!
//! Run with: cargo run --package processor --example syn_flood_demo

use flowwatch_types::net::fields::*;
use flowwatch_types::net::{IPPROTO_TCP, TCP_ACK, TCP_SYN};
use flowwatch_types::Tuple;
use processor::config::{DetectionConfig, ProcessorConfig};
use processor::detection;
use processor::pipeline::{DumpSink, FeedExecutor};
use processor::ProcessorResult;
use std::net::Ipv4Addr;
use tracing::info;

const VICTIM: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 80);

fn packet(time: f64, src: Ipv4Addr, dst: Ipv4Addr, flags: i64) -> Tuple {
    Tuple::new()
        .with(TIME, time)
        .with(IPV4_PROTO, IPPROTO_TCP)
        .with(IPV4_SRC, src)
        .with(IPV4_DST, dst)
        .with(IPV4_LEN, 60i64)
        .with(L4_SPORT, 43000i64)
        .with(L4_DPORT, 80i64)
        .with(L4_FLAGS, flags)
}

/// Three seconds of traffic: normal handshakes, then a burst of unanswered
/// SYNs during the second window.
fn trace() -> Vec<Tuple> {
    let mut packets = Vec::new();
    for second in 0..3u8 {
        let base = second as f64;
        for client in 1..=5u8 {
            let src = Ipv4Addr::new(172, 16, 0, client);
            let t = base + client as f64 * 0.01;
            packets.push(packet(t, src, VICTIM, TCP_SYN));
            packets.push(packet(t + 0.001, VICTIM, src, TCP_SYN | TCP_ACK));
            packets.push(packet(t + 0.002, src, VICTIM, TCP_ACK));
        }
        if second == 1 {
            for spoofed in 0..200u8 {
                let src = Ipv4Addr::new(198, 51, 100, spoofed);
                packets.push(packet(base + 0.5, src, VICTIM, TCP_SYN));
            }
        }
    }
    packets
}

#[tokio::main]
async fn main() -> ProcessorResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    info!("SYN Flood Detection Demo");

    let config = ProcessorConfig::default().with_detection(DetectionConfig {
        syn_flood: 50,
        ..DetectionConfig::default()
    });

    let alerts = DumpSink::new("alerts", std::io::stdout());
    let head = detection::syn_flood(&config, Box::new(alerts))?;

    let mut executor = FeedExecutor::from_config("syn_flood_demo", &config)?;
    let feed = executor.register(head);

    let packets = trace();
    info!(packets = packets.len(), "replaying trace");
    let producer = tokio::spawn(async move {
        feed.send_batch(packets).await?;
        feed.flush(Tuple::new()).await
    });

    let stats = executor.run().await?;
    producer.await.map_err(|e| processor::ProcessorError::Execution {
        source: Box::new(e),
    })??;

    info!(
        records = stats.records_processed,
        flushes = stats.flushes_processed,
        "demo complete"
    );
    Ok(())
}
