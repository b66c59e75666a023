//! Network intrusion detection queries
//!
//! Each query wires the windowing, grouping, distinct and join operators into
//! a pipeline that consumes decoded packet records (see
//! [`flowwatch_types::net::fields`]) and forwards alert records to `next`.
//! Thresholds come from [`DetectionConfig`](crate::config::DetectionConfig).
//!
//! Single-chain queries:
//!
//! ```text
//! tcp_new_cons:   epoch -> filter(SYN) -> groupby(dst, count) -> filter(cons >= t)
//! super_spreader: epoch -> distinct(src, dst) -> groupby(src, count) -> filter(dsts >= t)
//! ```
//!
//! Multi-chain queries fan the packet feed out with [`SplitOperator`] and
//! correlate per-window aggregates with joins:
//!
//! ```text
//!           ┌─ epoch -> SYN    -> groupby(dst) ─┐
//! packets ──┼─ epoch -> SYNACK -> groupby(src) ─┴─ join -> map(+) ─┐
//!           └─ epoch -> ACK    -> groupby(dst) ────────────────────┴─ join -> map(-) -> filter
//! ```

use crate::aggregation::{counter, sum_ints};
use crate::config::ProcessorConfig;
use crate::core::{
    filter_groups, is_tcp, is_tcp_to_port, is_tcp_with_flag_bits, is_tcp_with_flags,
    join_fields, key_geq_int, key_leq_int, rename_filtered_keys, single_group,
};
use crate::error::{ProcessorError, Result};
use crate::join::JoinOperator;
use crate::pipeline::operator::{BoxedOperator, SplitOperator};
use crate::pipeline::PipelineBuilder;
use flowwatch_types::net::fields::{
    ETH_DST, ETH_SRC, IPV4_DST, IPV4_LEN, IPV4_SRC, L4_DPORT, L4_SPORT,
};
use flowwatch_types::net::{TCP_ACK, TCP_FIN, TCP_SYN};
use flowwatch_types::Tuple;

/// Signature shared by every query constructor
pub type QueryBuilder = fn(&ProcessorConfig, BoxedOperator) -> Result<BoxedOperator>;

const HOST: &str = "host";
const SSH_PORT: i64 = 22;

/// All queries, by name
pub const QUERIES: &[(&str, QueryBuilder)] = &[
    ("ident", ident),
    ("count_pkts", count_pkts),
    ("pkts_per_src_dst", pkts_per_src_dst),
    ("distinct_srcs", distinct_srcs),
    ("tcp_new_cons", tcp_new_cons),
    ("ssh_brute_force", ssh_brute_force),
    ("super_spreader", super_spreader),
    ("port_scan", port_scan),
    ("ddos", ddos),
    ("syn_flood", syn_flood),
    ("completed_flows", completed_flows),
    ("slowloris", slowloris),
];

/// Look up a query constructor by name
pub fn query(name: &str) -> Option<QueryBuilder> {
    QUERIES
        .iter()
        .find(|(query_name, _)| *query_name == name)
        .map(|(_, builder)| *builder)
}

/// Validate thresholds and check that joins read the epoch id the epoch
/// stages write.
fn validate(config: &ProcessorConfig) -> Result<()> {
    config.validate()?;
    if config.epoch.key != config.join.epoch_key {
        return Err(ProcessorError::Configuration {
            source: format!(
                "epoch key '{}' does not match join epoch key '{}'",
                config.epoch.key, config.join.epoch_key
            )
            .into(),
        });
    }
    Ok(())
}

/// Map stage writing `op(lhs, rhs)` to `out`
fn derive_int<F>(
    out: &'static str,
    lhs: &'static str,
    rhs: &'static str,
    op: F,
) -> impl Fn(Tuple) -> Result<Tuple> + Send + 'static
where
    F: Fn(i64, i64) -> Result<i64> + Send + 'static,
{
    move |tuple: Tuple| -> Result<Tuple> {
        let value = op(tuple.get_int(lhs)?, tuple.get_int(rhs)?)?;
        Ok(tuple.with(out, value))
    }
}

fn windowed(name: &str, config: &ProcessorConfig) -> PipelineBuilder {
    PipelineBuilder::new(name).epoch_with(config.epoch.clone())
}

/// Strip the Ethernet addresses from every record
pub fn ident(_config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    PipelineBuilder::new("ident")
        .map("strip_eth", |mut tuple: Tuple| {
            tuple.remove(ETH_SRC);
            tuple.remove(ETH_DST);
            Ok(tuple)
        })
        .build(next)
}

/// Packets per window
pub fn count_pkts(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;
    windowed("count_pkts", config)
        .groupby(single_group, counter, "pkts")
        .build(next)
}

/// Packets per (source, destination) per window
pub fn pkts_per_src_dst(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;
    windowed("pkts_per_src_dst", config)
        .groupby(filter_groups(&[IPV4_SRC, IPV4_DST]), counter, "pkts")
        .build(next)
}

/// Distinct sources per window
pub fn distinct_srcs(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;
    windowed("distinct_srcs", config)
        .distinct(filter_groups(&[IPV4_SRC]))
        .groupby(single_group, counter, "srcs")
        .build(next)
}

/// Destinations receiving many new TCP connections
pub fn tcp_new_cons(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;
    windowed("tcp_new_cons", config)
        .filter("syn", is_tcp_with_flags(TCP_SYN))
        .groupby(filter_groups(&[IPV4_DST]), counter, "cons")
        .filter("threshold", key_geq_int("cons", config.detection.new_connections))
        .build(next)
}

/// Destinations receiving equal-length SSH packets from many sources
pub fn ssh_brute_force(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;
    windowed("ssh_brute_force", config)
        .filter("ssh", is_tcp_to_port(SSH_PORT))
        .distinct(filter_groups(&[IPV4_SRC, IPV4_DST, IPV4_LEN]))
        .groupby(filter_groups(&[IPV4_DST, IPV4_LEN]), counter, "srcs")
        .filter("threshold", key_geq_int("srcs", config.detection.ssh_brute_force))
        .build(next)
}

/// Sources contacting many distinct destinations
pub fn super_spreader(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;
    windowed("super_spreader", config)
        .distinct(filter_groups(&[IPV4_SRC, IPV4_DST]))
        .groupby(filter_groups(&[IPV4_SRC]), counter, "dsts")
        .filter("threshold", key_geq_int("dsts", config.detection.super_spreader))
        .build(next)
}

/// Sources probing many distinct destination ports
pub fn port_scan(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;
    windowed("port_scan", config)
        .distinct(filter_groups(&[IPV4_SRC, L4_DPORT]))
        .groupby(filter_groups(&[IPV4_SRC]), counter, "ports")
        .filter("threshold", key_geq_int("ports", config.detection.port_scan))
        .build(next)
}

/// Destinations contacted by many distinct sources
pub fn ddos(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;
    windowed("ddos", config)
        .distinct(filter_groups(&[IPV4_SRC, IPV4_DST]))
        .groupby(filter_groups(&[IPV4_DST]), counter, "srcs")
        .filter("threshold", key_geq_int("srcs", config.detection.ddos))
        .build(next)
}

/// Hosts with many half-open handshakes: `syns + synacks - acks >= t`
pub fn syn_flood(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;

    let alerts = PipelineBuilder::new("syn_flood")
        .map(
            "diff",
            derive_int("syns+synacks-acks", "syns+synacks", "acks", |a, b| Ok(a - b)),
        )
        .filter(
            "threshold",
            key_geq_int("syns+synacks-acks", config.detection.syn_flood),
        )
        .build(next)?;

    let (handshakes, acks_in) = JoinOperator::new(
        "syn_flood.join_acks",
        &config.join,
        join_fields(filter_groups(&[HOST]), &["syns+synacks"]),
        join_fields(rename_filtered_keys(&[(IPV4_DST, HOST)]), &["acks"]),
        alerts,
    )?
    .into_inputs();

    let sum = PipelineBuilder::new("syn_flood")
        .map("sum", derive_int("syns+synacks", "syns", "synacks", |a, b| Ok(a + b)))
        .build(Box::new(handshakes))?;

    let (syns_in, synacks_in) = JoinOperator::new(
        "syn_flood.join_synacks",
        &config.join,
        join_fields(rename_filtered_keys(&[(IPV4_DST, HOST)]), &["syns"]),
        join_fields(rename_filtered_keys(&[(IPV4_SRC, HOST)]), &["synacks"]),
        sum,
    )?
    .into_inputs();

    let syns = windowed("syn_flood.syns", config)
        .filter("syn", is_tcp_with_flags(TCP_SYN))
        .groupby(filter_groups(&[IPV4_DST]), counter, "syns")
        .build(Box::new(syns_in))?;
    let synacks = windowed("syn_flood.synacks", config)
        .filter("synack", is_tcp_with_flags(TCP_SYN | TCP_ACK))
        .groupby(filter_groups(&[IPV4_SRC]), counter, "synacks")
        .build(Box::new(synacks_in))?;
    let acks = windowed("syn_flood.acks", config)
        .filter("ack", is_tcp_with_flags(TCP_ACK))
        .groupby(filter_groups(&[IPV4_DST]), counter, "acks")
        .build(Box::new(acks_in))?;

    Ok(Box::new(SplitOperator::new(
        "syn_flood.split",
        syns,
        Box::new(SplitOperator::new("syn_flood.split_acks", synacks, acks)),
    )))
}

/// Hosts opening more connections than they close: `syns - fins >= t`
pub fn completed_flows(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;

    let alerts = PipelineBuilder::new("completed_flows")
        .map("diff", derive_int("diff", "syns", "fins", |a, b| Ok(a - b)))
        .filter("threshold", key_geq_int("diff", config.detection.completed_flows))
        .build(next)?;

    let (syns_in, fins_in) = JoinOperator::new(
        "completed_flows.join",
        &config.join,
        join_fields(rename_filtered_keys(&[(IPV4_DST, HOST)]), &["syns"]),
        join_fields(rename_filtered_keys(&[(IPV4_SRC, HOST)]), &["fins"]),
        alerts,
    )?
    .into_inputs();

    let syns = windowed("completed_flows.syns", config)
        .filter("syn", is_tcp_with_flags(TCP_SYN))
        .groupby(filter_groups(&[IPV4_DST]), counter, "syns")
        .build(Box::new(syns_in))?;
    let fins = windowed("completed_flows.fins", config)
        .filter("fin", is_tcp_with_flag_bits(TCP_FIN))
        .groupby(filter_groups(&[IPV4_SRC]), counter, "fins")
        .build(Box::new(fins_in))?;

    Ok(Box::new(SplitOperator::new("completed_flows.split", syns, fins)))
}

/// Hosts holding many connections open with very little traffic each
pub fn slowloris(config: &ProcessorConfig, next: BoxedOperator) -> Result<BoxedOperator> {
    validate(config)?;
    let thresholds = &config.detection;

    let alerts = PipelineBuilder::new("slowloris")
        .map(
            "bytes_per_conn",
            derive_int("bytes_per_conn", "n_bytes", "n_conns", |bytes, conns| {
                bytes
                    .checked_div(conns)
                    .ok_or_else(|| ProcessorError::Execution {
                        source: "connection count is zero".into(),
                    })
            }),
        )
        .filter(
            "threshold",
            key_leq_int("bytes_per_conn", thresholds.slowloris_max_bytes_per_connection),
        )
        .build(next)?;

    let (conns_in, bytes_in) = JoinOperator::new(
        "slowloris.join",
        &config.join,
        join_fields(filter_groups(&[IPV4_DST]), &["n_conns"]),
        join_fields(filter_groups(&[IPV4_DST]), &["n_bytes"]),
        alerts,
    )?
    .into_inputs();

    let n_conns = windowed("slowloris.conns", config)
        .filter("tcp", is_tcp)
        .distinct(filter_groups(&[IPV4_SRC, IPV4_DST, L4_SPORT]))
        .groupby(filter_groups(&[IPV4_DST]), counter, "n_conns")
        .filter(
            "threshold",
            key_geq_int("n_conns", thresholds.slowloris_min_connections),
        )
        .build(Box::new(conns_in))?;
    let n_bytes = windowed("slowloris.bytes", config)
        .filter("tcp", is_tcp)
        .groupby(filter_groups(&[IPV4_DST]), sum_ints(IPV4_LEN), "n_bytes")
        .filter("threshold", key_geq_int("n_bytes", thresholds.slowloris_min_bytes))
        .build(Box::new(bytes_in))?;

    Ok(Box::new(SplitOperator::new("slowloris.split", n_conns, n_bytes)))
}
