//! Streaming dataflow engine for network telemetry
//!
//! Packet records flow through chains of push-based operators that tag
//! records with time windows, group and reduce them, suppress duplicates and
//! join the per-window aggregates of parallel chains. The [`detection`] module
//! assembles these operators into intrusion detection queries.

pub mod aggregation;
pub mod config;
pub mod core;
pub mod deduplication;
pub mod detection;
pub mod error;
pub mod join;
pub mod pipeline;
pub mod window;

pub use flowwatch_types::{MacAddr, Tuple, TupleError, Value};

pub use error::{ProcessorError, Result as ProcessorResult};

pub use config::{DetectionConfig, EpochConfig, JoinConfig, ProcessorConfig};

pub use pipeline::{
    BoxedOperator, CollectingSink, DumpSink, ExecutorStats, FeedExecutor, FeedHandle,
    FilterOperator, MapOperator, MeterOperator, Operator, PipelineBuilder, SinkEvent,
    SplitOperator,
};

pub use aggregation::{counter, sum_ints, GroupByOperator};
pub use deduplication::{DistinctOperator, DistinctStats};
pub use join::{JoinInput, JoinOperator, JoinSide, JoinStats};
pub use window::EpochOperator;
