//! Stream processing pipeline module
//!
//! This module provides the building blocks for wiring operator chains:
//! - The push-based [`Operator`] contract (`accept` / `flush`)
//! - Stateless operators (map, filter, split) and the per-window meter
//! - Sinks for collecting or printing results
//! - A fluent [`PipelineBuilder`] for linear chains
//! - A [`FeedExecutor`] that drives several feeds from one tokio task
//!
//! # Example
//!
//! ```rust
//! use flowwatch_types::Tuple;
//! use processor::aggregation::counter;
//! use processor::core::single_group;
//! use processor::pipeline::{CollectingSink, Operator, PipelineBuilder};
//!
//! # fn example() -> processor::ProcessorResult<()> {
//! let sink = CollectingSink::new("out");
//! let mut head = PipelineBuilder::new("count_pkts")
//!     .epoch(1.0, "eid")
//!     .groupby(single_group, counter, "pkts")
//!     .build(Box::new(sink.clone()))?;
//!
//! head.accept(Tuple::new().with("time", 0.0))?;
//! head.accept(Tuple::new().with("time", 0.3))?;
//! head.flush(Tuple::new())?;
//!
//! assert_eq!(sink.records()[0].get_int("pkts")?, 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod builder;
pub mod executor;
pub mod operator;
pub mod sink;

pub use builder::PipelineBuilder;
pub use executor::{ExecutorStats, FeedExecutor, FeedHandle};
pub use operator::{
    BoxedOperator, FilterOperator, MapOperator, MeterOperator, Operator, SplitOperator,
};
pub use sink::{CollectingSink, DumpSink, SinkEvent};
