//! Grouped aggregation over epochs
//!
//! [`GroupByOperator`] keeps one accumulator per grouping key for the current
//! window. Reductions are plain functions `(accumulator, record) -> Value`:
//!
//! - [`counter`]: number of records in the group
//! - [`sum_ints`]: sum of an integer field across the group
//!
//! Any closure with the same shape can be used as a reduction.

pub mod groupby;
pub mod reduce;

pub use groupby::GroupByOperator;
pub use reduce::{counter, sum_ints};
