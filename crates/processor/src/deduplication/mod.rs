//! Duplicate suppression within epochs
//!
//! [`DistinctOperator`] remembers the projected key of every record forwarded
//! in the current window and drops later records with the same key. Keys are
//! compared through [`Tuple::key_string`](flowwatch_types::Tuple::key_string),
//! so field order never matters.

pub mod distinct;

pub use distinct::{DistinctOperator, DistinctStats};
