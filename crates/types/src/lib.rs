//! Core value and record types for flowwatch
//!
//! This crate provides the data model shared by every flowwatch operator:
//! typed [`Value`]s, the named-field [`Tuple`] record, and the errors raised
//! when a field is missing or holds an unexpected variant.

pub mod errors;
pub mod net;
pub mod tuple;
pub mod value;

pub use errors::{Result, TupleError};
pub use tuple::Tuple;
pub use value::{MacAddr, Value};
