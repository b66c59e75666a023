//! The push-based operator contract and the stateless transforms
//!
//! Every stage of a pipeline implements [`Operator`]:
//! - `accept`: process one record, forwarding zero or more records downstream
//! - `flush`: close the current window, forwarding a matching flush downstream
//!
//! Operators own their successor, so a pipeline is built back to front and
//! driven by calling `accept`/`flush` on its head. Each call runs the whole
//! downstream chain to completion before returning.
//!
//! This module provides:
//! - Map: Transform records one-to-one
//! - Filter: Select records based on predicates
//! - Split: Fan one input out to two successors
//! - Meter: Count records per window and log the total

use crate::error::Result;
use flowwatch_types::Tuple;
use std::fmt::Debug;
use tracing::{info, trace};

/// Trait implemented by every pipeline stage
pub trait Operator: Send + Debug {
    /// Process a single data record
    fn accept(&mut self, tuple: Tuple) -> Result<()>;

    /// Signal the end of the current window.
    ///
    /// `context` carries window-identifying fields only. Implementations must
    /// emit everything buffered for the window before forwarding the flush.
    fn flush(&mut self, context: Tuple) -> Result<()>;

    /// Get the operator name
    fn name(&self) -> &str;
}

/// Owned handle to the next stage of a pipeline
pub type BoxedOperator = Box<dyn Operator>;

/// Map operator - transforms records one-to-one
///
/// # Example
///
/// ```rust
/// use flowwatch_types::Tuple;
/// use processor::pipeline::{CollectingSink, MapOperator};
///
/// let sink = CollectingSink::new("out");
/// let _op = MapOperator::new(
///     "drop-eth",
///     |mut t: Tuple| {
///         t.remove("eth.src");
///         Ok(t)
///     },
///     Box::new(sink.clone()),
/// );
/// ```
pub struct MapOperator<F>
where
    F: Fn(Tuple) -> Result<Tuple> + Send,
{
    name: String,
    func: F,
    next: BoxedOperator,
}

impl<F> MapOperator<F>
where
    F: Fn(Tuple) -> Result<Tuple> + Send,
{
    /// Create a new map operator
    pub fn new<S: Into<String>>(name: S, func: F, next: BoxedOperator) -> Self {
        Self {
            name: name.into(),
            func,
            next,
        }
    }
}

impl<F> Debug for MapOperator<F>
where
    F: Fn(Tuple) -> Result<Tuple> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapOperator")
            .field("name", &self.name)
            .field("next", &self.next.name())
            .finish()
    }
}

impl<F> Operator for MapOperator<F>
where
    F: Fn(Tuple) -> Result<Tuple> + Send,
{
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        let mapped = (self.func)(tuple)?;
        self.next.accept(mapped)
    }

    fn flush(&mut self, context: Tuple) -> Result<()> {
        self.next.flush(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Filter operator - forwards records matching a predicate
///
/// Flushes are always forwarded.
pub struct FilterOperator<F>
where
    F: Fn(&Tuple) -> Result<bool> + Send,
{
    name: String,
    predicate: F,
    next: BoxedOperator,
}

impl<F> FilterOperator<F>
where
    F: Fn(&Tuple) -> Result<bool> + Send,
{
    /// Create a new filter operator
    pub fn new<S: Into<String>>(name: S, predicate: F, next: BoxedOperator) -> Self {
        Self {
            name: name.into(),
            predicate,
            next,
        }
    }
}

impl<F> Debug for FilterOperator<F>
where
    F: Fn(&Tuple) -> Result<bool> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterOperator")
            .field("name", &self.name)
            .field("next", &self.next.name())
            .finish()
    }
}

impl<F> Operator for FilterOperator<F>
where
    F: Fn(&Tuple) -> Result<bool> + Send,
{
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        if (self.predicate)(&tuple)? {
            self.next.accept(tuple)
        } else {
            trace!(operator = %self.name, "record filtered out");
            Ok(())
        }
    }

    fn flush(&mut self, context: Tuple) -> Result<()> {
        self.next.flush(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Split operator - forwards everything to `first`, then to `second`
#[derive(Debug)]
pub struct SplitOperator {
    name: String,
    first: BoxedOperator,
    second: BoxedOperator,
}

impl SplitOperator {
    pub fn new<S: Into<String>>(name: S, first: BoxedOperator, second: BoxedOperator) -> Self {
        Self {
            name: name.into(),
            first,
            second,
        }
    }
}

impl Operator for SplitOperator {
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        self.first.accept(tuple.clone())?;
        self.second.accept(tuple)
    }

    fn flush(&mut self, context: Tuple) -> Result<()> {
        self.first.flush(context.clone())?;
        self.second.flush(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Meter operator - counts records per window and logs the count on flush
///
/// Records and flushes pass through unchanged.
#[derive(Debug)]
pub struct MeterOperator {
    name: String,
    epoch: u64,
    records: u64,
    next: BoxedOperator,
}

impl MeterOperator {
    pub fn new<S: Into<String>>(name: S, next: BoxedOperator) -> Self {
        Self {
            name: name.into(),
            epoch: 0,
            records: 0,
            next,
        }
    }

    /// Records seen since the last flush
    pub fn records_in_window(&self) -> u64 {
        self.records
    }

    /// Number of windows closed so far
    pub fn epochs_closed(&self) -> u64 {
        self.epoch
    }
}

impl Operator for MeterOperator {
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        self.records += 1;
        self.next.accept(tuple)
    }

    fn flush(&mut self, context: Tuple) -> Result<()> {
        info!(
            meter = %self.name,
            epoch = self.epoch,
            tuples = self.records,
            "window closed"
        );
        self.epoch += 1;
        self.records = 0;
        self.next.flush(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
