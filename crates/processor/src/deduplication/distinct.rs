//! Per-window duplicate suppression

use crate::error::Result;
use crate::pipeline::operator::{BoxedOperator, Operator};
use flowwatch_types::Tuple;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use tracing::{debug, trace};

/// Counters for a [`DistinctOperator`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctStats {
    /// Records checked
    pub total_checked: u64,

    /// Records forwarded because their key was new in the window
    pub unique_records: u64,

    /// Records dropped as duplicates
    pub duplicates_dropped: u64,

    /// Windows closed
    pub windows_flushed: u64,
}

impl DistinctStats {
    /// Fraction of checked records that were duplicates
    pub fn duplicate_rate(&self) -> f64 {
        if self.total_checked == 0 {
            0.0
        } else {
            self.duplicates_dropped as f64 / self.total_checked as f64
        }
    }
}

/// Forwards only the first record per projected key in each window.
///
/// Duplicates are dropped without error. The seen-set is cleared on every
/// flush.
pub struct DistinctOperator<G>
where
    G: Fn(&Tuple) -> Tuple + Send,
{
    name: String,
    grouping: G,
    seen: HashSet<String>,
    stats: DistinctStats,
    next: BoxedOperator,
}

impl<G> DistinctOperator<G>
where
    G: Fn(&Tuple) -> Tuple + Send,
{
    pub fn new<S: Into<String>>(name: S, grouping: G, next: BoxedOperator) -> Self {
        Self {
            name: name.into(),
            grouping,
            seen: HashSet::new(),
            stats: DistinctStats::default(),
            next,
        }
    }

    pub fn stats(&self) -> &DistinctStats {
        &self.stats
    }

    /// Keys seen in the current window
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

impl<G> Debug for DistinctOperator<G>
where
    G: Fn(&Tuple) -> Tuple + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistinctOperator")
            .field("name", &self.name)
            .field("seen", &self.seen.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<G> Operator for DistinctOperator<G>
where
    G: Fn(&Tuple) -> Tuple + Send,
{
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        self.stats.total_checked += 1;
        let key = (self.grouping)(&tuple).key_string();

        if self.seen.insert(key) {
            self.stats.unique_records += 1;
            self.next.accept(tuple)
        } else {
            trace!(operator = %self.name, "duplicate dropped");
            self.stats.duplicates_dropped += 1;
            Ok(())
        }
    }

    fn flush(&mut self, context: Tuple) -> Result<()> {
        debug!(operator = %self.name, distinct = self.seen.len(), "window cleared");
        self.seen.clear();
        self.stats.windows_flushed += 1;
        self.next.flush(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
