//! Epoch-synchronized two-input join
//!
//! A join correlates two independently driven feeds that both carry an epoch
//! id. Each feed gets its own [`JoinInput`] handle; both handles share one
//! join state behind a mutex, so the feeds may be driven from different call
//! paths (or threads) while every update stays serialized.
//!
//! ```text
//!   left feed ──► JoinInput(Left)  ─┐
//!                                   ├─► shared state ──► next
//!   right feed ─► JoinInput(Right) ─┘
//! ```
//!
//! Records are matched on `key ∪ {epoch}`. An unmatched record waits in its
//! side's pending table until the counterpart arrives from the other feed.
//! Each side also tracks an epoch cursor. When a side moves past an epoch
//! that the other side has already left, the join flushes that epoch
//! downstream, which keeps downstream epoch numbering continuous.
//!
//! The join's output must not feed back into either of its own inputs; the
//! state lock is held while downstream operators run.

use crate::config::JoinConfig;
use crate::error::Result;
use crate::pipeline::operator::{BoxedOperator, Operator};
use flowwatch_types::{Tuple, Value};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;
use tracing::{debug, trace};

/// Splits a record into `(join key fields, value fields)`
pub type JoinExtractor = Box<dyn Fn(&Tuple) -> (Tuple, Tuple) + Send>;

/// Which feed of a join a record arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSide {
    Left,
    Right,
}

impl JoinSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinSide::Left => "left",
            JoinSide::Right => "right",
        }
    }
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a join's counters and buffered state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    /// Records accepted on the left feed
    pub left_records: u64,

    /// Records accepted on the right feed
    pub right_records: u64,

    /// Merged records emitted
    pub matches: u64,

    /// Epoch flushes forwarded downstream
    pub flushes_emitted: u64,

    /// Pending entries dropped by the retention bound
    pub evicted: u64,

    /// Unmatched entries buffered on the left
    pub left_pending: usize,

    /// Unmatched entries buffered on the right
    pub right_pending: usize,

    pub left_epoch: i64,
    pub right_epoch: i64,
}

#[derive(Debug)]
struct PendingEntry {
    epoch: i64,
    values: Tuple,
}

struct SideState {
    extractor: JoinExtractor,
    pending: HashMap<String, PendingEntry>,
    cursor: i64,
    records: u64,
}

impl SideState {
    fn new(extractor: JoinExtractor) -> Self {
        Self {
            extractor,
            pending: HashMap::new(),
            cursor: 0,
            records: 0,
        }
    }
}

struct JoinState {
    name: String,
    epoch_key: String,
    retention: Option<u64>,
    left: SideState,
    right: SideState,
    matches: u64,
    flushes_emitted: u64,
    evicted: u64,
    next: BoxedOperator,
}

impl JoinState {
    fn cursors(&self, side: JoinSide) -> (i64, i64) {
        match side {
            JoinSide::Left => (self.left.cursor, self.right.cursor),
            JoinSide::Right => (self.right.cursor, self.left.cursor),
        }
    }

    fn side_mut(&mut self, side: JoinSide) -> &mut SideState {
        match side {
            JoinSide::Left => &mut self.left,
            JoinSide::Right => &mut self.right,
        }
    }

    /// Move `side`'s cursor up to `epoch`, flushing every epoch the other
    /// side has already moved past.
    fn advance(&mut self, side: JoinSide, epoch: i64) -> Result<()> {
        let mut moved = false;
        loop {
            let (cursor, other) = self.cursors(side);
            if epoch <= cursor {
                break;
            }
            if other > cursor {
                trace!(join = %self.name, %side, eid = cursor, "flushing epoch");
                let context = Tuple::new().with(self.epoch_key.clone(), Value::Int(cursor));
                self.next.flush(context)?;
                self.flushes_emitted += 1;
            }
            self.side_mut(side).cursor += 1;
            moved = true;
        }

        if moved {
            self.evict_expired();
        }
        Ok(())
    }

    fn evict_expired(&mut self) {
        let Some(retention) = self.retention else {
            return;
        };
        let retention = i64::try_from(retention).unwrap_or(i64::MAX);
        let horizon = self
            .left
            .cursor
            .min(self.right.cursor)
            .saturating_sub(retention);

        let mut evicted = 0;
        for state in [&mut self.left, &mut self.right] {
            let before = state.pending.len();
            state.pending.retain(|_, entry| entry.epoch >= horizon);
            evicted += before - state.pending.len();
        }

        if evicted > 0 {
            self.evicted += evicted as u64;
            debug!(join = %self.name, evicted, horizon, "evicted unmatched entries");
        }
    }

    fn accept(&mut self, side: JoinSide, tuple: Tuple) -> Result<()> {
        let epoch = tuple.get_int(&self.epoch_key)?;
        self.advance(side, epoch)?;

        let JoinState {
            name,
            epoch_key,
            left,
            right,
            matches,
            next,
            ..
        } = self;
        let (own, other) = match side {
            JoinSide::Left => (left, right),
            JoinSide::Right => (right, left),
        };
        own.records += 1;

        let (key, values) = (own.extractor)(&tuple);
        let merge_key = key.with(epoch_key.clone(), Value::Int(epoch));
        let id = merge_key.key_string();

        match other.pending.remove(&id) {
            Some(entry) => {
                let mut merged = entry.values;
                merged.extend_from(&values);
                *matches += 1;
                trace!(join = %name, %side, eid = epoch, "matched");
                next.accept(merge_key.union(&merged))
            }
            None => {
                own.pending.insert(id, PendingEntry { epoch, values });
                Ok(())
            }
        }
    }

    fn flush(&mut self, side: JoinSide, context: &Tuple) -> Result<()> {
        let epoch = context.get_int(&self.epoch_key)?;
        self.advance(side, epoch)
    }

    fn stats(&self) -> JoinStats {
        JoinStats {
            left_records: self.left.records,
            right_records: self.right.records,
            matches: self.matches,
            flushes_emitted: self.flushes_emitted,
            evicted: self.evicted,
            left_pending: self.left.pending.len(),
            right_pending: self.right.pending.len(),
            left_epoch: self.left.cursor,
            right_epoch: self.right.cursor,
        }
    }
}

/// Builder for a join; split it into its two input handles with
/// [`JoinOperator::into_inputs`].
///
/// # Example
///
/// ```rust
/// use flowwatch_types::Tuple;
/// use processor::config::JoinConfig;
/// use processor::core::{filter_groups, join_fields};
/// use processor::join::JoinOperator;
/// use processor::pipeline::{CollectingSink, Operator};
///
/// let sink = CollectingSink::new("out");
/// let join = JoinOperator::new(
///     "syn-ack",
///     &JoinConfig::default(),
///     join_fields(filter_groups(&["host"]), &["syns"]),
///     join_fields(filter_groups(&["host"]), &["acks"]),
///     Box::new(sink.clone()),
/// )
/// .unwrap();
/// let (mut left, mut right) = join.into_inputs();
///
/// left.accept(Tuple::new().with("host", 1i64).with("eid", 0i64).with("syns", 9i64)).unwrap();
/// right.accept(Tuple::new().with("host", 1i64).with("eid", 0i64).with("acks", 2i64)).unwrap();
///
/// let merged = &sink.records()[0];
/// assert_eq!(merged.get_int("syns").unwrap(), 9);
/// assert_eq!(merged.get_int("acks").unwrap(), 2);
/// ```
pub struct JoinOperator {
    state: Arc<Mutex<JoinState>>,
}

impl JoinOperator {
    pub fn new<S, L, R>(
        name: S,
        config: &JoinConfig,
        left: L,
        right: R,
        next: BoxedOperator,
    ) -> Result<Self>
    where
        S: Into<String>,
        L: Fn(&Tuple) -> (Tuple, Tuple) + Send + 'static,
        R: Fn(&Tuple) -> (Tuple, Tuple) + Send + 'static,
    {
        config.validate()?;
        let state = JoinState {
            name: name.into(),
            epoch_key: config.epoch_key.clone(),
            retention: config.retention_epochs,
            left: SideState::new(Box::new(left)),
            right: SideState::new(Box::new(right)),
            matches: 0,
            flushes_emitted: 0,
            evicted: 0,
            next,
        };
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Consume the builder, returning the `(left, right)` input handles
    pub fn into_inputs(self) -> (JoinInput, JoinInput) {
        let name = self.state.lock().name.clone();
        let left = JoinInput {
            name: format!("{}.left", name),
            side: JoinSide::Left,
            state: Arc::clone(&self.state),
        };
        let right = JoinInput {
            name: format!("{}.right", name),
            side: JoinSide::Right,
            state: self.state,
        };
        (left, right)
    }
}

/// One feed of a join
pub struct JoinInput {
    name: String,
    side: JoinSide,
    state: Arc<Mutex<JoinState>>,
}

impl JoinInput {
    pub fn side(&self) -> JoinSide {
        self.side
    }

    /// Counters of the join this input belongs to
    pub fn stats(&self) -> JoinStats {
        self.state.lock().stats()
    }
}

impl Debug for JoinInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinInput")
            .field("name", &self.name)
            .field("side", &self.side)
            .finish()
    }
}

impl Operator for JoinInput {
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        self.state.lock().accept(self.side, tuple)
    }

    fn flush(&mut self, context: Tuple) -> Result<()> {
        self.state.lock().flush(self.side, &context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
