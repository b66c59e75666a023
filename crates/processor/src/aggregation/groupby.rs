//! Grouped reduction over an epoch

use crate::error::Result;
use crate::pipeline::operator::{BoxedOperator, Operator};
use flowwatch_types::{Tuple, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::debug;

#[derive(Debug, Clone)]
struct Group {
    key: Tuple,
    accumulator: Value,
}

/// Folds records into one accumulator per grouping key and emits the groups
/// when the window is flushed.
///
/// On flush every group is emitted, in the order its key was first seen, as
/// `context ∪ key ∪ {out_field: accumulator}`. Fields already present in the
/// flush context take precedence over key fields of the same name. The flush
/// is then forwarded and all groups are dropped.
///
/// # Example
///
/// ```rust
/// use flowwatch_types::Tuple;
/// use processor::aggregation::{counter, GroupByOperator};
/// use processor::core::single_group;
/// use processor::pipeline::{CollectingSink, Operator};
///
/// let sink = CollectingSink::new("out");
/// let mut count = GroupByOperator::new("count", single_group, counter, "pkts", Box::new(sink.clone()));
///
/// for _ in 0..3 {
///     count.accept(Tuple::new()).unwrap();
/// }
/// count.flush(Tuple::new().with("eid", 0i64)).unwrap();
///
/// assert_eq!(sink.records()[0].get_int("pkts").unwrap(), 3);
/// ```
pub struct GroupByOperator<G, R>
where
    G: Fn(&Tuple) -> Tuple + Send,
    R: Fn(Value, &Tuple) -> Result<Value> + Send,
{
    name: String,
    grouping: G,
    reduce: R,
    out_field: String,
    /// Groups in first-seen order
    groups: Vec<Group>,
    /// Serialized key -> position in `groups`
    index: HashMap<String, usize>,
    next: BoxedOperator,
}

impl<G, R> GroupByOperator<G, R>
where
    G: Fn(&Tuple) -> Tuple + Send,
    R: Fn(Value, &Tuple) -> Result<Value> + Send,
{
    pub fn new<S, O>(name: S, grouping: G, reduce: R, out_field: O, next: BoxedOperator) -> Self
    where
        S: Into<String>,
        O: Into<String>,
    {
        Self {
            name: name.into(),
            grouping,
            reduce,
            out_field: out_field.into(),
            groups: Vec::new(),
            index: HashMap::new(),
            next,
        }
    }

    /// Number of groups in the current window
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl<G, R> Debug for GroupByOperator<G, R>
where
    G: Fn(&Tuple) -> Tuple + Send,
    R: Fn(Value, &Tuple) -> Result<Value> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupByOperator")
            .field("name", &self.name)
            .field("out_field", &self.out_field)
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl<G, R> Operator for GroupByOperator<G, R>
where
    G: Fn(&Tuple) -> Tuple + Send,
    R: Fn(Value, &Tuple) -> Result<Value> + Send,
{
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        let key = (self.grouping)(&tuple);
        let id = key.key_string();

        match self.index.get(&id) {
            Some(&slot) => {
                let group = &mut self.groups[slot];
                group.accumulator = (self.reduce)(group.accumulator, &tuple)?;
            }
            None => {
                let accumulator = (self.reduce)(Value::Empty, &tuple)?;
                self.index.insert(id, self.groups.len());
                self.groups.push(Group { key, accumulator });
            }
        }
        Ok(())
    }

    fn flush(&mut self, context: Tuple) -> Result<()> {
        let groups = std::mem::take(&mut self.groups);
        self.index.clear();
        debug!(operator = %self.name, groups = groups.len(), "emitting groups");

        for group in groups {
            let out = context
                .union(&group.key)
                .with(self.out_field.clone(), group.accumulator);
            self.next.accept(out)?;
        }
        self.next.flush(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
