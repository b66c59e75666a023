//! Fluent construction of operator chains
//!
//! Operators own their successor, so a chain has to be assembled back to
//! front. [`PipelineBuilder`] lets callers list stages in data-flow order and
//! folds them onto a sink in [`PipelineBuilder::build`].

use crate::aggregation::GroupByOperator;
use crate::config::EpochConfig;
use crate::deduplication::DistinctOperator;
use crate::error::{ProcessorError, Result};
use crate::pipeline::operator::{BoxedOperator, FilterOperator, MapOperator, MeterOperator};
use crate::window::EpochOperator;
use flowwatch_types::{Tuple, Value};
use tracing::debug;

type Stage = Box<dyn FnOnce(BoxedOperator) -> Result<BoxedOperator>>;

/// Builder for a linear operator chain
///
/// Stage names are derived from the pipeline name, e.g. `new_cons.epoch`.
///
/// # Example
///
/// ```rust
/// use processor::aggregation::counter;
/// use processor::core::{filter_groups, key_geq_int};
/// use processor::pipeline::{CollectingSink, PipelineBuilder};
///
/// # fn example() -> processor::ProcessorResult<()> {
/// let alerts = CollectingSink::new("alerts");
/// let _head = PipelineBuilder::new("super_spreader")
///     .epoch(1.0, "eid")
///     .distinct(filter_groups(&["ipv4.src", "ipv4.dst"]))
///     .groupby(filter_groups(&["ipv4.src"]), counter, "dsts")
///     .filter("threshold", key_geq_int("dsts", 40))
///     .build(Box::new(alerts.clone()))?;
/// # Ok(())
/// # }
/// ```
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    /// Create a new, empty pipeline builder
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stages added so far
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn stage_name(&self, label: &str) -> String {
        format!("{}.{}", self.name, label)
    }

    fn push<F>(mut self, stage: F) -> Self
    where
        F: FnOnce(BoxedOperator) -> Result<BoxedOperator> + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    /// Tag records with epoch ids of the given width, reading `time`
    pub fn epoch<K: Into<String>>(self, width: f64, key: K) -> Self {
        self.epoch_with(EpochConfig::new(width).with_key(key))
    }

    /// Tag records with epoch ids using a full epoch configuration
    pub fn epoch_with(self, config: EpochConfig) -> Self {
        let name = self.stage_name("epoch");
        self.push(move |next| {
            let op = EpochOperator::from_config(name, &config, next)?;
            Ok(Box::new(op) as BoxedOperator)
        })
    }

    pub fn map<L, F>(self, label: L, func: F) -> Self
    where
        L: AsRef<str>,
        F: Fn(Tuple) -> Result<Tuple> + Send + 'static,
    {
        let name = self.stage_name(label.as_ref());
        self.push(move |next| Ok(Box::new(MapOperator::new(name, func, next)) as BoxedOperator))
    }

    pub fn filter<L, F>(self, label: L, predicate: F) -> Self
    where
        L: AsRef<str>,
        F: Fn(&Tuple) -> Result<bool> + Send + 'static,
    {
        let name = self.stage_name(label.as_ref());
        self.push(move |next| {
            Ok(Box::new(FilterOperator::new(name, predicate, next)) as BoxedOperator)
        })
    }

    /// Group and reduce per window, writing the aggregate to `out_field`
    pub fn groupby<G, R, O>(self, grouping: G, reduce: R, out_field: O) -> Self
    where
        G: Fn(&Tuple) -> Tuple + Send + 'static,
        R: Fn(Value, &Tuple) -> Result<Value> + Send + 'static,
        O: Into<String>,
    {
        let out_field = out_field.into();
        let name = self.stage_name(&format!("groupby({})", out_field));
        self.push(move |next| {
            let op = GroupByOperator::new(name, grouping, reduce, out_field, next);
            Ok(Box::new(op) as BoxedOperator)
        })
    }

    /// Drop records whose projected key was already seen in the window
    pub fn distinct<G>(self, grouping: G) -> Self
    where
        G: Fn(&Tuple) -> Tuple + Send + 'static,
    {
        let name = self.stage_name("distinct");
        self.push(move |next| {
            Ok(Box::new(DistinctOperator::new(name, grouping, next)) as BoxedOperator)
        })
    }

    /// Log the number of records per window at this point of the chain
    pub fn meter(self) -> Self {
        let name = self.stage_name("meter");
        self.push(move |next| Ok(Box::new(MeterOperator::new(name, next)) as BoxedOperator))
    }

    /// Insert an arbitrary operator constructed around its successor
    pub fn stage<F>(self, build: F) -> Self
    where
        F: FnOnce(BoxedOperator) -> Result<BoxedOperator> + 'static,
    {
        self.push(build)
    }

    /// Assemble the chain onto `sink`, returning its head
    pub fn build(self, sink: BoxedOperator) -> Result<BoxedOperator> {
        if self.name.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "pipeline name cannot be empty".into(),
            });
        }

        debug!(
            pipeline = %self.name,
            stages = self.stages.len(),
            sink = %sink.name(),
            "building pipeline"
        );
        self.stages
            .into_iter()
            .rev()
            .try_fold(sink, |next, stage| stage(next))
    }
}
