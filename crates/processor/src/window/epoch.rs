//! Tumbling epoch assignment

use crate::config::EpochConfig;
use crate::error::{ProcessorError, Result};
use crate::pipeline::operator::{BoxedOperator, Operator};
use flowwatch_types::{Tuple, Value};
use tracing::{debug, trace};

/// Tags each record with the id of the fixed-width window its time falls in
/// and emits one flush per closed window.
///
/// The first record opens window 0 at its own timestamp. A record arriving
/// several windows later first flushes every intervening window, empty ones
/// included, so downstream epoch ids never skip.
///
/// # Example
///
/// ```rust
/// use flowwatch_types::Tuple;
/// use processor::pipeline::{CollectingSink, Operator};
/// use processor::window::EpochOperator;
///
/// let sink = CollectingSink::new("out");
/// let mut epoch = EpochOperator::new("epoch", 1.0, "eid", Box::new(sink.clone())).unwrap();
///
/// for t in [0.0, 0.5, 2.2] {
///     epoch.accept(Tuple::new().with("time", t)).unwrap();
/// }
/// assert_eq!(sink.flushes().len(), 2);
/// assert_eq!(sink.records()[2].get_int("eid").unwrap(), 2);
/// ```
#[derive(Debug)]
pub struct EpochOperator {
    name: String,
    width: f64,
    time_field: String,
    key: String,
    /// End of the current window; `None` until the first record arrives
    boundary: Option<f64>,
    eid: i64,
    next: BoxedOperator,
}

impl EpochOperator {
    /// Create an epoch operator reading the `time` field
    pub fn new<S, K>(name: S, width: f64, key: K, next: BoxedOperator) -> Result<Self>
    where
        S: Into<String>,
        K: Into<String>,
    {
        let config = EpochConfig::new(width).with_key(key);
        Self::from_config(name, &config, next)
    }

    pub fn from_config<S: Into<String>>(
        name: S,
        config: &EpochConfig,
        next: BoxedOperator,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            width: config.width_secs,
            time_field: config.time_field.clone(),
            key: config.key.clone(),
            boundary: None,
            eid: 0,
            next,
        })
    }

    /// Current epoch id
    pub fn current_epoch(&self) -> i64 {
        self.eid
    }

    /// End of the window starting at `from`; the width must still be
    /// representable at this magnitude.
    fn next_boundary(&self, from: f64) -> Result<f64> {
        let next = from + self.width;
        if next <= from {
            return Err(ProcessorError::Execution {
                source: format!(
                    "{}: epoch width {} is below the time resolution at {}",
                    self.name, self.width, from
                )
                .into(),
            });
        }
        Ok(next)
    }

    fn boundary_context(&self) -> Tuple {
        Tuple::new().with(self.key.clone(), Value::Int(self.eid))
    }
}

impl Operator for EpochOperator {
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        let time = tuple.get_float(&self.time_field)?;
        if !time.is_finite() {
            return Err(ProcessorError::Execution {
                source: format!("{} '{}' is not finite: {}", self.name, self.time_field, time)
                    .into(),
            });
        }

        let mut boundary = match self.boundary {
            Some(boundary) => boundary,
            None => self.next_boundary(time)?,
        };
        self.boundary = Some(boundary);
        while time >= boundary {
            let next = self.next_boundary(boundary)?;
            debug!(operator = %self.name, eid = self.eid, boundary, "epoch closed");
            let context = self.boundary_context();
            self.next.flush(context)?;
            boundary = next;
            self.boundary = Some(boundary);
            self.eid += 1;
        }

        trace!(operator = %self.name, eid = self.eid, time, "record tagged");
        let tagged = tuple.with(self.key.clone(), Value::Int(self.eid));
        self.next.accept(tagged)
    }

    fn flush(&mut self, _context: Tuple) -> Result<()> {
        debug!(operator = %self.name, eid = self.eid, "end of stream");
        let context = self.boundary_context();
        self.boundary = None;
        self.eid = 0;
        self.next.flush(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
