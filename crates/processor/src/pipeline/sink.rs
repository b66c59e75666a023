//! Terminal operators
//!
//! [`CollectingSink`] records everything it receives behind a shared handle,
//! so a caller can keep a clone and inspect the output after driving a
//! pipeline. [`DumpSink`] renders records as text.

use crate::error::Result;
use crate::pipeline::operator::Operator;
use flowwatch_types::Tuple;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::io::Write;
use std::sync::Arc;

/// Something that reached a sink, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Record(Tuple),
    Flush(Tuple),
}

/// In-memory sink with a cloneable, shared buffer
#[derive(Debug, Clone)]
pub struct CollectingSink {
    name: String,
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl CollectingSink {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Everything received so far, records and flushes interleaved
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    pub fn records(&self) -> Vec<Tuple> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Record(tuple) => Some(tuple.clone()),
                SinkEvent::Flush(_) => None,
            })
            .collect()
    }

    pub fn flushes(&self) -> Vec<Tuple> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Flush(context) => Some(context.clone()),
                SinkEvent::Record(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Operator for CollectingSink {
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        self.events.lock().push(SinkEvent::Record(tuple));
        Ok(())
    }

    fn flush(&mut self, context: Tuple) -> Result<()> {
        self.events.lock().push(SinkEvent::Flush(context));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Writes one line per record as `"field" => value, ...`
///
/// When `show_flushes` is set, each flush writes a `[flush]` marker line.
pub struct DumpSink<W: Write + Send> {
    name: String,
    writer: W,
    show_flushes: bool,
}

impl<W: Write + Send> DumpSink<W> {
    pub fn new<S: Into<String>>(name: S, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
            show_flushes: false,
        }
    }

    pub fn with_flush_markers(mut self, show: bool) -> Self {
        self.show_flushes = show;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Debug for DumpSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpSink")
            .field("name", &self.name)
            .field("show_flushes", &self.show_flushes)
            .finish()
    }
}

impl<W: Write + Send> Operator for DumpSink<W> {
    fn accept(&mut self, tuple: Tuple) -> Result<()> {
        writeln!(self.writer, "{}", tuple)?;
        Ok(())
    }

    fn flush(&mut self, _context: Tuple) -> Result<()> {
        if self.show_flushes {
            writeln!(self.writer, "[flush]")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
