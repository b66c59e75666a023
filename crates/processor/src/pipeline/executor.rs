//! Single-task executor for multi-feed pipelines
//!
//! Operators are synchronous and not meant to be driven from several threads
//! at once. When records come from independent producers (for example the two
//! feeds of a join), the producers send through [`FeedHandle`]s and one task
//! running [`FeedExecutor::run`] applies every message to its operator head in
//! arrival order.

use crate::config::ProcessorConfig;
use crate::error::{ProcessorError, Result};
use crate::pipeline::operator::BoxedOperator;
use flowwatch_types::Tuple;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

/// Statistics for the feed executor
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Total records processed
    pub records_processed: u64,

    /// Total flushes processed
    pub flushes_processed: u64,

    /// Records processed per feed, indexed by feed id
    pub records_per_feed: Vec<u64>,
}

impl ExecutorStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    fn with_feeds(feeds: usize) -> Self {
        Self {
            records_per_feed: vec![0; feeds],
            ..Self::default()
        }
    }

    /// Increment records processed
    pub fn inc_records_processed(&mut self, feed: usize) {
        self.records_processed += 1;
        if let Some(count) = self.records_per_feed.get_mut(feed) {
            *count += 1;
        }
    }

    /// Increment flushes processed
    pub fn inc_flushes_processed(&mut self) {
        self.flushes_processed += 1;
    }

    /// Get records per second
    pub fn records_per_second(&self, elapsed_seconds: f64) -> f64 {
        if elapsed_seconds > 0.0 {
            self.records_processed as f64 / elapsed_seconds
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
enum FeedMessage {
    Record { feed: usize, tuple: Tuple },
    Flush { feed: usize, context: Tuple },
}

/// Producer side of one registered feed
#[derive(Debug, Clone)]
pub struct FeedHandle {
    feed: usize,
    tx: mpsc::Sender<FeedMessage>,
}

impl FeedHandle {
    /// Feed id assigned at registration
    pub fn feed(&self) -> usize {
        self.feed
    }

    /// Send one record to this feed
    pub async fn send(&self, tuple: Tuple) -> Result<()> {
        self.tx
            .send(FeedMessage::Record {
                feed: self.feed,
                tuple,
            })
            .await
            .map_err(|e| ProcessorError::Execution {
                source: format!("Failed to send record to feed {}: {}", self.feed, e).into(),
            })
    }

    /// Send a batch of records
    pub async fn send_batch<I>(&self, tuples: I) -> Result<()>
    where
        I: IntoIterator<Item = Tuple>,
    {
        for tuple in tuples {
            self.send(tuple).await?;
        }
        Ok(())
    }

    /// Send a flush to this feed
    pub async fn flush(&self, context: Tuple) -> Result<()> {
        self.tx
            .send(FeedMessage::Flush {
                feed: self.feed,
                context,
            })
            .await
            .map_err(|e| ProcessorError::Execution {
                source: format!("Failed to send flush to feed {}: {}", self.feed, e).into(),
            })
    }
}

/// Drives several operator heads from one task
///
/// # Example
///
/// ```rust
/// use flowwatch_types::Tuple;
/// use processor::pipeline::{CollectingSink, FeedExecutor};
///
/// # async fn example() -> processor::ProcessorResult<()> {
/// let sink = CollectingSink::new("out");
/// let mut executor = FeedExecutor::new("demo", 128)?;
/// let feed = executor.register(Box::new(sink.clone()));
///
/// tokio::spawn(async move {
///     feed.send(Tuple::new().with("n", 1i64)).await?;
///     feed.flush(Tuple::new()).await
/// });
///
/// let stats = executor.run().await?;
/// assert_eq!(stats.records_processed, 1);
/// # Ok(())
/// # }
/// ```
pub struct FeedExecutor {
    name: String,
    heads: Vec<BoxedOperator>,
    tx: mpsc::Sender<FeedMessage>,
    rx: mpsc::Receiver<FeedMessage>,
}

impl FeedExecutor {
    /// Create an executor whose channel buffers at most `buffer_size` messages
    pub fn new<S: Into<String>>(name: S, buffer_size: usize) -> Result<Self> {
        if buffer_size == 0 {
            return Err(ProcessorError::Configuration {
                source: "buffer_size must be greater than 0".into(),
            });
        }

        let (tx, rx) = mpsc::channel(buffer_size);
        Ok(Self {
            name: name.into(),
            heads: Vec::new(),
            tx,
            rx,
        })
    }

    pub fn from_config<S: Into<String>>(name: S, config: &ProcessorConfig) -> Result<Self> {
        config.validate()?;
        Self::new(name, config.buffer_size)
    }

    /// Register an operator head as a new feed
    pub fn register(&mut self, head: BoxedOperator) -> FeedHandle {
        let feed = self.heads.len();
        debug!(executor = %self.name, feed, head = %head.name(), "feed registered");
        self.heads.push(head);
        FeedHandle {
            feed,
            tx: self.tx.clone(),
        }
    }

    /// Number of registered feeds
    pub fn feed_count(&self) -> usize {
        self.heads.len()
    }

    /// Process messages until every [`FeedHandle`] has been dropped.
    ///
    /// Stops at the first operator error and returns it.
    pub async fn run(self) -> Result<ExecutorStats> {
        let FeedExecutor {
            name,
            mut heads,
            tx,
            mut rx,
        } = self;
        info!(executor = %name, feeds = heads.len(), "Starting feed executor");

        // Only producer handles keep the channel open from here on.
        drop(tx);
        let mut stats = ExecutorStats::with_feeds(heads.len());

        while let Some(message) = rx.recv().await {
            let outcome = match message {
                FeedMessage::Record { feed, tuple } => {
                    trace!(executor = %name, feed, "processing record");
                    stats.inc_records_processed(feed);
                    heads[feed].accept(tuple)
                }
                FeedMessage::Flush { feed, context } => {
                    debug!(executor = %name, feed, "processing flush");
                    stats.inc_flushes_processed();
                    heads[feed].flush(context)
                }
            };

            if let Err(e) = outcome {
                error!(executor = %name, error = %e, "Failed to process message");
                return Err(e);
            }
        }

        info!(
            executor = %name,
            records = stats.records_processed,
            flushes = stats.flushes_processed,
            "Feed executor stopped"
        );
        Ok(stats)
    }
}
