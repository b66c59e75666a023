//! Configuration types for the stream processor
//!
//! This module provides configuration structures for epoch windowing, joins,
//! the feed executor and the thresholds used by the detection queries.

use crate::error::{ProcessorError, Result};
use serde::{Deserialize, Serialize};

/// Main processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Epoch windowing configuration
    #[serde(default)]
    pub epoch: EpochConfig,

    /// Join configuration
    #[serde(default)]
    pub join: JoinConfig,

    /// Detection query thresholds
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Maximum messages buffered by the feed executor before backpressure
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            epoch: EpochConfig::default(),
            join: JoinConfig::default(),
            detection: DetectionConfig::default(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl ProcessorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.epoch.validate()?;
        self.join.validate()?;
        self.detection.validate()?;

        if self.buffer_size == 0 {
            return Err(ProcessorError::Configuration {
                source: "buffer_size must be greater than 0".into(),
            });
        }

        Ok(())
    }

    pub fn with_epoch(mut self, epoch: EpochConfig) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn with_join(mut self, join: JoinConfig) -> Self {
        self.join = join;
        self
    }

    pub fn with_detection(mut self, detection: DetectionConfig) -> Self {
        self.detection = detection;
        self
    }
}

/// Epoch (tumbling window) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochConfig {
    /// Window width, in the units of the time field (seconds for packet captures)
    #[serde(default = "default_epoch_width")]
    pub width_secs: f64,

    /// Field holding the record timestamp
    #[serde(default = "default_time_field")]
    pub time_field: String,

    /// Field the epoch id is written to
    #[serde(default = "default_epoch_key")]
    pub key: String,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            width_secs: default_epoch_width(),
            time_field: default_time_field(),
            key: default_epoch_key(),
        }
    }
}

impl EpochConfig {
    pub fn new(width_secs: f64) -> Self {
        Self {
            width_secs,
            ..Default::default()
        }
    }

    pub fn with_key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_time_field<S: Into<String>>(mut self, field: S) -> Self {
        self.time_field = field.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.width_secs.is_finite() || self.width_secs <= 0.0 {
            return Err(ProcessorError::Configuration {
                source: format!(
                    "epoch width must be a positive finite number, got {}",
                    self.width_secs
                )
                .into(),
            });
        }

        if self.time_field.is_empty() || self.key.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "epoch time_field and key cannot be empty".into(),
            });
        }

        Ok(())
    }
}

/// Join configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Field carrying the epoch id on both inputs
    #[serde(default = "default_epoch_key")]
    pub epoch_key: String,

    /// Evict pending entries this many epochs behind both cursors.
    ///
    /// `None` keeps unmatched entries until they are matched.
    #[serde(default)]
    pub retention_epochs: Option<u64>,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            epoch_key: default_epoch_key(),
            retention_epochs: None,
        }
    }
}

impl JoinConfig {
    pub fn with_retention(mut self, epochs: u64) -> Self {
        self.retention_epochs = Some(epochs);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.epoch_key.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "join epoch_key cannot be empty".into(),
            });
        }
        Ok(())
    }
}

/// Alert thresholds for the detection queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// New TCP connections per destination
    #[serde(default = "default_threshold")]
    pub new_connections: i64,

    /// Distinct sources per (destination, packet length) on port 22
    #[serde(default = "default_threshold")]
    pub ssh_brute_force: i64,

    /// Distinct destinations per source
    #[serde(default = "default_threshold")]
    pub super_spreader: i64,

    /// Distinct destination ports per source
    #[serde(default = "default_threshold")]
    pub port_scan: i64,

    /// Distinct sources per destination
    #[serde(default = "default_ddos_threshold")]
    pub ddos: i64,

    /// Minimum of `syns + synacks - acks` per host
    #[serde(default = "default_syn_flood_threshold")]
    pub syn_flood: i64,

    /// Minimum of `syns - fins` per host
    #[serde(default = "default_completed_flows_threshold")]
    pub completed_flows: i64,

    #[serde(default = "default_slowloris_min_connections")]
    pub slowloris_min_connections: i64,

    #[serde(default = "default_slowloris_min_bytes")]
    pub slowloris_min_bytes: i64,

    #[serde(default = "default_slowloris_max_bytes_per_connection")]
    pub slowloris_max_bytes_per_connection: i64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            new_connections: default_threshold(),
            ssh_brute_force: default_threshold(),
            super_spreader: default_threshold(),
            port_scan: default_threshold(),
            ddos: default_ddos_threshold(),
            syn_flood: default_syn_flood_threshold(),
            completed_flows: default_completed_flows_threshold(),
            slowloris_min_connections: default_slowloris_min_connections(),
            slowloris_min_bytes: default_slowloris_min_bytes(),
            slowloris_max_bytes_per_connection: default_slowloris_max_bytes_per_connection(),
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        // Division by the connection count in slowloris relies on this.
        if self.slowloris_min_connections <= 0 {
            return Err(ProcessorError::Configuration {
                source: "slowloris_min_connections must be greater than 0".into(),
            });
        }

        let counts = [
            ("new_connections", self.new_connections),
            ("ssh_brute_force", self.ssh_brute_force),
            ("super_spreader", self.super_spreader),
            ("port_scan", self.port_scan),
            ("ddos", self.ddos),
        ];
        for (name, value) in counts {
            if value < 0 {
                return Err(ProcessorError::Configuration {
                    source: format!("{} threshold cannot be negative, got {}", name, value).into(),
                });
            }
        }

        Ok(())
    }
}

fn default_buffer_size() -> usize {
    10_000
}

fn default_epoch_width() -> f64 {
    1.0
}

fn default_time_field() -> String {
    "time".to_string()
}

fn default_epoch_key() -> String {
    "eid".to_string()
}

fn default_threshold() -> i64 {
    40
}

fn default_ddos_threshold() -> i64 {
    45
}

fn default_syn_flood_threshold() -> i64 {
    3
}

fn default_completed_flows_threshold() -> i64 {
    1
}

fn default_slowloris_min_connections() -> i64 {
    5
}

fn default_slowloris_min_bytes() -> i64 {
    500
}

fn default_slowloris_max_bytes_per_connection() -> i64 {
    90
}
