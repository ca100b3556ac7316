//! Immutable runtime configuration.
//!
//! A single [`Config`] value is built once (defaults, optionally layered
//! from a TOML file) and injected by reference into every component.
//! Nothing reads thresholds or intervals from ambient globals, so tests
//! can substitute values without process-wide side effects.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classes::ClassTable;

/// Admission and projection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// CPU average above this fails the health gate and marks a
    /// projection as marginal.
    pub warn_cpu_percent: f64,
    /// Projected CPU above this is a hard block.
    pub critical_cpu_percent: f64,
    /// Free memory below this (GiB) fails the health gate and marks a
    /// projection as marginal.
    pub warn_memory_gib: f64,
    /// Projected free memory below this (GiB) is a hard block.
    pub critical_memory_gib: f64,
    /// Combined-pressure heuristic: CPU bound.
    pub combined_cpu_percent: f64,
    /// Combined-pressure heuristic: free memory bound (GiB).
    pub combined_memory_gib: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn_cpu_percent: 40.0,
            critical_cpu_percent: 80.0,
            warn_memory_gib: 1.0,
            critical_memory_gib: 0.5,
            combined_cpu_percent: 30.0,
            combined_memory_gib: 2.0,
        }
    }
}

/// Poll intervals and the single bounded wait.
///
/// Only the pre-switch ready wait carries a timeout. The switch wait and
/// all deletion waits are deliberately unbounded: walking away from an
/// in-flight cut-over or an unconfirmed delete would leave the source in
/// an undefined intermediate state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub snapshot_interval_secs: u64,
    pub ready_interval_secs: u64,
    pub ready_timeout_minutes: u64,
    pub switch_interval_secs: u64,
    pub record_delete_interval_secs: u64,
    pub node_delete_interval_secs: u64,
    pub group_delete_interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: 10,
            ready_interval_secs: 30,
            ready_timeout_minutes: 90,
            switch_interval_secs: 10,
            record_delete_interval_secs: 5,
            node_delete_interval_secs: 15,
            group_delete_interval_secs: 20,
        }
    }
}

impl PollConfig {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn ready_interval(&self) -> Duration {
        Duration::from_secs(self.ready_interval_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_minutes * 60)
    }

    pub fn switch_interval(&self) -> Duration {
        Duration::from_secs(self.switch_interval_secs)
    }

    pub fn record_delete_interval(&self) -> Duration {
        Duration::from_secs(self.record_delete_interval_secs)
    }

    pub fn node_delete_interval(&self) -> Duration {
        Duration::from_secs(self.node_delete_interval_secs)
    }

    pub fn group_delete_interval(&self) -> Duration {
        Duration::from_secs(self.group_delete_interval_secs)
    }
}

/// Top-level configuration injected into every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub poll: PollConfig,
    /// Telemetry look-back window in minutes.
    pub telemetry_window_minutes: i64,
    /// Retained-resource suffixes, most specific first. First match wins
    /// for both suffix stripping and old-resource search.
    pub old_suffixes: Vec<String>,
    /// Infix used for pre-change snapshot names:
    /// `{identifier}-{snapshot_infix}-{timestamp}`.
    pub snapshot_infix: String,
    /// Prefix for deployment names: `{deployment_prefix}{identifier}-{timestamp}`.
    pub deployment_prefix: String,
    /// Class-name fragments listed first when presenting orderable classes.
    pub preferred_class_families: Vec<String>,
    /// Static class reference specs for suitability projection.
    pub classes: ClassTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            poll: PollConfig::default(),
            telemetry_window_minutes: 15,
            old_suffixes: ["-old1", "-old2", "-old", "-blue", "-previous"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            snapshot_infix: "pre-change".to_string(),
            deployment_prefix: "bg-".to_string(),
            preferred_class_families: ["db.t4g.", "db.t3.", "db.m6g.", "db.m5."]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            classes: ClassTable::default(),
        }
    }
}

impl Config {
    /// Load a config from a TOML file, with defaults for absent keys.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e))?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Combined memory bound in bytes.
    pub fn combined_memory_bytes(&self) -> f64 {
        self.thresholds.combined_memory_gib * crate::types::GIB
    }

    /// Warn memory bound in bytes.
    pub fn warn_memory_bytes(&self) -> f64 {
        self.thresholds.warn_memory_gib * crate::types::GIB
    }
}

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(String, #[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
