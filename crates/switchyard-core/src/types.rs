//! Domain types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One gibibyte, as used by memory thresholds and projections.
pub const GIB: f64 = (1u64 << 30) as f64;

/// Whether an identifier names a single node or a replicated group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A standalone database node.
    Single,
    /// A replicated group with one writer and zero or more readers.
    Group,
}

/// Network endpoint of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

/// Normalized view of a resource as observed by a single provider read.
///
/// Descriptors are immutable snapshots: they are re-fetched before every
/// decision and never cached across polls. For a group, `instance_class`
/// is the class of the writer node, since all health and suitability
/// decisions are keyed on the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub identifier: String,
    pub kind: ResourceKind,
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    pub storage_gib: Option<u32>,
    pub storage_kind: Option<String>,
    /// Writer member id; always present for `ResourceKind::Group`.
    pub writer_node_id: Option<String>,
    pub endpoint: Option<Endpoint>,
}

impl ResourceDescriptor {
    /// The node id that telemetry queries are keyed on.
    ///
    /// For groups this is the writer member; for single nodes the
    /// identifier itself.
    pub fn telemetry_node_id(&self) -> &str {
        match self.kind {
            ResourceKind::Group => self.writer_node_id.as_deref().unwrap_or(&self.identifier),
            ResourceKind::Single => &self.identifier,
        }
    }

    /// Pretty JSON dump for the outer presentation layer.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// One averaged telemetry value per metric over the look-back window.
///
/// `None` means the provider had no datapoints for that metric in the
/// window. Absence never blocks an admission decision by itself.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub utilization_percent: Option<f64>,
    pub free_memory_bytes: Option<f64>,
    pub read_iops: Option<f64>,
    pub write_iops: Option<f64>,
    pub connection_count: Option<f64>,
}

impl TelemetrySample {
    /// CPU utilization with absence treated as the most permissive value.
    pub fn cpu_or_zero(&self) -> f64 {
        self.utilization_percent.unwrap_or(0.0)
    }

    /// Free memory in GiB, if observed.
    pub fn free_memory_gib(&self) -> Option<f64> {
        self.free_memory_bytes.map(|b| b / GIB)
    }

    /// Connection count with absence treated as zero.
    pub fn connections_or_zero(&self) -> f64 {
        self.connection_count.unwrap_or(0.0)
    }
}

/// Lifecycle status of a blue/green deployment, as reported by the provider.
///
/// `Available` and `SwitchReady` are both accepted as the single canonical
/// "ready to cut over" signal — the provider reports either for a fully
/// provisioned parallel environment (an API quirk, not two domain states).
/// `SwitchoverFailed` and `Deleted` are terminal failures reachable from
/// any in-flight state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Provisioning,
    Available,
    SwitchReady,
    SwitchoverInProgress,
    SwitchoverCompleted,
    SwitchoverFailed,
    Deleted,
}

impl DeploymentStatus {
    /// Ready for an explicit cut-over command.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Available | Self::SwitchReady)
    }

    /// Terminal failure; no further transitions will be observed.
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, Self::SwitchoverFailed | Self::Deleted)
    }

    /// Any terminal state, success or failure.
    pub fn is_terminal(self) -> bool {
        self == Self::SwitchoverCompleted || self.is_terminal_failure()
    }

    /// The provider's wire form (SCREAMING_SNAKE).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "PROVISIONING",
            Self::Available => "AVAILABLE",
            Self::SwitchReady => "SWITCH_READY",
            Self::SwitchoverInProgress => "SWITCHOVER_IN_PROGRESS",
            Self::SwitchoverCompleted => "SWITCHOVER_COMPLETED",
            Self::SwitchoverFailed => "SWITCHOVER_FAILED",
            Self::Deleted => "DELETED",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping record for a blue/green deployment.
///
/// Owned exclusively by the provider; the orchestrator never holds an
/// authoritative copy and re-reads `status` before every decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployment_id: String,
    pub name: String,
    pub source_identifier: String,
    pub target_class: String,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// Pretty JSON dump for the outer presentation layer.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Status of a point-in-time backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Creating,
    Available,
}

/// Metadata for a point-in-time backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub snapshot_id: String,
    pub source_identifier: String,
    pub status: SnapshotStatus,
    pub percent_progress: u8,
    pub created_at: DateTime<Utc>,
}

/// A live resource retained from before a completed cut-over, named
/// `base_identifier + suffix`. Its class is the rollback target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OldResourceCandidate {
    pub kind: ResourceKind,
    pub identifier: String,
    pub instance_class: Option<String>,
}
