//! switchyard-core — shared domain model for blue/green instance-class changes.
//!
//! Holds the types that cross crate boundaries: resource descriptors,
//! telemetry samples, deployment records and their status set, snapshot
//! metadata, and the immutable [`Config`] value that every component
//! receives at construction.
//!
//! Nothing in this crate talks to a provider or sleeps. The state that
//! matters (deployment status, snapshot progress) is owned by the cloud
//! control plane and is re-read on every decision; these types are just
//! the normalized snapshots of what a single read observed.

pub mod classes;
pub mod config;
pub mod types;

pub use classes::{ClassTable, InstanceClassSpec};
pub use config::{Config, PollConfig, Thresholds};
pub use types::{
    DeploymentRecord, DeploymentStatus, Endpoint, OldResourceCandidate, ResourceDescriptor,
    ResourceKind, SnapshotInfo, SnapshotStatus, TelemetrySample, GIB,
};
