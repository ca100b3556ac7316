//! switchyard-provider — the seam to the cloud database control plane.
//!
//! Everything the orchestration engine knows about the outside world goes
//! through [`DeploymentProvider`]: describe/list for nodes and groups,
//! snapshot lifecycle, orderable-class listing, blue/green deployment
//! lifecycle, and telemetry queries. Concrete SDK-backed implementations
//! live outside this workspace; the [`fake::FakeProvider`] in-memory
//! double ships here so every crate can test against scripted provider
//! behavior.
//!
//! Describe methods return `Ok(None)` for absence — absence is data the
//! poll loops act on, not an error. `ProviderError::NotFound` is reserved
//! for mutating calls aimed at something that does not exist.

pub mod error;
pub mod fake;

use switchyard_core::{
    DeploymentRecord, Endpoint, ResourceKind, SnapshotInfo, TelemetrySample,
};

pub use error::{ProviderError, ProviderResult};

/// Raw provider view of a single database node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescription {
    pub identifier: String,
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    pub storage_gib: Option<u32>,
    pub storage_kind: Option<String>,
    pub endpoint: Option<Endpoint>,
}

/// Raw provider view of a replicated group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDescription {
    pub identifier: String,
    pub engine: String,
    pub engine_version: String,
    pub members: Vec<GroupMember>,
    pub endpoint: Option<Endpoint>,
}

/// One member of a replicated group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub node_id: String,
    pub is_writer: bool,
}

/// Request to create a point-in-time backup.
#[derive(Debug, Clone)]
pub struct CreateSnapshotRequest {
    pub snapshot_id: String,
    pub source_identifier: String,
    pub source_kind: ResourceKind,
    /// Provenance tags, e.g. `("purpose", "pre-change")`.
    pub tags: Vec<(String, String)>,
}

/// Request to create a blue/green deployment.
#[derive(Debug, Clone)]
pub struct CreateDeploymentRequest {
    pub name: String,
    pub source_identifier: String,
    pub target_class: String,
    pub tags: Vec<(String, String)>,
}

/// The cloud database control plane.
///
/// The provider is the sole source of truth for every record it owns;
/// callers re-query rather than caching. All methods are keyed by
/// caller-visible identifiers except deployments, which are keyed by the
/// provider-issued deployment id returned from [`create_deployment`].
///
/// [`create_deployment`]: DeploymentProvider::create_deployment
#[allow(async_fn_in_trait)]
pub trait DeploymentProvider: Send + Sync {
    // Resources.
    async fn describe_node(&self, identifier: &str) -> ProviderResult<Option<NodeDescription>>;
    async fn describe_group(&self, identifier: &str) -> ProviderResult<Option<GroupDescription>>;
    async fn list_nodes(&self) -> ProviderResult<Vec<NodeDescription>>;
    async fn list_groups(&self) -> ProviderResult<Vec<GroupDescription>>;
    async fn delete_node(&self, identifier: &str) -> ProviderResult<()>;
    async fn delete_group(&self, identifier: &str) -> ProviderResult<()>;

    /// Instance classes orderable for an engine, optionally narrowed by
    /// version and storage kind.
    async fn list_orderable_classes(
        &self,
        engine: &str,
        engine_version: Option<&str>,
        storage_kind: Option<&str>,
    ) -> ProviderResult<Vec<String>>;

    // Snapshots.
    async fn create_snapshot(&self, request: CreateSnapshotRequest) -> ProviderResult<()>;
    async fn describe_snapshot(&self, snapshot_id: &str) -> ProviderResult<Option<SnapshotInfo>>;
    async fn list_snapshots(&self, source_identifier: &str) -> ProviderResult<Vec<SnapshotInfo>>;

    // Blue/green deployments.
    async fn create_deployment(&self, request: CreateDeploymentRequest) -> ProviderResult<String>;
    async fn describe_deployment(
        &self,
        deployment_id: &str,
    ) -> ProviderResult<Option<DeploymentRecord>>;
    async fn list_deployments(&self) -> ProviderResult<Vec<DeploymentRecord>>;
    async fn switch_deployment(&self, deployment_id: &str) -> ProviderResult<()>;
    async fn delete_deployment(&self, deployment_id: &str) -> ProviderResult<()>;

    /// One averaged sample per metric over the trailing window.
    async fn query_telemetry(
        &self,
        node_id: &str,
        window_minutes: i64,
    ) -> ProviderResult<TelemetrySample>;
}
