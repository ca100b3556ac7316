//! Scripted in-memory provider for tests.
//!
//! `FakeProvider` mirrors the control plane's observable behavior closely
//! enough to drive the poll-based state machines deterministically:
//!
//! - deployment statuses follow a per-deployment script, advanced one
//!   step per `describe_deployment` call; scripts can also be staged by
//!   source identifier before the deployment exists, for flows that
//!   create it internally;
//! - snapshots become visible after an optional lag (simulating the
//!   eventual-consistency gap right after create) and then progress
//!   0% → 50% → 100%/available across describes;
//! - deletions are observed absent only after a configurable number of
//!   describes, so "poll until absence" paths actually poll.
//!
//! All mutation is behind a `Mutex`; no lock is held across an await.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use chrono::Utc;

use switchyard_core::{
    DeploymentRecord, DeploymentStatus, SnapshotInfo, SnapshotStatus, TelemetrySample,
};

use crate::error::{ProviderError, ProviderResult};
use crate::{
    CreateDeploymentRequest, CreateSnapshotRequest, DeploymentProvider, GroupDescription,
    NodeDescription,
};

struct NodeSlot {
    desc: NodeDescription,
    /// Remaining describes before absence is observed, once deleted.
    deleting: Option<u32>,
}

struct GroupSlot {
    desc: GroupDescription,
    deleting: Option<u32>,
}

struct SnapshotSlot {
    info: SnapshotInfo,
    /// Describes still returning absence before the snapshot is visible.
    visible_in: u32,
    tags: Vec<(String, String)>,
}

struct DeploymentSlot {
    record: DeploymentRecord,
    /// Statuses to report on successive describes.
    script: VecDeque<DeploymentStatus>,
    deleting: Option<u32>,
    /// Describes still returning absence right after create.
    visible_in: u32,
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<String, NodeSlot>,
    groups: BTreeMap<String, GroupSlot>,
    snapshots: BTreeMap<String, SnapshotSlot>,
    deployments: BTreeMap<String, DeploymentSlot>,
    telemetry: HashMap<String, TelemetrySample>,
    /// (engine, version, storage_kind) -> classes; exact-match lookup.
    orderable: Vec<(OrderableFilter, Vec<String>)>,
    fail_node_deletes: HashSet<String>,
    /// Scripts queued by source for deployments not yet created.
    staged_scripts: HashMap<String, VecDeque<DeploymentStatus>>,
    /// Remaining describes per deployment that fail transiently.
    transient_describes: HashMap<String, u32>,
    next_deployment: u64,
    snapshot_visibility_lag: u32,
    deployment_visibility_lag: u32,
    delete_lag: u32,
    deletion_log: Vec<String>,
}

#[derive(PartialEq)]
struct OrderableFilter {
    engine: String,
    engine_version: Option<String>,
    storage_kind: Option<String>,
}

/// In-memory [`DeploymentProvider`] double.
#[derive(Default)]
pub struct FakeProvider {
    inner: Mutex<Inner>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("fake provider lock poisoned")
    }

    pub fn insert_node(&self, desc: NodeDescription) {
        self.lock().nodes.insert(
            desc.identifier.clone(),
            NodeSlot {
                desc,
                deleting: None,
            },
        );
    }

    pub fn insert_group(&self, desc: GroupDescription) {
        self.lock().groups.insert(
            desc.identifier.clone(),
            GroupSlot {
                desc,
                deleting: None,
            },
        );
    }

    pub fn insert_snapshot(&self, info: SnapshotInfo) {
        self.lock().snapshots.insert(
            info.snapshot_id.clone(),
            SnapshotSlot {
                info,
                visible_in: 0,
                tags: Vec::new(),
            },
        );
    }

    pub fn set_telemetry(&self, node_id: &str, sample: TelemetrySample) {
        self.lock().telemetry.insert(node_id.to_string(), sample);
    }

    pub fn set_orderable(
        &self,
        engine: &str,
        engine_version: Option<&str>,
        storage_kind: Option<&str>,
        classes: &[&str],
    ) {
        self.lock().orderable.push((
            OrderableFilter {
                engine: engine.to_string(),
                engine_version: engine_version.map(str::to_string),
                storage_kind: storage_kind.map(str::to_string),
            },
            classes.iter().map(|c| c.to_string()).collect(),
        ));
    }

    /// Set the statuses reported by successive describes of a deployment.
    pub fn script_deployment(&self, deployment_id: &str, statuses: &[DeploymentStatus]) {
        if let Some(slot) = self.lock().deployments.get_mut(deployment_id) {
            slot.script = statuses.iter().copied().collect();
        }
    }

    /// Queue the status script for the next deployment created from a
    /// source, for flows that create the deployment internally.
    pub fn stage_deployment_script(&self, source_identifier: &str, statuses: &[DeploymentStatus]) {
        self.lock().staged_scripts.insert(
            source_identifier.to_string(),
            statuses.iter().copied().collect(),
        );
    }

    /// Make the next `count` describes of a deployment fail transiently.
    pub fn fail_deployment_describes(&self, deployment_id: &str, count: u32) {
        self.lock()
            .transient_describes
            .insert(deployment_id.to_string(), count);
    }

    /// Number of describes that observe a snapshot as absent after create.
    pub fn set_snapshot_visibility_lag(&self, describes: u32) {
        self.lock().snapshot_visibility_lag = describes;
    }

    /// Number of describes that observe a deployment as absent after create.
    pub fn set_deployment_visibility_lag(&self, describes: u32) {
        self.lock().deployment_visibility_lag = describes;
    }

    /// Number of describes that still observe a deleted record/resource.
    pub fn set_delete_lag(&self, describes: u32) {
        self.lock().delete_lag = describes;
    }

    /// Make `delete_node` fail for the given identifier.
    pub fn fail_node_delete(&self, identifier: &str) {
        self.lock().fail_node_deletes.insert(identifier.to_string());
    }

    /// Current record without advancing its status script.
    pub fn peek_deployment(&self, deployment_id: &str) -> Option<DeploymentRecord> {
        self.lock()
            .deployments
            .get(deployment_id)
            .map(|s| s.record.clone())
    }

    /// Tags recorded on a snapshot create call.
    pub fn snapshot_tags(&self, snapshot_id: &str) -> Vec<(String, String)> {
        self.lock()
            .snapshots
            .get(snapshot_id)
            .map(|s| s.tags.clone())
            .unwrap_or_default()
    }

    /// Delete calls in the order they were issued, as `kind:identifier`.
    pub fn deletion_log(&self) -> Vec<String> {
        self.lock().deletion_log.clone()
    }
}

/// Convenience node fixture.
pub fn simple_node(identifier: &str, engine: &str, instance_class: &str) -> NodeDescription {
    NodeDescription {
        identifier: identifier.to_string(),
        engine: engine.to_string(),
        engine_version: "16.2".to_string(),
        instance_class: instance_class.to_string(),
        storage_gib: Some(100),
        storage_kind: Some("gp3".to_string()),
        endpoint: Some(switchyard_core::Endpoint {
            host: format!("{identifier}.db.internal"),
            port: 5432,
        }),
    }
}

impl DeploymentProvider for FakeProvider {
    async fn describe_node(&self, identifier: &str) -> ProviderResult<Option<NodeDescription>> {
        let mut inner = self.lock();
        let Some(slot) = inner.nodes.get_mut(identifier) else {
            return Ok(None);
        };
        match slot.deleting {
            Some(0) => {
                inner.nodes.remove(identifier);
                Ok(None)
            }
            Some(n) => {
                slot.deleting = Some(n - 1);
                Ok(Some(slot.desc.clone()))
            }
            None => Ok(Some(slot.desc.clone())),
        }
    }

    async fn describe_group(&self, identifier: &str) -> ProviderResult<Option<GroupDescription>> {
        let mut inner = self.lock();
        let Some(slot) = inner.groups.get_mut(identifier) else {
            return Ok(None);
        };
        match slot.deleting {
            Some(0) => {
                inner.groups.remove(identifier);
                Ok(None)
            }
            Some(n) => {
                slot.deleting = Some(n - 1);
                Ok(Some(slot.desc.clone()))
            }
            None => Ok(Some(slot.desc.clone())),
        }
    }

    async fn list_nodes(&self) -> ProviderResult<Vec<NodeDescription>> {
        Ok(self.lock().nodes.values().map(|s| s.desc.clone()).collect())
    }

    async fn list_groups(&self) -> ProviderResult<Vec<GroupDescription>> {
        Ok(self.lock().groups.values().map(|s| s.desc.clone()).collect())
    }

    async fn delete_node(&self, identifier: &str) -> ProviderResult<()> {
        let mut inner = self.lock();
        if inner.fail_node_deletes.contains(identifier) {
            return Err(ProviderError::Api(format!(
                "delete refused for node {identifier}"
            )));
        }
        let lag = inner.delete_lag;
        match inner.nodes.get_mut(identifier) {
            Some(slot) => {
                slot.deleting = Some(lag);
                inner.deletion_log.push(format!("node:{identifier}"));
                Ok(())
            }
            None => Err(ProviderError::NotFound(identifier.to_string())),
        }
    }

    async fn delete_group(&self, identifier: &str) -> ProviderResult<()> {
        let mut inner = self.lock();
        let lag = inner.delete_lag;
        match inner.groups.get_mut(identifier) {
            Some(slot) => {
                slot.deleting = Some(lag);
                inner.deletion_log.push(format!("group:{identifier}"));
                Ok(())
            }
            None => Err(ProviderError::NotFound(identifier.to_string())),
        }
    }

    async fn list_orderable_classes(
        &self,
        engine: &str,
        engine_version: Option<&str>,
        storage_kind: Option<&str>,
    ) -> ProviderResult<Vec<String>> {
        let wanted = OrderableFilter {
            engine: engine.to_string(),
            engine_version: engine_version.map(str::to_string),
            storage_kind: storage_kind.map(str::to_string),
        };
        Ok(self
            .lock()
            .orderable
            .iter()
            .find(|(filter, _)| *filter == wanted)
            .map(|(_, classes)| classes.clone())
            .unwrap_or_default())
    }

    async fn create_snapshot(&self, request: CreateSnapshotRequest) -> ProviderResult<()> {
        let mut inner = self.lock();
        if inner.snapshots.contains_key(&request.snapshot_id) {
            return Err(ProviderError::Api(format!(
                "snapshot already exists: {}",
                request.snapshot_id
            )));
        }
        let visible_in = inner.snapshot_visibility_lag;
        inner.snapshots.insert(
            request.snapshot_id.clone(),
            SnapshotSlot {
                info: SnapshotInfo {
                    snapshot_id: request.snapshot_id,
                    source_identifier: request.source_identifier,
                    status: SnapshotStatus::Creating,
                    percent_progress: 0,
                    created_at: Utc::now(),
                },
                visible_in,
                tags: request.tags,
            },
        );
        Ok(())
    }

    async fn describe_snapshot(&self, snapshot_id: &str) -> ProviderResult<Option<SnapshotInfo>> {
        let mut inner = self.lock();
        let Some(slot) = inner.snapshots.get_mut(snapshot_id) else {
            return Ok(None);
        };
        if slot.visible_in > 0 {
            slot.visible_in -= 1;
            return Ok(None);
        }
        let observed = slot.info.clone();
        if slot.info.status == SnapshotStatus::Creating {
            slot.info.percent_progress = (slot.info.percent_progress + 50).min(100);
            if slot.info.percent_progress == 100 {
                slot.info.status = SnapshotStatus::Available;
            }
        }
        Ok(Some(observed))
    }

    async fn list_snapshots(&self, source_identifier: &str) -> ProviderResult<Vec<SnapshotInfo>> {
        Ok(self
            .lock()
            .snapshots
            .values()
            .filter(|s| s.visible_in == 0 && s.info.source_identifier == source_identifier)
            .map(|s| s.info.clone())
            .collect())
    }

    async fn create_deployment(&self, request: CreateDeploymentRequest) -> ProviderResult<String> {
        let mut inner = self.lock();
        let duplicate = inner.deployments.values().any(|slot| {
            slot.record.source_identifier == request.source_identifier
                && slot.record.status != DeploymentStatus::Deleted
        });
        if duplicate {
            return Err(ProviderError::Conflict {
                identifier: request.source_identifier,
            });
        }
        inner.next_deployment += 1;
        let deployment_id = format!("bgd-{:04}", inner.next_deployment);
        let script = inner
            .staged_scripts
            .remove(&request.source_identifier)
            .unwrap_or_default();
        let visible_in = inner.deployment_visibility_lag;
        inner.deployments.insert(
            deployment_id.clone(),
            DeploymentSlot {
                record: DeploymentRecord {
                    deployment_id: deployment_id.clone(),
                    name: request.name,
                    source_identifier: request.source_identifier,
                    target_class: request.target_class,
                    status: DeploymentStatus::Provisioning,
                    created_at: Utc::now(),
                },
                script,
                deleting: None,
                visible_in,
            },
        );
        Ok(deployment_id)
    }

    async fn describe_deployment(
        &self,
        deployment_id: &str,
    ) -> ProviderResult<Option<DeploymentRecord>> {
        let mut inner = self.lock();
        if let Some(remaining) = inner.transient_describes.get_mut(deployment_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProviderError::Transient(format!(
                    "describe throttled for {deployment_id}"
                )));
            }
        }
        let Some(slot) = inner.deployments.get_mut(deployment_id) else {
            return Ok(None);
        };
        if slot.visible_in > 0 {
            slot.visible_in -= 1;
            return Ok(None);
        }
        match slot.deleting {
            Some(0) => {
                inner.deployments.remove(deployment_id);
                return Ok(None);
            }
            Some(n) => {
                slot.deleting = Some(n - 1);
                return Ok(Some(slot.record.clone()));
            }
            None => {}
        }
        if let Some(next) = slot.script.pop_front() {
            slot.record.status = next;
        }
        Ok(Some(slot.record.clone()))
    }

    async fn list_deployments(&self) -> ProviderResult<Vec<DeploymentRecord>> {
        Ok(self
            .lock()
            .deployments
            .values()
            .filter(|s| s.visible_in == 0)
            .map(|s| s.record.clone())
            .collect())
    }

    async fn switch_deployment(&self, deployment_id: &str) -> ProviderResult<()> {
        let mut inner = self.lock();
        let Some(slot) = inner.deployments.get_mut(deployment_id) else {
            return Err(ProviderError::NotFound(deployment_id.to_string()));
        };
        slot.record.status = DeploymentStatus::SwitchoverInProgress;
        if slot.script.is_empty() {
            slot.script.push_back(DeploymentStatus::SwitchoverCompleted);
        }
        Ok(())
    }

    async fn delete_deployment(&self, deployment_id: &str) -> ProviderResult<()> {
        let mut inner = self.lock();
        let lag = inner.delete_lag;
        match inner.deployments.get_mut(deployment_id) {
            Some(slot) => {
                slot.record.status = DeploymentStatus::Deleted;
                slot.script.clear();
                slot.deleting = Some(lag);
                inner
                    .deletion_log
                    .push(format!("deployment:{deployment_id}"));
                Ok(())
            }
            None => Err(ProviderError::NotFound(deployment_id.to_string())),
        }
    }

    async fn query_telemetry(
        &self,
        node_id: &str,
        _window_minutes: i64,
    ) -> ProviderResult<TelemetrySample> {
        // No datapoints in the window is represented by an empty sample.
        Ok(self
            .lock()
            .telemetry
            .get(node_id)
            .copied()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GroupMember;

    #[tokio::test]
    async fn deployment_script_advances_per_describe() {
        let fake = FakeProvider::new();
        let id = fake
            .create_deployment(CreateDeploymentRequest {
                name: "bg-orders".to_string(),
                source_identifier: "orders".to_string(),
                target_class: "db.t3.large".to_string(),
                tags: vec![],
            })
            .await
            .unwrap();
        fake.script_deployment(
            &id,
            &[DeploymentStatus::Provisioning, DeploymentStatus::SwitchReady],
        );

        let first = fake.describe_deployment(&id).await.unwrap().unwrap();
        assert_eq!(first.status, DeploymentStatus::Provisioning);
        let second = fake.describe_deployment(&id).await.unwrap().unwrap();
        assert_eq!(second.status, DeploymentStatus::SwitchReady);
        // Script exhausted: status sticks.
        let third = fake.describe_deployment(&id).await.unwrap().unwrap();
        assert_eq!(third.status, DeploymentStatus::SwitchReady);
    }

    #[tokio::test]
    async fn staged_script_attaches_to_the_next_create() {
        let fake = FakeProvider::new();
        fake.stage_deployment_script("orders", &[DeploymentStatus::SwitchReady]);
        let id = fake
            .create_deployment(CreateDeploymentRequest {
                name: "bg-orders".to_string(),
                source_identifier: "orders".to_string(),
                target_class: "db.t3.large".to_string(),
                tags: vec![],
            })
            .await
            .unwrap();
        let observed = fake.describe_deployment(&id).await.unwrap().unwrap();
        assert_eq!(observed.status, DeploymentStatus::SwitchReady);
    }

    #[tokio::test]
    async fn duplicate_source_conflicts() {
        let fake = FakeProvider::new();
        let request = CreateDeploymentRequest {
            name: "bg-orders".to_string(),
            source_identifier: "orders".to_string(),
            target_class: "db.t3.large".to_string(),
            tags: vec![],
        };
        fake.create_deployment(request.clone()).await.unwrap();
        let err = fake.create_deployment(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Conflict { .. }));
    }

    #[tokio::test]
    async fn snapshot_visibility_lag_then_progress() {
        let fake = FakeProvider::new();
        fake.set_snapshot_visibility_lag(1);
        fake.create_snapshot(CreateSnapshotRequest {
            snapshot_id: "orders-pre-change-x".to_string(),
            source_identifier: "orders".to_string(),
            source_kind: switchyard_core::ResourceKind::Single,
            tags: vec![("purpose".to_string(), "pre-change".to_string())],
        })
        .await
        .unwrap();

        // First describe hits the visibility gap.
        assert!(fake
            .describe_snapshot("orders-pre-change-x")
            .await
            .unwrap()
            .is_none());
        let s1 = fake
            .describe_snapshot("orders-pre-change-x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s1.percent_progress, 0);
        let s2 = fake
            .describe_snapshot("orders-pre-change-x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s2.percent_progress, 50);
        let s3 = fake
            .describe_snapshot("orders-pre-change-x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s3.status, SnapshotStatus::Available);
        assert_eq!(
            fake.snapshot_tags("orders-pre-change-x"),
            vec![("purpose".to_string(), "pre-change".to_string())]
        );
    }

    #[tokio::test]
    async fn delete_lag_keeps_records_visible() {
        let fake = FakeProvider::new();
        fake.set_delete_lag(1);
        fake.insert_node(simple_node("orders-old1", "postgres", "db.t3.medium"));

        fake.delete_node("orders-old1").await.unwrap();
        // Still observed once, then gone.
        assert!(fake.describe_node("orders-old1").await.unwrap().is_some());
        assert!(fake.describe_node("orders-old1").await.unwrap().is_none());
        assert_eq!(fake.deletion_log(), vec!["node:orders-old1"]);
    }

    #[tokio::test]
    async fn groups_round_trip() {
        let fake = FakeProvider::new();
        fake.insert_group(GroupDescription {
            identifier: "orders".to_string(),
            engine: "aurora-postgresql".to_string(),
            engine_version: "15.4".to_string(),
            members: vec![GroupMember {
                node_id: "orders-node-1".to_string(),
                is_writer: true,
            }],
            endpoint: None,
        });
        let group = fake.describe_group("orders").await.unwrap().unwrap();
        assert_eq!(group.members.len(), 1);
        assert!(fake.describe_group("missing").await.unwrap().is_none());
    }
}
