//! Rollback to the previous instance class.
//!
//! Rolling back is not a special mechanism: it is the forward flow run
//! in the opposite direction, targeting whatever class the retired
//! resource still advertises. The retired resource is located by the
//! naming convention the control plane applies after a cut-over (the old
//! side keeps the base name plus a suffix like `-old1`). When nothing
//! retired can be found, the best we can offer is a pointer to the most
//! recent pre-change snapshot; restoring from it is an operator decision,
//! never automatic.

use tracing::{info, warn};

use switchyard_core::{Config, DeploymentRecord, ResourceDescriptor, SnapshotInfo};
use switchyard_provider::DeploymentProvider;

use crate::error::{EngineError, EngineResult};
use crate::eta::estimate_provisioning_eta;
use crate::health::HealthGate;
use crate::orchestrator::{CreateOutcome, Orchestrator};
use crate::resolver::Resolver;
use crate::suitability::SuitabilityProjector;

/// How a rollback attempt ended.
#[derive(Debug)]
pub enum RollbackOutcome {
    Completed {
        deployment_id: String,
        restored_class: String,
    },
    /// Admission or projection refused the change; reasons listed.
    Blocked(Vec<String>),
    /// A deployment already exists for this source.
    Conflict(Vec<DeploymentRecord>),
    /// The deployment never became switch-ready.
    NotReady { deployment_id: String },
    /// No retired resource was found to read the previous class from.
    /// If a pre-change snapshot exists it is returned for a manual
    /// restore; nothing is restored automatically.
    SnapshotPointer(Option<SnapshotInfo>),
}

pub struct RollbackCoordinator<'a, P> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: DeploymentProvider> RollbackCoordinator<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// Strip a retirement suffix if the operator passed the old side's
    /// name instead of the live one.
    pub fn base_identifier<'s>(&self, identifier: &'s str) -> &'s str {
        for suffix in &self.config.old_suffixes {
            if let Some(base) = identifier.strip_suffix(suffix.as_str()) {
                if !base.is_empty() {
                    return base;
                }
            }
        }
        identifier
    }

    /// Locate the retired counterpart of `base`, highest-priority suffix
    /// first. Resolving through the normal path also recovers the class
    /// of a retired group via its writer.
    pub async fn find_old_resource(
        &self,
        base: &str,
    ) -> EngineResult<Option<ResourceDescriptor>> {
        let resolver = Resolver::new(self.provider, self.config);
        for suffix in &self.config.old_suffixes {
            let candidate = format!("{base}{suffix}");
            match resolver.resolve(&candidate).await {
                Ok(descriptor) => return Ok(Some(descriptor)),
                Err(EngineError::NotFound(_)) => continue,
                Err(error) => return Err(error),
            }
        }
        Ok(None)
    }

    /// Most recent pre-change snapshot taken for `base`, if any.
    pub async fn latest_pre_change_snapshot(
        &self,
        base: &str,
    ) -> EngineResult<Option<SnapshotInfo>> {
        let prefix = format!("{base}-{}-", self.config.snapshot_infix);
        Ok(self
            .provider
            .list_snapshots(base)
            .await?
            .into_iter()
            .filter(|snapshot| snapshot.snapshot_id.starts_with(&prefix))
            .max_by_key(|snapshot| snapshot.created_at))
    }

    /// Roll `identifier` back to the class its retired counterpart runs.
    pub async fn rollback(&self, identifier: &str) -> EngineResult<RollbackOutcome> {
        let base = self.base_identifier(identifier);
        let resolver = Resolver::new(self.provider, self.config);
        let current = resolver.resolve(base).await?;

        let Some(old) = self.find_old_resource(base).await? else {
            let snapshot = self.latest_pre_change_snapshot(base).await?;
            match &snapshot {
                Some(snapshot) => warn!(
                    identifier = %base,
                    snapshot = %snapshot.snapshot_id,
                    "no retired resource found; a pre-change snapshot exists for manual restore"
                ),
                None => warn!(
                    identifier = %base,
                    "no retired resource and no pre-change snapshot; nothing to roll back to"
                ),
            }
            return Ok(RollbackOutcome::SnapshotPointer(snapshot));
        };
        info!(
            identifier = %base,
            old = %old.identifier,
            restore_class = %old.instance_class,
            "found retired counterpart"
        );

        let gate = HealthGate::new(self.provider, self.config);
        let health = gate.check(&current).await?;
        if !health.passed {
            return Ok(RollbackOutcome::Blocked(health.reasons));
        }
        let verdict = SuitabilityProjector::new(self.config).project(
            &current.instance_class,
            &old.instance_class,
            health.sample,
        );
        if verdict.blocks() {
            return Ok(RollbackOutcome::Blocked(verdict.reasons));
        }

        let (typical, worst) = estimate_provisioning_eta(&current.engine, current.storage_gib);
        info!(
            identifier = %base,
            eta_typical_minutes = typical,
            eta_worst_minutes = worst,
            "starting rollback deployment"
        );

        let orchestrator = Orchestrator::new(self.provider, self.config);
        let record = match orchestrator.create(&current, &old.instance_class).await? {
            CreateOutcome::Created(record) => record,
            CreateOutcome::Conflict(existing) => {
                return Ok(RollbackOutcome::Conflict(existing));
            }
        };
        if !orchestrator.await_ready(&record.deployment_id).await? {
            return Ok(RollbackOutcome::NotReady {
                deployment_id: record.deployment_id,
            });
        }
        orchestrator.switch(&record.deployment_id).await?;
        resolver.verify_endpoint(base).await?;

        // Post-check: informational only, the switchover already happened.
        let after = resolver.resolve(base).await?;
        let post = gate.check(&after).await?;
        if !post.passed {
            warn!(
                identifier = %base,
                reasons = post.reasons.join("; "),
                "post-rollback health check reports pressure"
            );
        }

        Ok(RollbackOutcome::Completed {
            deployment_id: record.deployment_id,
            restored_class: old.instance_class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use switchyard_core::{DeploymentStatus, SnapshotStatus, TelemetrySample, GIB};
    use switchyard_provider::fake::{simple_node, FakeProvider};

    fn idle(node_id: &str, fake: &FakeProvider) {
        fake.set_telemetry(
            node_id,
            TelemetrySample {
                utilization_percent: Some(5.0),
                free_memory_bytes: Some(6.0 * GIB),
                ..TelemetrySample::default()
            },
        );
    }

    #[test]
    fn base_identifier_strips_highest_priority_suffix() {
        let config = Config::default();
        let fake = FakeProvider::new();
        let coordinator = RollbackCoordinator::new(&fake, &config);
        assert_eq!(coordinator.base_identifier("billing-old1"), "billing");
        assert_eq!(coordinator.base_identifier("billing-blue"), "billing");
        assert_eq!(coordinator.base_identifier("billing"), "billing");
        // A bare suffix is not a base name.
        assert_eq!(coordinator.base_identifier("-old"), "-old");
    }

    #[tokio::test]
    async fn finds_retired_counterpart_in_priority_order() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing-old2", "postgres", "db.t3.small"));
        fake.insert_node(simple_node("billing-old1", "postgres", "db.t3.medium"));
        let config = Config::default();

        let old = RollbackCoordinator::new(&fake, &config)
            .find_old_resource("billing")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old.identifier, "billing-old1");
        assert_eq!(old.instance_class, "db.t3.medium");
    }

    #[tokio::test]
    async fn latest_snapshot_wins() {
        let fake = FakeProvider::new();
        let now = Utc::now();
        for (suffix, age_hours) in [("a", 5), ("b", 1), ("c", 9)] {
            fake.insert_snapshot(SnapshotInfo {
                snapshot_id: format!("billing-pre-change-{suffix}"),
                source_identifier: "billing".to_string(),
                status: SnapshotStatus::Available,
                percent_progress: 100,
                created_at: now - ChronoDuration::hours(age_hours),
            });
        }
        // An unrelated snapshot of the same source is ignored.
        fake.insert_snapshot(SnapshotInfo {
            snapshot_id: "billing-nightly-x".to_string(),
            source_identifier: "billing".to_string(),
            status: SnapshotStatus::Available,
            percent_progress: 100,
            created_at: now,
        });
        let config = Config::default();

        let latest = RollbackCoordinator::new(&fake, &config)
            .latest_pre_change_snapshot("billing")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.snapshot_id, "billing-pre-change-b");
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_restores_the_previous_class() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.large"));
        fake.insert_node(simple_node("billing-old1", "postgres", "db.t3.medium"));
        idle("billing", &fake);
        fake.stage_deployment_script(
            "billing",
            &[DeploymentStatus::Provisioning, DeploymentStatus::SwitchReady],
        );
        let config = Config::default();

        let outcome = RollbackCoordinator::new(&fake, &config)
            .rollback("billing")
            .await
            .unwrap();
        let RollbackOutcome::Completed { restored_class, .. } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(restored_class, "db.t3.medium");
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_accepts_the_retired_name() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.large"));
        fake.insert_node(simple_node("billing-old1", "postgres", "db.t3.medium"));
        idle("billing", &fake);
        fake.stage_deployment_script("billing", &[DeploymentStatus::SwitchReady]);
        let config = Config::default();

        let outcome = RollbackCoordinator::new(&fake, &config)
            .rollback("billing-old1")
            .await
            .unwrap();
        assert!(matches!(outcome, RollbackOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn busy_writer_blocks_rollback() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.large"));
        fake.insert_node(simple_node("billing-old1", "postgres", "db.t3.medium"));
        fake.set_telemetry(
            "billing",
            TelemetrySample {
                utilization_percent: Some(75.0),
                free_memory_bytes: Some(3.0 * GIB),
                connection_count: Some(20.0),
                ..TelemetrySample::default()
            },
        );
        let config = Config::default();

        let outcome = RollbackCoordinator::new(&fake, &config)
            .rollback("billing")
            .await
            .unwrap();
        let RollbackOutcome::Blocked(reasons) = outcome else {
            panic!("expected blocked, got {outcome:?}");
        };
        assert!(reasons[0].contains("cpu"));
    }

    #[tokio::test]
    async fn missing_old_resource_points_at_snapshot() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.large"));
        fake.insert_snapshot(SnapshotInfo {
            snapshot_id: "billing-pre-change-20260830".to_string(),
            source_identifier: "billing".to_string(),
            status: SnapshotStatus::Available,
            percent_progress: 100,
            created_at: Utc::now(),
        });
        idle("billing", &fake);
        let config = Config::default();

        let outcome = RollbackCoordinator::new(&fake, &config)
            .rollback("billing")
            .await
            .unwrap();
        let RollbackOutcome::SnapshotPointer(Some(snapshot)) = outcome else {
            panic!("expected snapshot pointer, got {outcome:?}");
        };
        assert_eq!(snapshot.snapshot_id, "billing-pre-change-20260830");
        // Nothing was created or restored.
        assert!(fake.deletion_log().is_empty());
        assert!(fake.describe_node("billing").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn nothing_to_roll_back_to() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.large"));
        idle("billing", &fake);
        let config = Config::default();

        let outcome = RollbackCoordinator::new(&fake, &config)
            .rollback("billing")
            .await
            .unwrap();
        assert!(matches!(outcome, RollbackOutcome::SnapshotPointer(None)));
    }
}
