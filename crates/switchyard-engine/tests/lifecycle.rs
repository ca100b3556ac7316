//! End-to-end class-change flows against the scripted fake provider.

use switchyard_core::{Config, DeploymentStatus, TelemetrySample, GIB};
use switchyard_engine::orchestrator::{ConflictChoice, CreateOutcome};
use switchyard_engine::rollback::RollbackOutcome;
use switchyard_engine::suitability::Classification;
use switchyard_engine::{
    estimate_provisioning_eta, CleanupCoordinator, HealthGate, Orchestrator, Resolver,
    RollbackCoordinator, SnapshotCoordinator, SuitabilityProjector,
};
use switchyard_provider::fake::{simple_node, FakeProvider};
use switchyard_provider::DeploymentProvider;

fn idle_telemetry() -> TelemetrySample {
    TelemetrySample {
        utilization_percent: Some(8.0),
        free_memory_bytes: Some(2.5 * GIB),
        connection_count: Some(3.0),
        ..TelemetrySample::default()
    }
}

/// The full forward path: admission, snapshot, deployment, cut-over,
/// verification, and cleanup of the retired side.
#[tokio::test(start_paused = true)]
async fn upgrade_flow_end_to_end() {
    let fake = FakeProvider::new();
    fake.insert_node(simple_node("billing", "postgres", "db.t3.medium"));
    fake.set_telemetry("billing", idle_telemetry());
    fake.set_orderable(
        "postgres",
        Some("16.2"),
        Some("gp3"),
        &["db.t3.medium", "db.t3.large", "db.m5.large"],
    );
    fake.set_snapshot_visibility_lag(1);
    let config = Config::default();

    // Resolve and validate the requested class.
    let resolver = Resolver::new(&fake, &config);
    let descriptor = resolver.resolve("billing").await.unwrap();
    assert_eq!(descriptor.instance_class, "db.t3.medium");
    resolver
        .validate_target_class(&descriptor, "db.t3.large")
        .await
        .unwrap();

    // Admission: health gate and projection both clear.
    let health = HealthGate::new(&fake, &config)
        .check(&descriptor)
        .await
        .unwrap();
    assert!(health.passed);
    let verdict = SuitabilityProjector::new(&config).project(
        &descriptor.instance_class,
        "db.t3.large",
        health.sample,
    );
    assert_eq!(verdict.classification, Classification::Suitable);

    // Informational estimate for a 100 GiB copy-based engine.
    assert_eq!(
        estimate_provisioning_eta(&descriptor.engine, descriptor.storage_gib),
        (10, 25)
    );

    // Safety snapshot before anything is mutated.
    let snapshot = SnapshotCoordinator::new(&fake, &config)
        .create_and_wait(&descriptor)
        .await
        .unwrap();
    assert!(snapshot.snapshot_id.starts_with("billing-pre-change-"));

    // Create the paired deployment and walk it to completion.
    let orchestrator = Orchestrator::new(&fake, &config);
    let CreateOutcome::Created(record) = orchestrator
        .create(&descriptor, "db.t3.large")
        .await
        .unwrap()
    else {
        panic!("unexpected conflict on a fresh source");
    };
    fake.script_deployment(
        &record.deployment_id,
        &[
            DeploymentStatus::Provisioning,
            DeploymentStatus::Provisioning,
            DeploymentStatus::SwitchReady,
        ],
    );
    assert!(orchestrator.await_ready(&record.deployment_id).await.unwrap());
    orchestrator.switch(&record.deployment_id).await.unwrap();

    // The control plane retires the old side under a suffixed name.
    fake.insert_node(simple_node("billing-old1", "postgres", "db.t3.medium"));
    let report = resolver.verify_endpoint("billing").await.unwrap();
    assert_eq!(report.identifier, "billing");

    // Retired side shows up as a cleanup candidate and can be removed
    // with confirmed absence.
    let cleanup = CleanupCoordinator::new(&fake, &config);
    let candidates = cleanup.find_old_resources().await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].identifier, "billing-old1");
    cleanup.delete_old_resource(&candidates[0]).await.unwrap();
    assert!(fake.describe_node("billing-old1").await.unwrap().is_none());
}

/// A conflicting deployment left over from an earlier run is replaced,
/// then the change proceeds.
#[tokio::test(start_paused = true)]
async fn conflicted_create_recovers_by_recreating() {
    let fake = FakeProvider::new();
    fake.insert_node(simple_node("billing", "postgres", "db.t3.medium"));
    let config = Config::default();
    let orchestrator = Orchestrator::new(&fake, &config);
    let descriptor = Resolver::new(&fake, &config)
        .resolve("billing")
        .await
        .unwrap();

    let CreateOutcome::Created(_) = orchestrator
        .create(&descriptor, "db.m5.large")
        .await
        .unwrap()
    else {
        panic!("first create should succeed");
    };
    let CreateOutcome::Conflict(existing) = orchestrator
        .create(&descriptor, "db.t3.large")
        .await
        .unwrap()
    else {
        panic!("second create should conflict");
    };

    let record = orchestrator
        .resolve_conflict(
            &descriptor,
            "db.t3.large",
            existing,
            ConflictChoice::DeleteAndRecreate,
        )
        .await
        .unwrap();
    fake.script_deployment(&record.deployment_id, &[DeploymentStatus::SwitchReady]);
    assert!(orchestrator.await_ready(&record.deployment_id).await.unwrap());
    orchestrator.switch(&record.deployment_id).await.unwrap();
}

/// Rolling back after a completed change recreates the previous class by
/// running the same forward machinery in the opposite direction.
#[tokio::test(start_paused = true)]
async fn rollback_after_change() {
    let fake = FakeProvider::new();
    // State after a completed upgrade: live node on the new class, the
    // old side retired with a suffix.
    fake.insert_node(simple_node("billing", "postgres", "db.m5.xlarge"));
    fake.insert_node(simple_node("billing-old1", "postgres", "db.m5.large"));
    fake.set_telemetry(
        "billing",
        TelemetrySample {
            utilization_percent: Some(10.0),
            free_memory_bytes: Some(12.0 * GIB),
            connection_count: Some(1.0),
            ..TelemetrySample::default()
        },
    );
    // The rollback creates its deployment internally; stage the status
    // progression by source.
    fake.stage_deployment_script(
        "billing",
        &[DeploymentStatus::Provisioning, DeploymentStatus::SwitchReady],
    );
    let config = Config::default();

    let outcome = RollbackCoordinator::new(&fake, &config)
        .rollback("billing")
        .await
        .unwrap();
    let RollbackOutcome::Completed {
        deployment_id,
        restored_class,
    } = outcome
    else {
        panic!("expected completed rollback, got {outcome:?}");
    };
    assert_eq!(restored_class, "db.m5.large");
    let record = fake.peek_deployment(&deployment_id).unwrap();
    assert_eq!(record.status, DeploymentStatus::SwitchoverCompleted);
}
