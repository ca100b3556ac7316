//! Pre-change snapshot creation.
//!
//! A safety snapshot is taken before any deployment is created and the
//! flow blocks until the control plane reports it available. Right after
//! create the snapshot may not be visible to describes yet; that gap and
//! transient API errors are both treated as "keep polling".

use std::cell::Cell;

use chrono::Utc;
use tracing::{info, warn};

use switchyard_core::{Config, ResourceDescriptor, SnapshotInfo, SnapshotStatus};
use switchyard_provider::{CreateSnapshotRequest, DeploymentProvider, ProviderError};

use crate::error::EngineResult;
use crate::poll::{poll_until, PollOutcome};

pub struct SnapshotCoordinator<'a, P> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: DeploymentProvider> SnapshotCoordinator<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// The timestamped snapshot identifier for a source.
    pub fn snapshot_id(&self, identifier: &str) -> String {
        format!(
            "{identifier}-{}-{}",
            self.config.snapshot_infix,
            Utc::now().format("%Y%m%d-%H%M%S")
        )
    }

    /// Create a snapshot of the descriptor's source and wait until it is
    /// available. There is no timeout here: abandoning a half-made
    /// snapshot and proceeding would defeat its purpose.
    pub async fn create_and_wait(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> EngineResult<SnapshotInfo> {
        let snapshot_id = self.snapshot_id(&descriptor.identifier);
        info!(
            identifier = %descriptor.identifier,
            snapshot = %snapshot_id,
            "creating pre-change snapshot"
        );
        self.provider
            .create_snapshot(CreateSnapshotRequest {
                snapshot_id: snapshot_id.clone(),
                source_identifier: descriptor.identifier.clone(),
                source_kind: descriptor.kind,
                tags: vec![(
                    "purpose".to_string(),
                    self.config.snapshot_infix.clone(),
                )],
            })
            .await?;

        let last_progress = Cell::new(-1i64);
        let info = poll_until(self.config.poll.snapshot_interval(), None, || {
            let last_progress = &last_progress;
            let snapshot_id = snapshot_id.as_str();
            let provider = self.provider;
            async move {
                let info = match provider.describe_snapshot(snapshot_id).await {
                    Ok(Some(info)) => info,
                    // Not visible yet, or a blip; both resolve themselves.
                    Ok(None) => return Ok(PollOutcome::Pending),
                    Err(ProviderError::Transient(message)) => {
                        warn!(snapshot = %snapshot_id, %message, "transient error while polling snapshot");
                        return Ok(PollOutcome::Pending);
                    }
                    Err(error) => return Err(crate::error::EngineError::from(error)),
                };
                let progress = i64::from(info.percent_progress);
                if progress != last_progress.get() {
                    last_progress.set(progress);
                    info!(snapshot = %snapshot_id, percent = progress, "snapshot progress");
                }
                if info.status == SnapshotStatus::Available {
                    Ok(PollOutcome::Ready(info))
                } else {
                    Ok(PollOutcome::Pending)
                }
            }
        })
        .await?;

        // Unreachable-None: no timeout was given.
        let info = info.ok_or_else(|| {
            crate::error::EngineError::NotFound(snapshot_id.clone())
        })?;
        info!(snapshot = %info.snapshot_id, "snapshot available");
        Ok(info)
    }
}
