//! Deployment lifecycle driver.
//!
//! Owns the forward path of a class change once admission has passed:
//! create the paired deployment, wait for it to become switch-ready,
//! trigger the cut-over, and wait for completion. Every decision is made
//! on a fresh describe; the state machine is
//!
//! ```text
//!   PROVISIONING ──> ready (AVAILABLE | SWITCH_READY)
//!        │                     │ switch
//!        │                     v
//!        │           SWITCHOVER_IN_PROGRESS ──> SWITCHOVER_COMPLETED
//!        │                     │
//!        └──── failure ────────┴──> SWITCHOVER_FAILED | DELETED
//! ```
//!
//! Failure states are latched: once observed, the flow stops even if a
//! later describe were to show something else.

use std::cell::{Cell, RefCell};

use chrono::Utc;
use tracing::{info, warn};

use switchyard_core::{Config, DeploymentRecord, DeploymentStatus, ResourceDescriptor};
use switchyard_provider::{CreateDeploymentRequest, DeploymentProvider, ProviderError};

use crate::cleanup::CleanupCoordinator;
use crate::error::{EngineError, EngineResult};
use crate::poll::{poll_until, PollOutcome};

/// Result of attempting to create a deployment.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(DeploymentRecord),
    /// A live deployment already exists for this source; the records are
    /// handed back so the operator can decide what to do with them.
    Conflict(Vec<DeploymentRecord>),
}

/// Operator decision when [`CreateOutcome::Conflict`] comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    UseExisting,
    DeleteAndRecreate,
}

pub struct Orchestrator<'a, P> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: DeploymentProvider> Orchestrator<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// Create a paired deployment moving `descriptor` to `target_class`.
    ///
    /// A provider conflict is not an error: the existing records are
    /// returned for an explicit [`ConflictChoice`].
    pub async fn create(
        &self,
        descriptor: &ResourceDescriptor,
        target_class: &str,
    ) -> EngineResult<CreateOutcome> {
        let name = format!(
            "{}{}-{}",
            self.config.deployment_prefix,
            descriptor.identifier,
            Utc::now().format("%Y%m%d-%H%M%S")
        );
        let request = CreateDeploymentRequest {
            name,
            source_identifier: descriptor.identifier.clone(),
            target_class: target_class.to_string(),
            tags: vec![("purpose".to_string(), "class-change".to_string())],
        };
        match self.provider.create_deployment(request).await {
            Ok(deployment_id) => {
                let record = self.confirm_created(&deployment_id).await?;
                info!(
                    deployment = %record.deployment_id,
                    source = %record.source_identifier,
                    target = %record.target_class,
                    "deployment created"
                );
                Ok(CreateOutcome::Created(record))
            }
            Err(ProviderError::Conflict { identifier }) => {
                let existing = self.find_for_source(&identifier).await?;
                warn!(
                    source = %identifier,
                    count = existing.len(),
                    "deployment already exists for source"
                );
                Ok(CreateOutcome::Conflict(existing))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Fetch the record for a just-created deployment. Right after the
    /// create call returns, describes may still observe absence; that
    /// gap and transient errors both resolve themselves.
    async fn confirm_created(&self, deployment_id: &str) -> EngineResult<DeploymentRecord> {
        let record = poll_until(self.config.poll.switch_interval(), None, || {
            let provider = self.provider;
            async move {
                match provider.describe_deployment(deployment_id).await {
                    Ok(Some(record)) => Ok(PollOutcome::Ready(record)),
                    Ok(None) => Ok(PollOutcome::Pending),
                    Err(ProviderError::Transient(message)) => {
                        warn!(deployment = %deployment_id, %message, "transient error while confirming create");
                        Ok(PollOutcome::Pending)
                    }
                    Err(error) => Err(EngineError::from(error)),
                }
            }
        })
        .await?;
        // Unreachable-None: no timeout was given.
        record.ok_or_else(|| EngineError::DeploymentNotFound(deployment_id.to_string()))
    }

    /// Live (non-deleted) deployments whose source is `source`.
    pub async fn find_for_source(&self, source: &str) -> EngineResult<Vec<DeploymentRecord>> {
        Ok(self
            .provider
            .list_deployments()
            .await?
            .into_iter()
            .filter(|record| {
                record.source_identifier == source && record.status != DeploymentStatus::Deleted
            })
            .collect())
    }

    /// Apply the operator's choice for a create conflict.
    ///
    /// `DeleteAndRecreate` confirms each stale record is gone before
    /// retrying; a second conflict after that is a real error.
    pub async fn resolve_conflict(
        &self,
        descriptor: &ResourceDescriptor,
        target_class: &str,
        existing: Vec<DeploymentRecord>,
        choice: ConflictChoice,
    ) -> EngineResult<DeploymentRecord> {
        match choice {
            ConflictChoice::UseExisting => existing.into_iter().next().ok_or_else(|| {
                EngineError::DeploymentNotFound(descriptor.identifier.clone())
            }),
            ConflictChoice::DeleteAndRecreate => {
                let cleanup = CleanupCoordinator::new(self.provider, self.config);
                for record in &existing {
                    cleanup
                        .delete_deployment_record(&record.deployment_id)
                        .await?;
                }
                match self.create(descriptor, target_class).await? {
                    CreateOutcome::Created(record) => Ok(record),
                    CreateOutcome::Conflict(_) => Err(EngineError::Provider(
                        ProviderError::Conflict {
                            identifier: descriptor.identifier.clone(),
                        },
                    )),
                }
            }
        }
    }

    /// Wait until the deployment is ready to switch.
    ///
    /// `true` means ready. `false` covers everything that is not:
    /// terminal failure, an already-completed switchover, the record
    /// disappearing, or the readiness timeout. None of those are `Err`;
    /// callers must branch on the return value.
    pub async fn await_ready(&self, deployment_id: &str) -> EngineResult<bool> {
        let (ready, _) = self.await_ready_inner(deployment_id).await?;
        Ok(ready)
    }

    async fn await_ready_inner(
        &self,
        deployment_id: &str,
    ) -> EngineResult<(bool, Vec<DeploymentStatus>)> {
        let last: Cell<Option<DeploymentStatus>> = Cell::new(None);
        let transitions: RefCell<Vec<DeploymentStatus>> = RefCell::new(Vec::new());

        let outcome = poll_until(
            self.config.poll.ready_interval(),
            Some(self.config.poll.ready_timeout()),
            || {
                let last = &last;
                let transitions = &transitions;
                let provider = self.provider;
                async move {
                    let record = match provider.describe_deployment(deployment_id).await {
                        Ok(Some(record)) => record,
                        Ok(None) => {
                            warn!(deployment = %deployment_id, "deployment disappeared while waiting");
                            return Ok(PollOutcome::Ready(false));
                        }
                        Err(ProviderError::Transient(message)) => {
                            warn!(deployment = %deployment_id, %message, "transient error while polling readiness");
                            return Ok(PollOutcome::Pending);
                        }
                        Err(error) => return Err(EngineError::from(error)),
                    };
                    if last.get() != Some(record.status) {
                        last.set(Some(record.status));
                        transitions.borrow_mut().push(record.status);
                        info!(
                            deployment = %deployment_id,
                            status = %record.status,
                            "deployment status"
                        );
                    }
                    if record.status.is_ready() {
                        Ok(PollOutcome::Ready(true))
                    } else if record.status.is_terminal() {
                        warn!(
                            deployment = %deployment_id,
                            status = %record.status,
                            "deployment will not become ready"
                        );
                        Ok(PollOutcome::Ready(false))
                    } else {
                        Ok(PollOutcome::Pending)
                    }
                }
            },
        )
        .await?;

        let ready = match outcome {
            Some(ready) => ready,
            None => {
                warn!(
                    deployment = %deployment_id,
                    timeout_minutes = self.config.poll.ready_timeout_minutes,
                    "timed out waiting for readiness"
                );
                false
            }
        };
        Ok((ready, transitions.into_inner()))
    }

    /// Trigger the cut-over and wait until it completes.
    ///
    /// No timeout: once a switchover is in flight, walking away from it
    /// is worse than waiting. A terminal failure status is an error here,
    /// unlike in [`Self::await_ready`], because the source may already
    /// have been renamed out from under its identifier.
    pub async fn switch(&self, deployment_id: &str) -> EngineResult<()> {
        info!(deployment = %deployment_id, "starting switchover");
        self.provider.switch_deployment(deployment_id).await?;

        poll_until(self.config.poll.switch_interval(), None, || {
            let provider = self.provider;
            async move {
                let record = match provider.describe_deployment(deployment_id).await {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        return Err(EngineError::DeploymentNotFound(deployment_id.to_string()));
                    }
                    Err(ProviderError::Transient(message)) => {
                        warn!(deployment = %deployment_id, %message, "transient error while polling switchover");
                        return Ok(PollOutcome::Pending);
                    }
                    Err(error) => return Err(EngineError::from(error)),
                };
                match record.status {
                    DeploymentStatus::SwitchoverCompleted => Ok(PollOutcome::Ready(())),
                    status if status.is_terminal_failure() => Err(EngineError::SwitchoverFailed {
                        deployment_id: deployment_id.to_string(),
                        status,
                    }),
                    _ => Ok(PollOutcome::Pending),
                }
            }
        })
        .await?;

        info!(deployment = %deployment_id, "switchover completed");
        Ok(())
    }
}
