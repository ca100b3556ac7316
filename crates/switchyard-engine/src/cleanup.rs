//! Deletion with confirmed absence.
//!
//! Control-plane deletes are asynchronous: the call returning success
//! only means the delete was accepted. Every delete here is followed by
//! polling until a describe observes the resource gone, so callers can
//! rely on the name being free afterwards (re-creating a deployment for
//! the same source, re-using an identifier).

use tracing::{info, warn};

use switchyard_core::{Config, OldResourceCandidate, ResourceKind};
use switchyard_provider::{DeploymentProvider, ProviderError};

use crate::error::{EngineError, EngineResult};
use crate::poll::{poll_until, PollOutcome};

pub struct CleanupCoordinator<'a, P> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: DeploymentProvider> CleanupCoordinator<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// Delete a deployment record and wait until describes no longer see
    /// it. The record must be gone before another deployment can be
    /// created for the same source.
    pub async fn delete_deployment_record(&self, deployment_id: &str) -> EngineResult<()> {
        info!(deployment = %deployment_id, "deleting deployment record");
        self.provider.delete_deployment(deployment_id).await?;
        self.wait_absent(deployment_id, WaitKind::Deployment).await?;
        info!(deployment = %deployment_id, "deployment record gone");
        Ok(())
    }

    /// Scan all live resources for names ending in a retired suffix.
    ///
    /// Candidates come back grouped by suffix in the configured priority
    /// order, so the most recently retired generation is offered first.
    pub async fn find_old_resources(&self) -> EngineResult<Vec<OldResourceCandidate>> {
        let nodes = self.provider.list_nodes().await?;
        let groups = self.provider.list_groups().await?;
        let mut candidates = Vec::new();
        for suffix in &self.config.old_suffixes {
            for node in &nodes {
                if node.identifier.ends_with(suffix.as_str()) {
                    candidates.push(OldResourceCandidate {
                        kind: ResourceKind::Single,
                        identifier: node.identifier.clone(),
                        instance_class: Some(node.instance_class.clone()),
                    });
                }
            }
            for group in &groups {
                if group.identifier.ends_with(suffix.as_str()) {
                    candidates.push(OldResourceCandidate {
                        kind: ResourceKind::Group,
                        identifier: group.identifier.clone(),
                        instance_class: None,
                    });
                }
            }
        }
        candidates.dedup_by(|a, b| a.identifier == b.identifier && a.kind == b.kind);
        Ok(candidates)
    }

    /// Delete a leftover resource and wait for confirmed absence.
    ///
    /// Groups go member-first: each member delete is best-effort (a
    /// refused member is logged and skipped), then the group itself is
    /// deleted and awaited. Ordering matters because some control planes
    /// refuse to delete a group that still has members.
    pub async fn delete_old_resource(
        &self,
        candidate: &OldResourceCandidate,
    ) -> EngineResult<()> {
        match candidate.kind {
            ResourceKind::Single => {
                info!(identifier = %candidate.identifier, "deleting old node");
                self.provider.delete_node(&candidate.identifier).await?;
                self.wait_absent(&candidate.identifier, WaitKind::Node)
                    .await?;
            }
            ResourceKind::Group => {
                let group = self
                    .provider
                    .describe_group(&candidate.identifier)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(candidate.identifier.clone()))?;
                for member in &group.members {
                    info!(
                        group = %candidate.identifier,
                        node = %member.node_id,
                        "deleting group member"
                    );
                    match self.provider.delete_node(&member.node_id).await {
                        Ok(()) => {
                            self.wait_absent(&member.node_id, WaitKind::Node).await?;
                        }
                        Err(error) => {
                            warn!(node = %member.node_id, %error, "member delete failed, continuing");
                        }
                    }
                }
                info!(identifier = %candidate.identifier, "deleting old group");
                self.provider.delete_group(&candidate.identifier).await?;
                self.wait_absent(&candidate.identifier, WaitKind::Group)
                    .await?;
            }
        }
        info!(identifier = %candidate.identifier, "old resource gone");
        Ok(())
    }

    async fn wait_absent(&self, identifier: &str, kind: WaitKind) -> EngineResult<()> {
        let interval = match kind {
            WaitKind::Deployment => self.config.poll.record_delete_interval(),
            WaitKind::Node => self.config.poll.node_delete_interval(),
            WaitKind::Group => self.config.poll.group_delete_interval(),
        };
        poll_until(interval, None, || {
            let provider = self.provider;
            async move {
                let observed = match kind {
                    WaitKind::Deployment => provider
                        .describe_deployment(identifier)
                        .await
                        .map(|r| r.is_some()),
                    WaitKind::Node => provider.describe_node(identifier).await.map(|r| r.is_some()),
                    WaitKind::Group => {
                        provider.describe_group(identifier).await.map(|r| r.is_some())
                    }
                };
                match observed {
                    Ok(true) => Ok(PollOutcome::Pending),
                    Ok(false) => Ok(PollOutcome::Ready(())),
                    Err(ProviderError::Transient(message)) => {
                        warn!(identifier = %identifier, %message, "transient error while confirming deletion");
                        Ok(PollOutcome::Pending)
                    }
                    Err(error) => Err(EngineError::from(error)),
                }
            }
        })
        .await?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum WaitKind {
    Deployment,
    Node,
    Group,
}
