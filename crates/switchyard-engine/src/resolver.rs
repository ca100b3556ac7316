//! Resource descriptor resolution.
//!
//! Normalizes "some identifier the operator typed" into a
//! [`ResourceDescriptor`]: group lookup first, single-node fallback, and
//! writer-member resolution for groups since every health and
//! suitability decision is keyed on the writer node.

use serde::Serialize;
use tracing::{debug, info};

use switchyard_core::{Config, Endpoint, ResourceDescriptor, ResourceKind};
use switchyard_provider::DeploymentProvider;

use crate::error::{EngineError, EngineResult};

/// Post-switch endpoint confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointReport {
    pub identifier: String,
    pub instance_class: String,
    pub endpoint: Option<Endpoint>,
}

/// Stateless lookup against the provider. Descriptors are never cached;
/// callers re-resolve whenever freshness matters.
pub struct Resolver<'a, P> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: DeploymentProvider> Resolver<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// Resolve an identifier to a normalized descriptor.
    ///
    /// An identifier that names neither a group nor a single node is a
    /// fatal `NotFound` — never silently defaulted. A group whose writer
    /// member cannot be found is the distinct `WriterNotFound`.
    pub async fn resolve(&self, identifier: &str) -> EngineResult<ResourceDescriptor> {
        if let Some(group) = self.provider.describe_group(identifier).await? {
            let writer = group
                .members
                .iter()
                .find(|m| m.is_writer)
                .ok_or_else(|| EngineError::WriterNotFound(identifier.to_string()))?;
            let node = self
                .provider
                .describe_node(&writer.node_id)
                .await?
                .ok_or_else(|| EngineError::WriterNotFound(identifier.to_string()))?;
            return Ok(ResourceDescriptor {
                identifier: group.identifier,
                kind: ResourceKind::Group,
                engine: group.engine,
                engine_version: group.engine_version,
                instance_class: node.instance_class,
                storage_gib: None,
                storage_kind: None,
                writer_node_id: Some(node.identifier),
                endpoint: group.endpoint,
            });
        }

        match self.provider.describe_node(identifier).await? {
            Some(node) => Ok(ResourceDescriptor {
                identifier: node.identifier,
                kind: ResourceKind::Single,
                engine: node.engine,
                engine_version: node.engine_version,
                instance_class: node.instance_class,
                storage_gib: node.storage_gib,
                storage_kind: node.storage_kind,
                writer_node_id: None,
                endpoint: node.endpoint,
            }),
            None => Err(EngineError::NotFound(identifier.to_string())),
        }
    }

    /// Instance classes orderable for this descriptor's engine.
    ///
    /// Filters are loosened progressively (engine+version+storage, then
    /// engine+version, then engine alone) until the provider returns a
    /// non-empty list. Classes are ranked by the configured family
    /// priority, alphabetical within a family, unmatched families last.
    pub async fn list_target_classes(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> EngineResult<Vec<String>> {
        let engine = descriptor.engine.to_lowercase();
        let version = descriptor.engine_version.as_str();

        let mut attempts: Vec<(Option<&str>, Option<&str>)> = Vec::new();
        if let Some(storage) = descriptor.storage_kind.as_deref() {
            attempts.push((Some(version), Some(storage)));
        }
        attempts.push((Some(version), None));
        attempts.push((None, None));

        let mut classes: Vec<String> = Vec::new();
        for (ver, storage) in attempts {
            match self
                .provider
                .list_orderable_classes(&engine, ver, storage)
                .await
            {
                Ok(found) if !found.is_empty() => {
                    classes = found;
                    break;
                }
                Ok(_) => continue,
                Err(error) => {
                    debug!(%engine, ?ver, ?storage, %error, "orderable-class listing attempt failed");
                    continue;
                }
            }
        }
        if classes.is_empty() {
            return Err(EngineError::NoOrderableClasses {
                engine: descriptor.engine.clone(),
            });
        }

        classes.sort();
        classes.dedup();
        classes.sort_by_key(|class| {
            self.config
                .preferred_class_families
                .iter()
                .position(|family| class.contains(family.as_str()))
                .unwrap_or(usize::MAX)
        });
        Ok(classes)
    }

    /// Check a requested target class against the orderable list.
    pub async fn validate_target_class(
        &self,
        descriptor: &ResourceDescriptor,
        target_class: &str,
    ) -> EngineResult<()> {
        let allowed = self.list_target_classes(descriptor).await?;
        if allowed.iter().any(|c| c == target_class) {
            Ok(())
        } else {
            Err(EngineError::ClassNotAllowed {
                identifier: descriptor.identifier.clone(),
                class: target_class.to_string(),
            })
        }
    }

    /// Re-resolve after a cut-over and confirm the identifier still
    /// answers at the same endpoint, now at the new class.
    pub async fn verify_endpoint(&self, identifier: &str) -> EngineResult<EndpointReport> {
        let descriptor = self.resolve(identifier).await?;
        let report = EndpointReport {
            identifier: descriptor.identifier,
            instance_class: descriptor.instance_class,
            endpoint: descriptor.endpoint,
        };
        match &report.endpoint {
            Some(ep) => info!(
                identifier = %report.identifier,
                class = %report.instance_class,
                endpoint = format!("{}:{}", ep.host, ep.port),
                "identifier verified after cut-over"
            ),
            None => info!(
                identifier = %report.identifier,
                class = %report.instance_class,
                "identifier verified after cut-over (no endpoint reported)"
            ),
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_provider::fake::{simple_node, FakeProvider};
    use switchyard_provider::{GroupDescription, GroupMember};

    fn group_fixture(fake: &FakeProvider) {
        fake.insert_group(GroupDescription {
            identifier: "orders".to_string(),
            engine: "aurora-postgresql".to_string(),
            engine_version: "15.4".to_string(),
            members: vec![
                GroupMember {
                    node_id: "orders-node-2".to_string(),
                    is_writer: false,
                },
                GroupMember {
                    node_id: "orders-node-1".to_string(),
                    is_writer: true,
                },
            ],
            endpoint: Some(Endpoint {
                host: "orders.cluster.db.internal".to_string(),
                port: 5432,
            }),
        });
        fake.insert_node(simple_node("orders-node-1", "aurora-postgresql", "db.r6g.large"));
        fake.insert_node(simple_node("orders-node-2", "aurora-postgresql", "db.r6g.large"));
    }

    #[tokio::test]
    async fn resolves_single_node() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.medium"));
        let config = Config::default();
        let resolver = Resolver::new(&fake, &config);

        let desc = resolver.resolve("billing").await.unwrap();
        assert_eq!(desc.kind, ResourceKind::Single);
        assert_eq!(desc.instance_class, "db.t3.medium");
        assert!(desc.writer_node_id.is_none());
    }

    #[tokio::test]
    async fn resolves_group_via_writer() {
        let fake = FakeProvider::new();
        group_fixture(&fake);
        let config = Config::default();
        let resolver = Resolver::new(&fake, &config);

        let desc = resolver.resolve("orders").await.unwrap();
        assert_eq!(desc.kind, ResourceKind::Group);
        assert_eq!(desc.instance_class, "db.r6g.large");
        assert_eq!(desc.writer_node_id.as_deref(), Some("orders-node-1"));
        assert_eq!(desc.telemetry_node_id(), "orders-node-1");
    }

    #[tokio::test]
    async fn unknown_identifier_is_fatal() {
        let fake = FakeProvider::new();
        let config = Config::default();
        let resolver = Resolver::new(&fake, &config);

        let err = resolver.resolve("nope").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn group_without_writer_is_distinct_error() {
        let fake = FakeProvider::new();
        fake.insert_group(GroupDescription {
            identifier: "orders".to_string(),
            engine: "aurora-postgresql".to_string(),
            engine_version: "15.4".to_string(),
            members: vec![GroupMember {
                node_id: "orders-node-2".to_string(),
                is_writer: false,
            }],
            endpoint: None,
        });
        let config = Config::default();
        let resolver = Resolver::new(&fake, &config);

        let err = resolver.resolve("orders").await.unwrap_err();
        assert!(matches!(err, EngineError::WriterNotFound(_)));
    }

    #[tokio::test]
    async fn resolve_is_idempotent_without_mutation() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.medium"));
        let config = Config::default();
        let resolver = Resolver::new(&fake, &config);

        let first = resolver.resolve("billing").await.unwrap();
        let second = resolver.resolve("billing").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn orderable_classes_fall_back_through_looser_filters() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.medium"));
        // Only the engine-and-version filter has data; the storage-narrowed
        // query returns nothing.
        fake.set_orderable(
            "postgres",
            Some("16.2"),
            None,
            &["db.m5.large", "db.r5.large", "db.t3.large", "db.t3.medium"],
        );
        let config = Config::default();
        let resolver = Resolver::new(&fake, &config);
        let desc = resolver.resolve("billing").await.unwrap();

        let classes = resolver.list_target_classes(&desc).await.unwrap();
        // Family priority: db.t3. outranks db.m5. in the defaults, and
        // families outside the preference list sort last.
        assert_eq!(
            classes,
            vec!["db.t3.large", "db.t3.medium", "db.m5.large", "db.r5.large"]
        );
    }

    #[tokio::test]
    async fn no_orderable_classes_is_an_error() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.medium"));
        let config = Config::default();
        let resolver = Resolver::new(&fake, &config);
        let desc = resolver.resolve("billing").await.unwrap();

        let err = resolver.list_target_classes(&desc).await.unwrap_err();
        assert!(matches!(err, EngineError::NoOrderableClasses { .. }));
    }

    #[tokio::test]
    async fn validate_target_class_rejects_unlisted() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.medium"));
        fake.set_orderable("postgres", Some("16.2"), Some("gp3"), &["db.t3.large"]);
        let config = Config::default();
        let resolver = Resolver::new(&fake, &config);
        let desc = resolver.resolve("billing").await.unwrap();

        resolver
            .validate_target_class(&desc, "db.t3.large")
            .await
            .unwrap();
        let err = resolver
            .validate_target_class(&desc, "db.r5.24xlarge")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ClassNotAllowed { .. }));
    }

    #[tokio::test]
    async fn verify_endpoint_reports_current_class() {
        let fake = FakeProvider::new();
        fake.insert_node(simple_node("billing", "postgres", "db.t3.large"));
        let config = Config::default();
        let resolver = Resolver::new(&fake, &config);

        let report = resolver.verify_endpoint("billing").await.unwrap();
        assert_eq!(report.instance_class, "db.t3.large");
        assert_eq!(
            report.endpoint.unwrap().host,
            "billing.db.internal"
        );
    }
}
