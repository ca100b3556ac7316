//! Load-based admission gate.
//!
//! Before any class change is allowed to start, recent telemetry for the
//! writer node is checked against conservative thresholds. A node that is
//! already busy does not get resized underneath its traffic. Missing
//! telemetry is permissive: a node with no datapoints in the window is
//! treated as idle, not as unhealthy.

use serde::Serialize;
use tracing::{info, warn};

use switchyard_core::{Config, ResourceDescriptor, TelemetrySample};
use switchyard_provider::DeploymentProvider;

use crate::error::EngineResult;

/// Outcome of the admission check, with every failing rule listed so the
/// operator sees all of the reasons at once, not just the first.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub sample: TelemetrySample,
    pub passed: bool,
    pub reasons: Vec<String>,
}

pub struct HealthGate<'a, P> {
    provider: &'a P,
    config: &'a Config,
}

impl<'a, P: DeploymentProvider> HealthGate<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config) -> Self {
        Self { provider, config }
    }

    /// Fetch telemetry for the descriptor's writer node and evaluate it.
    pub async fn check(&self, descriptor: &ResourceDescriptor) -> EngineResult<HealthReport> {
        let node_id = descriptor.telemetry_node_id();
        let sample = self
            .provider
            .query_telemetry(node_id, self.config.telemetry_window_minutes)
            .await?;
        let report = self.evaluate(sample);
        if report.passed {
            info!(
                identifier = %descriptor.identifier,
                node = %node_id,
                cpu = sample.cpu_or_zero(),
                "admission gate passed"
            );
        } else {
            warn!(
                identifier = %descriptor.identifier,
                node = %node_id,
                reasons = report.reasons.join("; "),
                "admission gate blocked the change"
            );
        }
        Ok(report)
    }

    /// Pure threshold evaluation, one entry in `reasons` per failing rule.
    ///
    /// Memory rules only fire on an observed value; a missing memory
    /// metric never blocks. CPU and connections default to zero when
    /// absent, which likewise cannot trip a ">" rule.
    pub fn evaluate(&self, sample: TelemetrySample) -> HealthReport {
        let thresholds = &self.config.thresholds;
        let cpu = sample.cpu_or_zero();
        let connections = sample.connections_or_zero();
        let free_gib = sample.free_memory_gib();

        let mut reasons = Vec::new();
        if cpu > thresholds.warn_cpu_percent {
            reasons.push(format!(
                "cpu {cpu:.1}% above {:.0}%",
                thresholds.warn_cpu_percent
            ));
        }
        if let Some(free) = free_gib {
            if free < thresholds.warn_memory_gib {
                reasons.push(format!(
                    "free memory {free:.2} GiB below {:.1} GiB",
                    thresholds.warn_memory_gib
                ));
            }
        }
        if connections > 0.0
            && cpu > thresholds.combined_cpu_percent
            && free_gib.is_some_and(|free| free < thresholds.combined_memory_gib)
        {
            reasons.push(format!(
                "active connections with cpu {cpu:.1}% and free memory under {:.1} GiB",
                thresholds.combined_memory_gib
            ));
        }

        HealthReport {
            sample,
            passed: reasons.is_empty(),
            reasons,
        }
    }
}
