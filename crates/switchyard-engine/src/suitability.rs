//! Target-class suitability projection.
//!
//! Projects the writer's current load onto the proposed instance class
//! and classifies the result. CPU scales by the vCPU ratio; projected
//! free memory shifts by the difference in class memory. Unknown classes
//! produce a soft pass so an out-of-catalog class warns rather than
//! blocks.

use serde::Serialize;
use tracing::{info, warn};

use switchyard_core::{Config, TelemetrySample};

/// How the projected load on the target class classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Suitable,
    /// Workable but close to the line; proceed with eyes open.
    Marginal,
    /// Projected load would not fit; the change is blocked.
    Critical,
    /// One or both classes are not in the catalog; nothing to project.
    Unknown,
}

/// Relative sizing of the proposed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Upgrade,
    Downgrade,
    Lateral,
}

#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub classification: Classification,
    pub direction: Option<ChangeDirection>,
    pub projected_cpu_percent: Option<f64>,
    pub projected_free_memory_gib: Option<f64>,
    pub reasons: Vec<String>,
}

impl Verdict {
    /// Whether this verdict must stop the change.
    pub fn blocks(&self) -> bool {
        self.classification == Classification::Critical
    }
}

pub struct SuitabilityProjector<'a> {
    config: &'a Config,
}

impl<'a> SuitabilityProjector<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Project `sample` from `current_class` onto `target_class`.
    pub fn project(
        &self,
        current_class: &str,
        target_class: &str,
        sample: TelemetrySample,
    ) -> Verdict {
        let current = self.config.classes.get(current_class);
        let target = self.config.classes.get(target_class);
        let (Some(current), Some(target)) = (current, target) else {
            warn!(
                current = %current_class,
                target = %target_class,
                "instance class not in catalog, skipping projection"
            );
            return Verdict {
                classification: Classification::Unknown,
                direction: None,
                projected_cpu_percent: None,
                projected_free_memory_gib: None,
                reasons: vec!["class specs unknown, projection skipped".to_string()],
            };
        };

        let grows = target.vcpu > current.vcpu || target.memory_gib > current.memory_gib;
        let shrinks = target.vcpu < current.vcpu || target.memory_gib < current.memory_gib;
        let direction = match (grows, shrinks) {
            (true, false) => ChangeDirection::Upgrade,
            (false, true) => ChangeDirection::Downgrade,
            // Equal on both axes, or trading one for the other.
            _ => ChangeDirection::Lateral,
        };

        let cpu = sample.cpu_or_zero();
        let projected_cpu = if target.vcpu == 0 {
            cpu
        } else {
            cpu * current.vcpu as f64 / target.vcpu as f64
        };
        // A missing memory metric projects from zero free; the memory
        // delta between classes still applies.
        let free_gib = sample.free_memory_gib().unwrap_or(0.0);
        let projected_free = free_gib + (target.memory_gib - current.memory_gib);

        let thresholds = &self.config.thresholds;
        let mut reasons = Vec::new();
        let mut classification = Classification::Suitable;
        if projected_cpu > thresholds.critical_cpu_percent {
            classification = Classification::Critical;
            reasons.push(format!(
                "projected cpu {projected_cpu:.1}% above {:.0}%",
                thresholds.critical_cpu_percent
            ));
        } else if projected_cpu > thresholds.warn_cpu_percent {
            classification = Classification::Marginal;
            reasons.push(format!(
                "projected cpu {projected_cpu:.1}% above {:.0}%",
                thresholds.warn_cpu_percent
            ));
        }
        if projected_free < thresholds.critical_memory_gib {
            classification = Classification::Critical;
            reasons.push(format!(
                "projected free memory {projected_free:.2} GiB below {:.1} GiB",
                thresholds.critical_memory_gib
            ));
        } else if projected_free < thresholds.warn_memory_gib
            && classification != Classification::Critical
        {
            classification = Classification::Marginal;
            reasons.push(format!(
                "projected free memory {projected_free:.2} GiB below {:.1} GiB",
                thresholds.warn_memory_gib
            ));
        }

        info!(
            current = %current_class,
            target = %target_class,
            ?direction,
            projected_cpu = format!("{projected_cpu:.1}"),
            projected_free_gib = format!("{projected_free:.2}"),
            ?classification,
            "suitability projection"
        );
        Verdict {
            classification,
            direction: Some(direction),
            projected_cpu_percent: Some(projected_cpu),
            projected_free_memory_gib: Some(projected_free),
            reasons,
        }
    }
}
