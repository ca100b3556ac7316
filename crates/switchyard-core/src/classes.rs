//! Static instance-class reference specs.
//!
//! Used only by the suitability projection. The table is deliberately a
//! soft reference: a class missing from it skips projection rather than
//! blocking the change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reference hardware shape of an instance class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceClassSpec {
    pub vcpu: u32,
    pub memory_gib: f64,
}

/// Lookup table `class -> (vcpu, memory_gib)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTable(BTreeMap<String, InstanceClassSpec>);

impl ClassTable {
    /// An empty table (every lookup is a soft miss).
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a table from explicit entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u32, f64)>,
        S: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(class, vcpu, memory_gib)| (class.into(), InstanceClassSpec { vcpu, memory_gib }))
                .collect(),
        )
    }

    pub fn get(&self, class: &str) -> Option<InstanceClassSpec> {
        self.0.get(class).copied()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.0.contains_key(class)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, InstanceClassSpec)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::from_entries(BUILTIN_SPECS.iter().map(|&(c, v, m)| (c, v, m)))
    }
}

/// Known classes for the common burstable, general-purpose, and
/// memory-optimized families.
const BUILTIN_SPECS: &[(&str, u32, f64)] = &[
    // T3/T4g burstable
    ("db.t3.micro", 2, 1.0),
    ("db.t3.small", 2, 2.0),
    ("db.t3.medium", 2, 4.0),
    ("db.t3.large", 2, 8.0),
    ("db.t3.xlarge", 4, 16.0),
    ("db.t3.2xlarge", 8, 32.0),
    ("db.t4g.micro", 2, 1.0),
    ("db.t4g.small", 2, 2.0),
    ("db.t4g.medium", 2, 4.0),
    ("db.t4g.large", 2, 8.0),
    ("db.t4g.xlarge", 4, 16.0),
    ("db.t4g.2xlarge", 8, 32.0),
    // M5/M6g/M6i general purpose
    ("db.m5.large", 2, 8.0),
    ("db.m5.xlarge", 4, 16.0),
    ("db.m5.2xlarge", 8, 32.0),
    ("db.m5.4xlarge", 16, 64.0),
    ("db.m5.8xlarge", 32, 128.0),
    ("db.m5.12xlarge", 48, 192.0),
    ("db.m5.16xlarge", 64, 256.0),
    ("db.m5.24xlarge", 96, 384.0),
    ("db.m6g.large", 2, 8.0),
    ("db.m6g.xlarge", 4, 16.0),
    ("db.m6g.2xlarge", 8, 32.0),
    ("db.m6g.4xlarge", 16, 64.0),
    ("db.m6g.8xlarge", 32, 128.0),
    ("db.m6g.12xlarge", 48, 192.0),
    ("db.m6g.16xlarge", 64, 256.0),
    ("db.m6i.large", 2, 8.0),
    ("db.m6i.xlarge", 4, 16.0),
    ("db.m6i.2xlarge", 8, 32.0),
    ("db.m6i.4xlarge", 16, 64.0),
    ("db.m6i.8xlarge", 32, 128.0),
    ("db.m6i.12xlarge", 48, 192.0),
    ("db.m6i.16xlarge", 64, 256.0),
    ("db.m6i.24xlarge", 96, 384.0),
    ("db.m6i.32xlarge", 128, 512.0),
    // R5/R6g memory optimized
    ("db.r5.large", 2, 16.0),
    ("db.r5.xlarge", 4, 32.0),
    ("db.r5.2xlarge", 8, 64.0),
    ("db.r5.4xlarge", 16, 128.0),
    ("db.r5.8xlarge", 32, 256.0),
    ("db.r5.12xlarge", 48, 384.0),
    ("db.r5.16xlarge", 64, 512.0),
    ("db.r5.24xlarge", 96, 768.0),
    ("db.r6g.large", 2, 16.0),
    ("db.r6g.xlarge", 4, 32.0),
    ("db.r6g.2xlarge", 8, 64.0),
    ("db.r6g.4xlarge", 16, 128.0),
    ("db.r6g.8xlarge", 32, 256.0),
    ("db.r6g.12xlarge", 48, 384.0),
    ("db.r6g.16xlarge", 64, 512.0),
];
