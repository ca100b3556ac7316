//! switchyard-engine — blue/green instance-class change orchestration.
//!
//! The engine drives a managed database from one instance class to
//! another with near-zero downtime by provisioning a paired environment,
//! waiting for it to synchronize, and cutting over on command. Each
//! concern is a small component taking the provider and config by
//! reference:
//!
//! ```text
//!   Resolver ──> HealthGate ──> SuitabilityProjector
//!                                      │ admitted
//!                                      v
//!   SnapshotCoordinator ──> Orchestrator (create / await_ready / switch)
//!                                      │
//!                     RollbackCoordinator   CleanupCoordinator
//! ```
//!
//! Components hold no authoritative state. The provider is re-queried on
//! every poll iteration, so a crashed or cancelled run can be resumed by
//! simply invoking the same operation again. One operator session per
//! source resource is assumed; there is no distributed lock, and the
//! provider-side create conflict is the only concurrent-run detection.
//! Admission refusals, readiness timeouts, and create conflicts are
//! returned values, not errors; see [`error::EngineError`] for what is.

pub mod cleanup;
pub mod error;
pub mod eta;
pub mod health;
pub mod orchestrator;
pub mod poll;
pub mod resolver;
pub mod rollback;
pub mod snapshot;
pub mod suitability;

pub use cleanup::CleanupCoordinator;
pub use error::{EngineError, EngineResult};
pub use eta::estimate_provisioning_eta;
pub use health::{HealthGate, HealthReport};
pub use orchestrator::{ConflictChoice, CreateOutcome, Orchestrator};
pub use poll::{poll_until, PollOutcome};
pub use resolver::{EndpointReport, Resolver};
pub use rollback::{RollbackCoordinator, RollbackOutcome};
pub use snapshot::SnapshotCoordinator;
pub use suitability::{ChangeDirection, Classification, SuitabilityProjector, Verdict};
