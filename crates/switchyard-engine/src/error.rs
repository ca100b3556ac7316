//! Engine error types.

use switchyard_core::DeploymentStatus;
use switchyard_provider::ProviderError;
use thiserror::Error;

/// Errors that can occur during orchestration operations.
///
/// Admission failures and timeouts are deliberately not in this set:
/// they are returned values the calling flow must check explicitly
/// (a failed `HealthReport`, a `critical` verdict, `await_ready`
/// returning `false`), so they cannot be accidentally swallowed by a
/// blanket error handler.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("writer node not found in group: {0}")]
    WriterNotFound(String),

    #[error("deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("no orderable instance classes for engine: {engine}")]
    NoOrderableClasses { engine: String },

    #[error("instance class {class} is not orderable for {identifier}")]
    ClassNotAllowed { identifier: String, class: String },

    #[error("switchover failed for {deployment_id}: final status {status}")]
    SwitchoverFailed {
        deployment_id: String,
        status: DeploymentStatus,
    },

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

pub type EngineResult<T> = Result<T, EngineError>;
