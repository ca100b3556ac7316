//! Provider error taxonomy.

use thiserror::Error;

/// Errors reported by a deployment provider.
///
/// The split matters for control flow: `Transient` is retried silently
/// inside poll loops, `Conflict` is surfaced as an explicit operator
/// decision point, and everything else is re-raised rather than masked.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The named resource, deployment, or snapshot does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-deleted deployment already exists for the same source.
    #[error("deployment already exists for source: {identifier}")]
    Conflict { identifier: String },

    /// Expected eventual-consistency gap (e.g. an artifact not yet
    /// visible right after its create call returned).
    #[error("transient provider condition: {0}")]
    Transient(String),

    /// Any other provider-reported failure. Never swallowed.
    #[error("provider request failed: {0}")]
    Api(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
