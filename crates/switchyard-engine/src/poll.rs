//! Generic "poll until ready or timeout" loop.
//!
//! Every long wait in the engine — snapshot progress, deployment
//! readiness, switchover, confirmed deletion — is the same shape: query
//! the provider, decide ready/pending, sleep, repeat. The provider is
//! the sole source of truth, so there is nothing to cache between
//! iterations; the closure re-queries on every call.

use std::future::Future;
use std::time::Duration;

/// Result of a single poll iteration.
pub enum PollOutcome<T> {
    /// The awaited condition holds; stop polling.
    Ready(T),
    /// Not there yet; sleep and poll again.
    Pending,
}

/// Poll `poll` every `interval` until it reports ready, it errors, or
/// the optional `timeout` elapses.
///
/// Returns `Ok(Some(value))` on ready, `Ok(None)` on timeout. With
/// `timeout: None` the loop only ends on ready or error — the waits that
/// must not be abandoned (switchover, deletion) pass `None`.
pub async fn poll_until<T, E, F, Fut>(
    interval: Duration,
    timeout: Option<Duration>,
    mut poll: F,
) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollOutcome<T>, E>>,
{
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
    loop {
        if let PollOutcome::Ready(value) = poll().await? {
            return Ok(Some(value));
        }
        if let Some(deadline) = deadline {
            if tokio::time::Instant::now() + interval >= deadline {
                return Ok(None);
            }
        }
        tokio::time::sleep(interval).await;
    }
}
