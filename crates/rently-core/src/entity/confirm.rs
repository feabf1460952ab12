// Bounded confirmation polling after a command.
//
// The cloud acknowledges a status write long before the hub has moved
// the bolt or changed the thermostat, so commands re-fetch on a fixed
// delay until the remote state matches or the attempts run out.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RetryPolicy;

/// How a confirmation loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Confirmation {
    /// The probe matched on the given attempt.
    Converged { attempt: u32 },
    /// Every attempt ran without a match.
    Exhausted,
    /// The owning entity was cancelled mid-loop.
    Cancelled,
}

/// Sleep `policy.delay`, then run `probe`, up to `policy.attempts` times.
///
/// Each sleep races the cancellation token; a cancelled loop returns
/// before issuing another probe.
pub(crate) async fn poll_until<F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> Confirmation
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.attempts {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Confirmation::Cancelled,
            () = tokio::time::sleep(policy.delay) => {}
        }

        if probe(attempt).await {
            return Confirmation::Converged { attempt };
        }
        debug!(attempt, max = policy.attempts, "remote state not converged yet");
    }
    Confirmation::Exhausted
}
