//! Availability Poller: waits for a published URL to answer 200.

use tracing::{debug, info, warn};

use crate::contract::WebClient;
use crate::retry::{retry_until, RetryPolicy};

/// Poll `url` until it returns 200 or the policy's budget runs out.
///
/// Any other status, and any transport error, counts as "not yet". Returning
/// `false` is an expected outcome, not a failure of the task.
pub async fn await_available<W>(web: &W, url: &str, policy: &RetryPolicy) -> bool
where
    W: WebClient + ?Sized,
{
    let ready = retry_until(policy, "poll", |attempt| async move {
        match web.probe(url).await {
            Ok(200) => true,
            Ok(status) => {
                debug!(url, attempt, status, "[POLL] not available yet");
                false
            }
            Err(e) => {
                debug!(url, attempt, error = %e, "[POLL] probe failed");
                false
            }
        }
    })
    .await;
    if ready {
        info!(url, "[POLL] hosting URL is live");
    } else {
        warn!(url, attempts = policy.max_attempts, "[POLL] hosting URL not live yet");
    }
    ready
}
