//! Notifier: delivers the publish result to the evaluator callback.

use tracing::{info, warn};

use crate::contract::WebClient;
use crate::retry::{retry_until, RetryPolicy};
use crate::task::NotifyPayload;

/// POST `payload` to `callback_url` until a 200 comes back or the budget runs out.
///
/// A `false` result is reported to the caller but never reverts the publish.
pub async fn notify<W>(
    web: &W,
    callback_url: &str,
    payload: &NotifyPayload,
    policy: &RetryPolicy,
) -> bool
where
    W: WebClient + ?Sized,
{
    let body = match serde_json::to_value(payload) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = ?e, "[NOTIFY] payload could not be serialized");
            return false;
        }
    };
    let body = &body;
    let delivered = retry_until(policy, "notify", |attempt| async move {
        match web.post_json(callback_url, body).await {
            Ok(200) => true,
            Ok(status) => {
                warn!(url = callback_url, attempt, status, "[NOTIFY] evaluator rejected callback");
                false
            }
            Err(e) => {
                warn!(url = callback_url, attempt, error = %e, "[NOTIFY] callback request failed");
                false
            }
        }
    })
    .await;
    if delivered {
        info!(url = callback_url, task = %payload.task, "[NOTIFY] evaluator notified");
    }
    delivered
}
