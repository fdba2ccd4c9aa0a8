//! Container readiness probe.

use std::time::Duration;

/// Polls `url` until any HTTP response arrives or the deadline passes.
///
/// Each attempt uses its own short timeout; transport failures are
/// swallowed and retried after `interval`. A response with any status
/// counts as ready: the only requirement is that the in-container server
/// is accepting connections.
pub async fn wait_for_service(
    client: &reqwest::Client,
    url: &str,
    total_timeout: Duration,
    interval: Duration,
    attempt_timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + total_timeout;

    loop {
        match client.get(url).timeout(attempt_timeout).send().await {
            Ok(_) => return true,
            Err(_) => {
                if tokio::time::Instant::now() > deadline {
                    return false;
                }
                tokio::time::sleep(interval).await;
            }
        }
    }
}
