use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use super::error::BrowserResult;

/// Runs a driver call under an upper bound. Errors and timeouts both resolve
/// to `fallback`; a stalled page must never block the loop.
pub async fn bounded<T, F>(limit: Duration, label: &str, fut: F, fallback: T) -> T
where
    F: Future<Output = BrowserResult<T>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            debug!(probe = label, error = %err, "probe failed");
            fallback
        }
        Err(_) => {
            debug!(
                probe = label,
                timeout_ms = limit.as_millis() as u64,
                "probe timed out"
            );
            fallback
        }
    }
}

/// Bounded variant for calls with no payload; `true` only on success.
pub async fn bounded_ok<F>(limit: Duration, label: &str, fut: F) -> bool
where
    F: Future<Output = BrowserResult<()>>,
{
    bounded(limit, label, async { fut.await.map(|_| true) }, false).await
}
