//! Retry wrapper around a single dispatch attempt.

use log::warn;

use crate::config::Options;

use super::client::DispatchError;

/// Executes an async operation with the configured retry budget.
///
/// Every classified dispatch error is retryable here: classification has
/// already downgraded ignorable statuses and suppressible network failures
/// before an error reaches this layer. `retry_count = N` means at most N+1
/// attempts, waiting `retry_delay` between them; the last error is returned
/// once the budget is exhausted.
pub async fn with_retry<F, Fut, T>(options: &Options, operation: F) -> Result<T, DispatchError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, DispatchError>>,
{
    let attempts = options.retry_count + 1;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(e);
                }
                warn!(
                    "attempt {}/{} failed ({}), retrying in {:?}...",
                    attempt, attempts, e, options.retry_delay
                );
                tokio::time::sleep(options.retry_delay).await;
            }
        }
    }
}
