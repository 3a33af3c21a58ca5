use crate::core::error::GatewayError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async request while the failure looks transient.
///
/// Transport errors and 5xx/429 responses are retried; any other status is
/// returned immediately. Total runs = 1 initial + `retries`.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries || !is_transient(&err) {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn is_transient(err: &GatewayError) -> bool {
    match err.status {
        None => true,
        Some(status) => status == 429 || status >= 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(GatewayError::new(Some(503), "unavailable"))
                    } else {
                        Ok(n)
                    }
                }
            },
            2,
            1,
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GatewayError::new(Some(404), "not found")) }
            },
            3,
            1,
        )
        .await;

        assert_eq!(result.unwrap_err().status, Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
