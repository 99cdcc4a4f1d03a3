//! Bounded, fixed-delay retry for connection-level failures.

use std::future::Future;

use tracing::warn;

use certboot_core::RetryPolicy;

use crate::error::TransportError;

/// Run `op` until it succeeds, fails with an error `retryable` rejects, or
/// the policy's attempts are used up. The last error is returned unchanged.
pub async fn retry_if<T, F, Fut>(
    policy: &RetryPolicy,
    target: &str,
    retryable: fn(&TransportError) -> bool,
    mut op: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if retryable(&e) && attempt < attempts => {
                warn!(
                    target_url = %target,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Transient CA connection failure, retrying in {:?}", policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_millis(1),
        }
    }

    fn refused() -> TransportError {
        TransportError::Connect {
            url: "https://puppet:8140".into(),
            message: "connection refused".into(),
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let result = retry_if(&policy(5), "ca", TransportError::is_transient, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(refused())
            } else {
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_if(&policy(3), "ca", TransportError::is_transient, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(refused())
        })
        .await;

        assert!(matches!(result, Err(TransportError::Connect { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_if(&policy(5), "ca", TransportError::is_transient, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Request {
                url: "ca".into(),
                message: "bad certificate".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(TransportError::Request { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_only_does_not_resend_after_timeout() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_if(
            &policy(5),
            "ca",
            TransportError::is_connect_failure,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Timeout {
                    url: "ca".into(),
                    message: "operation timed out".into(),
                })
            },
        )
        .await;

        assert!(matches!(result, Err(TransportError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_only_retries_refused_connections() {
        let calls = &AtomicU32::new(0);
        let result = retry_if(
            &policy(5),
            "ca",
            TransportError::is_connect_failure,
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(refused())
                } else {
                    Ok("ok")
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
