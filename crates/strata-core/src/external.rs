//! Bounded, retried calls to external collaborators.
//!
//! Every embedding or compression request runs under a per-attempt timeout
//! and is retried with exponential backoff while the failure is transient.
//! Callers decide how to degrade once the retries are exhausted.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::error::{StrataError, StrataResult};

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry (milliseconds)
    pub initial_delay_ms: u64,
    /// Maximum delay between retries (milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            multiplier: 2.0_f32,
        }
    }
}

/// Time bound and retry policy for external calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalCallConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl Default for ExternalCallConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExternalCallConfig {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_max_times(self.retry.max_retries as usize)
            .with_min_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .with_factor(self.retry.multiplier)
    }
}

/// Run `op` with a timeout per attempt, retrying transient failures.
pub async fn call_external<T, F, Fut>(
    service: &'static str,
    config: &ExternalCallConfig,
    mut op: F,
) -> StrataResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StrataResult<T>>,
{
    let timeout_ms = config.timeout_ms;
    let attempt = || {
        let fut = op();
        async move {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
                Ok(result) => result,
                Err(_) => Err(StrataError::timeout(service, timeout_ms)),
            }
        }
    };

    attempt
        .retry(config.backoff())
        .when(|e: &StrataError| e.is_transient())
        .notify(|err, dur| {
            tracing::warn!(
                service,
                "External call failed, retrying in {:?}: {}",
                dur,
                err
            );
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config() -> ExternalCallConfig {
        ExternalCallConfig {
            timeout_ms: 50,
            retry: RetryPolicy {
                max_retries: 2,
                initial_delay_ms: 1,
                max_delay_ms: 2,
                multiplier: 2.0,
            },
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = call_external("embedding", &fast_config(), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StrataError::embedding("flaky"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: StrataResult<()> = call_external("compression", &fast_config(), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(StrataError::compression("down"))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: StrataResult<()> = call_external("compression", &fast_config(), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(StrataError::validation("bad input"))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let result: StrataResult<()> = call_external("embedding", &fast_config(), || async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StrataError::Timeout { .. })));
    }
}
