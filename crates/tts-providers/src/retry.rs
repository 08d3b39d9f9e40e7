//! Synthesis retry policy (spec §4.7): transient errors retry with
//! exponential backoff; `QuotaExceeded` surfaces immediately rather
//! than thrashing the provider.

use std::future::Future;

use backon::{ExponentialBuilder, Retryable};
use redub_tts::TtsError;

fn is_retryable(err: &TtsError) -> bool {
    matches!(err, TtsError::SynthesisFailed(_))
}

/// Wraps a single `synthesize` call with bounded exponential-backoff
/// retry on transient failures. `QuotaExceeded` is never retried.
pub async fn retry_synthesis<T, F, Fut>(max_retries: usize, call: F) -> Result<T, TtsError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TtsError>>,
{
    let backoff = ExponentialBuilder::default().with_jitter().with_max_times(max_retries);

    (|| call())
        .retry(backoff)
        .when(is_retryable)
        .notify(|err, dur| {
            tracing::warn!(?err, delay_ms = dur.as_millis() as u64, "retrying tts synthesis");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn quota_exceeded_is_never_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result: Result<(), TtsError> = retry_synthesis(3, move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            async { Err(TtsError::QuotaExceeded) }
        })
        .await;
        assert!(matches!(result, Err(TtsError::QuotaExceeded)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failure_retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result = retry_synthesis(3, move || {
            let n = calls2.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TtsError::SynthesisFailed("timeout".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
    }
}
