//! Shared multi-model / multi-region fallback policy (spec §4.5).
//!
//! The Script Post-Editor and Translator are both thin prompts layered
//! on this driver: given a desired model id (or the `auto` sentinel)
//! and an ordered list of regions, it walks the region-major Cartesian
//! product of (region, model) pairs, retrying each pair on transient
//! errors with jittered exponential backoff, and falls through to the
//! next model/region on non-transient unavailability.
//!
//! Grounded on the teacher's `transcribe-proxy::hyprnote_routing`
//! (ordered-priority chain selection, retry config shape) and
//! `llm-proxl::provider::openrouter` (provider-as-trait-object
//! fallback across a declared candidate list).

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;

pub const AUTO_SENTINEL: &str = "auto";

#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    pub regions: Vec<String>,
    pub models: Vec<String>,
    pub max_retries_per_pair: usize,
    pub max_retry_delay: Duration,
}

impl FallbackPolicy {
    /// Builds the policy's model chain: the caller's explicit model id
    /// verbatim, or the configured `auto_candidates` list (in order)
    /// when the caller passed [`AUTO_SENTINEL`].
    pub fn expand(requested_model: &str, auto_candidates: &[String], regions: Vec<String>) -> Self {
        let models = if requested_model == AUTO_SENTINEL {
            auto_candidates.to_vec()
        } else {
            vec![requested_model.to_string()]
        };
        Self {
            regions,
            models,
            max_retries_per_pair: 3,
            max_retry_delay: Duration::from_secs(20),
        }
    }
}

/// What an attempt callback returns when it fails.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error("transient error calling model: {0}")]
    Transient(String),
    #[error("model not found or deprecated")]
    ModelUnavailable,
    #[error("region unavailable")]
    RegionUnavailable,
}

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("every (region, model) pair was exhausted without success")]
    Exhausted,
}

/// The winning (region, model) pair and its result, recorded so the
/// Job can reproduce it and surface it in the final artifact header.
#[derive(Debug, Clone)]
pub struct FallbackOutcome<T> {
    pub value: T,
    pub region: String,
    pub model: String,
}

/// Runs `attempt(region, model)` over the policy's region-major
/// Cartesian product until one succeeds, retrying transient failures
/// per-pair with jittered exponential backoff.
pub async fn run_fallback<T, F, Fut>(
    policy: &FallbackPolicy,
    mut attempt: F,
) -> Result<FallbackOutcome<T>, FallbackError>
where
    F: FnMut(String, String) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    for region in &policy.regions {
        for model in &policy.models {
            let backoff = ExponentialBuilder::default()
                .with_jitter()
                .with_max_delay(policy.max_retry_delay)
                .with_max_times(policy.max_retries_per_pair);

            let region = region.clone();
            let model = model.clone();

            let result = (|| attempt(region.clone(), model.clone()))
                .retry(backoff)
                .when(|e| matches!(e, AttemptError::Transient(_)))
                .notify(|err, dur| {
                    tracing::warn!(?err, delay_ms = dur.as_millis() as u64, "retrying fallback attempt");
                })
                .await;

            match result {
                Ok(value) => {
                    return Ok(FallbackOutcome { value, region, model });
                }
                Err(AttemptError::ModelUnavailable) => continue,
                Err(AttemptError::RegionUnavailable) => break,
                Err(AttemptError::Transient(_)) => continue,
            }
        }
    }

    Err(FallbackError::Exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn policy() -> FallbackPolicy {
        FallbackPolicy {
            regions: vec!["us".into(), "eu".into()],
            models: vec!["recommended-fast".into(), "latest-fast".into()],
            max_retries_per_pair: 2,
            max_retry_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn expand_auto_uses_candidate_list() {
        let auto = vec!["a".to_string(), "b".to_string()];
        let policy = FallbackPolicy::expand(AUTO_SENTINEL, &auto, vec!["us".into()]);
        assert_eq!(policy.models, auto);
    }

    #[test]
    fn expand_explicit_model_is_singleton_chain() {
        let auto = vec!["a".to_string(), "b".to_string()];
        let policy = FallbackPolicy::expand("pinned-model", &auto, vec!["us".into()]);
        assert_eq!(policy.models, vec!["pinned-model".to_string()]);
    }

    #[tokio::test]
    async fn succeeds_on_first_pair_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let outcome = run_fallback(&policy(), move |region, model| {
            calls2.fetch_add(1, Ordering::SeqCst);
            let region = region.clone();
            let model = model.clone();
            async move { Ok::<_, AttemptError>(format!("{region}/{model}")) }
        })
        .await
        .unwrap();

        assert_eq!(outcome.region, "us");
        assert_eq!(outcome.model, "recommended-fast");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn model_unavailable_moves_to_next_model_same_region() {
        let outcome = run_fallback(&policy(), move |region, model| {
            let region = region.clone();
            let model = model.clone();
            async move {
                if model == "recommended-fast" {
                    Err(AttemptError::ModelUnavailable)
                } else {
                    Ok(format!("{region}/{model}"))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.region, "us");
        assert_eq!(outcome.model, "latest-fast");
    }

    #[tokio::test]
    async fn region_unavailable_skips_remaining_models_in_region() {
        let outcome = run_fallback(&policy(), move |region, model| {
            let region = region.clone();
            let model = model.clone();
            async move {
                if region == "us" {
                    Err(AttemptError::RegionUnavailable)
                } else {
                    Ok(format!("{region}/{model}"))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.region, "eu");
        assert_eq!(outcome.model, "recommended-fast");
    }

    #[tokio::test]
    async fn transient_errors_retry_then_fall_through() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = attempts.clone();
        let result: Result<FallbackOutcome<()>, FallbackError> = run_fallback(&policy(), move |_, _| {
            attempts2.fetch_add(1, Ordering::SeqCst);
            async move { Err(AttemptError::Transient("timeout".into())) }
        })
        .await;

        assert!(result.is_err());
        // 2 regions * 2 models * (1 + max_retries_per_pair) attempts
        assert_eq!(attempts.load(Ordering::SeqCst), 2 * 2 * 3);
    }

    #[tokio::test]
    async fn exhausting_all_pairs_reports_exhausted() {
        let result: Result<FallbackOutcome<()>, FallbackError> =
            run_fallback(&policy(), |_, _| async { Err(AttemptError::ModelUnavailable) }).await;
        assert!(matches!(result, Err(FallbackError::Exhausted)));
    }
}
