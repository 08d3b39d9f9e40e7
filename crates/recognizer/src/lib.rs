//! Recognizer Adapter (spec §4.4): a uniform `transcribe` surface over
//! a synchronous path for small inputs and a staged (submit + poll)
//! path for large ones.
//!
//! Grounded on the teacher's `owhisper-client::adapter` trait split
//! (one adapter trait per transport shape) and
//! `transcribe-proxy::routes::batch::sync`'s use of bounded-attempt
//! backoff around a remote batch call.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use rand::Rng;
use redub_segmenter::RecognizedWord;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecognizerError {
    #[error("recognizer quota exceeded")]
    QuotaExceeded,
    #[error("language {0} is not supported by the recognizer")]
    UnsupportedLanguage(String),
    #[error("audio format rejected: {0}")]
    AudioFormatRejected(String),
    #[error("transient network error: {0}")]
    TransientNetwork(String),
    #[error("recognition job cancelled")]
    Cancelled,
}

impl RecognizerError {
    fn is_retryable(&self) -> bool {
        matches!(self, RecognizerError::TransientNetwork(_) | RecognizerError::QuotaExceeded)
    }
}

/// Size/duration metadata needed to pick the sync vs staged path,
/// known once the audio has been decoded (spec §4.1 stage (c)).
#[derive(Debug, Clone, Copy)]
pub struct AudioMeta {
    pub size_bytes: u64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub sync_limit_bytes: u64,
    pub sync_duration_cap_secs: f64,
    pub max_quota_retries: usize,
    pub poll_initial_interval: Duration,
    pub poll_max_interval: Duration,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            sync_limit_bytes: 10 * 1024 * 1024,
            sync_duration_cap_secs: 600.0,
            max_quota_retries: 5,
            poll_initial_interval: Duration::from_secs(2),
            poll_max_interval: Duration::from_secs(30),
        }
    }
}

/// A handle to a submitted staged recognition job.
#[derive(Debug, Clone)]
pub struct StagedHandle {
    pub remote_job_id: String,
    pub expected_duration: Duration,
}

#[derive(Debug)]
pub enum PollStatus {
    InProgress,
    Done(Vec<RecognizedWord>),
}

/// The remote recognizer transport. Implementations speak to whatever
/// concrete speech-recognition service is configured; this crate only
/// owns the sync/staged decision, polling cadence, and retry policy.
#[async_trait]
pub trait SttProvider: Send + Sync {
    async fn transcribe_sync(
        &self,
        audio_path: &Path,
        language_tag: &str,
        breath_detection: bool,
    ) -> Result<Vec<RecognizedWord>, RecognizerError>;

    async fn submit_staged(
        &self,
        audio_path: &Path,
        language_tag: &str,
        breath_detection: bool,
    ) -> Result<StagedHandle, RecognizerError>;

    async fn poll(&self, handle: &StagedHandle) -> Result<PollStatus, RecognizerError>;
}

pub struct RecognizerAdapter<P: SttProvider> {
    provider: P,
    config: RecognizerConfig,
}

impl<P: SttProvider> RecognizerAdapter<P> {
    pub fn new(provider: P, config: RecognizerConfig) -> Self {
        Self { provider, config }
    }

    fn use_sync_path(&self, meta: AudioMeta) -> bool {
        meta.size_bytes <= self.config.sync_limit_bytes && meta.duration_secs <= self.config.sync_duration_cap_secs
    }

    /// Transcribes `audio_path`, choosing the sync or staged path per
    /// the decision rule in spec §4.4. `on_progress` receives
    /// sub-progress in `[0, 100]`; for the sync path it only ever
    /// receives a single terminal `100`.
    pub async fn transcribe(
        &self,
        audio_path: &Path,
        meta: AudioMeta,
        language_tag: &str,
        breath_detection: bool,
        mut on_progress: impl FnMut(u32) + Send,
        mut is_cancelled: impl FnMut() -> bool + Send,
    ) -> Result<Vec<RecognizedWord>, RecognizerError> {
        if self.use_sync_path(meta) {
            let result = self.with_quota_retry(|| self.provider.transcribe_sync(audio_path, language_tag, breath_detection)).await?;
            on_progress(100);
            return Ok(result);
        }

        let handle = self
            .with_quota_retry(|| self.provider.submit_staged(audio_path, language_tag, breath_detection))
            .await?;

        let started = std::time::Instant::now();
        let mut interval = self.config.poll_initial_interval;

        loop {
            if is_cancelled() {
                return Err(RecognizerError::Cancelled);
            }

            let elapsed = started.elapsed().as_secs_f64();
            let expected = handle.expected_duration.as_secs_f64().max(1.0);
            let progress = ((elapsed / expected) * 100.0).min(90.0) as u32;
            on_progress(progress);

            match self.with_quota_retry(|| self.provider.poll(&handle)).await? {
                PollStatus::Done(words) => {
                    on_progress(100);
                    return Ok(words);
                }
                PollStatus::InProgress => {
                    tokio::time::sleep(jittered(interval)).await;
                    interval = (interval * 3 / 2).min(self.config.poll_max_interval);
                }
            }
        }
    }

    async fn with_quota_retry<T, F, Fut>(&self, call: F) -> Result<T, RecognizerError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, RecognizerError>>,
    {
        let backoff = ExponentialBuilder::default()
            .with_jitter()
            .with_max_times(self.config.max_quota_retries);

        (|| call())
            .retry(backoff)
            .when(|e: &RecognizerError| e.is_retryable())
            .notify(|err, dur| {
                tracing::warn!(?err, delay_ms = dur.as_millis() as u64, "retrying recognizer call");
            })
            .await
    }
}

fn jittered(base: Duration) -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..=(base.as_millis() as u64 / 4).max(1));
    base + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeProvider {
        sync_calls: Arc<AtomicUsize>,
        poll_calls: Arc<AtomicUsize>,
        fail_times: usize,
    }

    #[async_trait]
    impl SttProvider for FakeProvider {
        async fn transcribe_sync(
            &self,
            _audio_path: &Path,
            _language_tag: &str,
            _breath_detection: bool,
        ) -> Result<Vec<RecognizedWord>, RecognizerError> {
            let n = self.sync_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(RecognizerError::TransientNetwork("flaky".into()));
            }
            Ok(vec![RecognizedWord {
                text: "hi".into(),
                start_secs: 0.0,
                end_secs: 0.3,
                confidence: 0.9,
            }])
        }

        async fn submit_staged(
            &self,
            _audio_path: &Path,
            _language_tag: &str,
            _breath_detection: bool,
        ) -> Result<StagedHandle, RecognizerError> {
            Ok(StagedHandle {
                remote_job_id: "job-1".into(),
                expected_duration: Duration::from_millis(10),
            })
        }

        async fn poll(&self, _handle: &StagedHandle) -> Result<PollStatus, RecognizerError> {
            let n = self.poll_calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Ok(PollStatus::InProgress)
            } else {
                Ok(PollStatus::Done(vec![RecognizedWord {
                    text: "done".into(),
                    start_secs: 0.0,
                    end_secs: 1.0,
                    confidence: 0.99,
                }]))
            }
        }
    }

    fn small_meta() -> AudioMeta {
        AudioMeta {
            size_bytes: 1024,
            duration_secs: 5.0,
        }
    }

    fn large_meta() -> AudioMeta {
        AudioMeta {
            size_bytes: 50 * 1024 * 1024,
            duration_secs: 1200.0,
        }
    }

    #[tokio::test]
    async fn sync_path_chosen_for_small_audio() {
        let provider = FakeProvider {
            sync_calls: Arc::new(AtomicUsize::new(0)),
            poll_calls: Arc::new(AtomicUsize::new(0)),
            fail_times: 0,
        };
        let adapter = RecognizerAdapter::new(provider, RecognizerConfig::default());
        let mut last_progress = 0;
        let result = adapter
            .transcribe(Path::new("/tmp/a.wav"), small_meta(), "en", false, |p| last_progress = p, || false)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(last_progress, 100);
    }

    #[tokio::test]
    async fn staged_path_chosen_for_large_audio_and_polls_to_completion() {
        let provider = FakeProvider {
            sync_calls: Arc::new(AtomicUsize::new(0)),
            poll_calls: Arc::new(AtomicUsize::new(0)),
            fail_times: 0,
        };
        let mut config = RecognizerConfig::default();
        config.poll_initial_interval = Duration::from_millis(1);
        config.poll_max_interval = Duration::from_millis(2);
        let adapter = RecognizerAdapter::new(provider, config);

        let mut progress_values = Vec::new();
        let result = adapter
            .transcribe(Path::new("/tmp/a.wav"), large_meta(), "en", false, |p| progress_values.push(p), || false)
            .await
            .unwrap();

        assert_eq!(result[0].text, "done");
        assert!(progress_values.iter().all(|p| *p <= 100));
        assert_eq!(*progress_values.last().unwrap(), 100);
    }

    #[tokio::test]
    async fn transient_errors_retry_before_succeeding() {
        let provider = FakeProvider {
            sync_calls: Arc::new(AtomicUsize::new(0)),
            poll_calls: Arc::new(AtomicUsize::new(0)),
            fail_times: 2,
        };
        let adapter = RecognizerAdapter::new(provider, RecognizerConfig::default());
        let result = adapter
            .transcribe(Path::new("/tmp/a.wav"), small_meta(), "en", false, |_| {}, || false)
            .await
            .unwrap();
        assert_eq!(result[0].text, "hi");
    }

    #[tokio::test]
    async fn cancellation_short_circuits_staged_polling() {
        let provider = FakeProvider {
            sync_calls: Arc::new(AtomicUsize::new(0)),
            poll_calls: Arc::new(AtomicUsize::new(0)),
            fail_times: 0,
        };
        let adapter = RecognizerAdapter::new(provider, RecognizerConfig::default());
        let result = adapter
            .transcribe(Path::new("/tmp/a.wav"), large_meta(), "en", false, |_| {}, || true)
            .await;
        assert!(matches!(result, Err(RecognizerError::Cancelled)));
    }
}
