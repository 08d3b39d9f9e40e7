//! Error kinds (spec §7) — not type names, but every kind enumerated
//! there has a variant here so every stage and the HTTP layer can match
//! on the same vocabulary.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("job not found")]
    NotFound,
    #[error("artifact not ready for this job's current stage")]
    ArtifactNotReady,
    #[error("language {0} is not supported")]
    UnsupportedLanguage(String),
    #[error("voice {0} not found")]
    VoiceNotFound(String),
    #[error("source media unavailable: {0}")]
    SourceUnavailable(String),
    #[error("remote service quota exceeded")]
    QuotaExceeded,
    #[error("transient network error: {0}")]
    TransientNetwork(String),
    #[error("transient remote error: {0}")]
    TransientRemote(String),
    #[error("projected cost {projected:.4} exceeds cap {cap:.4}")]
    BudgetExceeded { projected: f64, cap: f64 },
    #[error("job was cancelled")]
    Cancelled,
    #[error("stage failed: {0}")]
    StageFailed(String),
}

impl From<redub_recognizer::RecognizerError> for CoreError {
    fn from(err: redub_recognizer::RecognizerError) -> Self {
        use redub_recognizer::RecognizerError as R;
        match err {
            R::QuotaExceeded => CoreError::QuotaExceeded,
            R::UnsupportedLanguage(lang) => CoreError::UnsupportedLanguage(lang),
            R::AudioFormatRejected(reason) => CoreError::InvalidRequest(reason),
            R::TransientNetwork(reason) => CoreError::TransientNetwork(reason),
            R::Cancelled => CoreError::Cancelled,
        }
    }
}

impl From<redub_postedit::PostEditError> for CoreError {
    fn from(err: redub_postedit::PostEditError) -> Self {
        CoreError::StageFailed(err.to_string())
    }
}

impl From<redub_translate::TranslateError> for CoreError {
    fn from(err: redub_translate::TranslateError) -> Self {
        CoreError::StageFailed(err.to_string())
    }
}

impl From<redub_tts::TtsError> for CoreError {
    fn from(err: redub_tts::TtsError) -> Self {
        use redub_tts::TtsError as T;
        match err {
            T::VoiceNotFound { voice_id, .. } => CoreError::VoiceNotFound(voice_id),
            T::UnsupportedLanguage(lang) => CoreError::UnsupportedLanguage(lang),
            T::QuotaExceeded => CoreError::QuotaExceeded,
            other => CoreError::StageFailed(other.to_string()),
        }
    }
}

impl From<redub_muxer::MuxerError> for CoreError {
    fn from(err: redub_muxer::MuxerError) -> Self {
        match err {
            redub_muxer::MuxerError::SourceUnavailable(reason) => CoreError::SourceUnavailable(reason),
            redub_muxer::MuxerError::MuxerFailed { exit_code, stderr_last_line } => {
                CoreError::StageFailed(format!("transcoder exited {exit_code:?}: {stderr_last_line}"))
            }
        }
    }
}

impl From<redub_artifacts::ArtifactError> for CoreError {
    fn from(err: redub_artifacts::ArtifactError) -> Self {
        CoreError::StageFailed(err.to_string())
    }
}

impl From<crate::media::MediaError> for CoreError {
    fn from(err: crate::media::MediaError) -> Self {
        match err {
            crate::media::MediaError::DownloadFailed(reason) => CoreError::SourceUnavailable(reason),
            other => CoreError::StageFailed(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::StageFailed(err.to_string())
    }
}
