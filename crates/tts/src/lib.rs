//! TTS Abstraction (spec §4.6): a uniform capability surface over
//! pluggable text-to-speech providers, plus the provider-selection
//! policy the orchestrator uses for `{provider=X}` / `{provider=auto}`
//! / `{provider=auto, cost_first=true}`.
//!
//! No teacher crate speaks to a TTS vendor; this is modeled on the
//! shape of `owhisper-client`'s adapter trait (one capability trait,
//! many concrete backends behind it) applied to speech synthesis.

use async_trait::async_trait;
use redub_segmenter::Script;
use redub_voice_equivalence::{ProviderCatalog, QualityTier, VoiceProfile};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub amount: f64,
    pub currency: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    pub audio_bytes: Vec<u8>,
    pub container: String,
    pub duration_secs: f64,
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("tts provider {0} is not configured")]
    ProviderNotFound(String),
    #[error("voice {voice_id} does not exist on provider {provider}")]
    VoiceNotFound { provider: String, voice_id: String },
    #[error("no configured provider supports the requested language/voice")]
    NoProviderAvailable,
    #[error("language {0} is not supported")]
    UnsupportedLanguage(String),
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("quota exceeded")]
    QuotaExceeded,
}

/// The capability surface every concrete TTS adapter implements (spec
/// §4.6). `list_voices` and `quote` are cheap/local (rate-card driven);
/// `synthesize` is the one network call.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &str;
    fn list_voices(&self, language_filter: Option<&str>) -> Vec<VoiceProfile>;
    fn quote(&self, text: &str, voice_id: &str, quality: QualityTier) -> Result<CostEstimate, TtsError>;
    async fn synthesize(
        &self,
        script: &Script,
        voice_id: &str,
        quality: QualityTier,
        output_format: &str,
    ) -> Result<SynthesisResult, TtsError>;
    fn supports(&self, language_tag: &str) -> bool;
}

/// What the orchestrator asked for, before resolving to a concrete
/// provider + voice.
#[derive(Debug, Clone)]
pub enum ProviderSelection {
    Explicit { provider: String, voice_id: String },
    Auto { requested_voice: VoiceProfile, cost_first: bool },
}

/// Resolves `selection` to a concrete provider and voice per spec
/// §4.6's provider-selection policy. Explicit selection never silently
/// remaps: an unknown voice id on the named provider is always a hard
/// `VoiceNotFound`.
pub fn select_provider<'a>(
    providers: &'a [Box<dyn TtsProvider>],
    catalog: &ProviderCatalog,
    selection: &ProviderSelection,
    language_tag: &str,
) -> Result<(&'a dyn TtsProvider, VoiceProfile), TtsError> {
    match selection {
        ProviderSelection::Explicit { provider, voice_id } => {
            let p = providers
                .iter()
                .find(|p| p.name() == provider)
                .ok_or_else(|| TtsError::ProviderNotFound(provider.clone()))?;
            let voice = p
                .list_voices(None)
                .into_iter()
                .find(|v| &v.voice_id == voice_id)
                .ok_or_else(|| TtsError::VoiceNotFound {
                    provider: provider.clone(),
                    voice_id: voice_id.clone(),
                })?;
            Ok((p.as_ref(), voice))
        }
        ProviderSelection::Auto { requested_voice, cost_first } => {
            let mut candidates: Vec<(&dyn TtsProvider, VoiceProfile)> = Vec::new();
            for p in providers {
                if !p.supports(language_tag) {
                    continue;
                }
                if let Some(equiv) = catalog.equivalent(requested_voice, p.name()) {
                    candidates.push((p.as_ref(), equiv.clone()));
                }
            }

            if candidates.is_empty() {
                return Err(TtsError::NoProviderAvailable);
            }

            if *cost_first {
                candidates.sort_by(|a, b| a.1.price_per_1k_chars.partial_cmp(&b.1.price_per_1k_chars).unwrap());
            } else {
                candidates.sort_by(|a, b| {
                    b.1.quality_tier
                        .cmp(&a.1.quality_tier)
                        .then_with(|| a.1.price_per_1k_chars.partial_cmp(&b.1.price_per_1k_chars).unwrap())
                });
            }

            Ok(candidates.into_iter().next().unwrap())
        }
    }
}
