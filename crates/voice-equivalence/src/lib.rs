//! Voice equivalence (spec §4.6 / §3 `ProviderCatalog`): a static
//! cross-provider voice mapping table, falling back to nearest-voice
//! search by (language, gender, tier, tone tag) on cache miss.
//!
//! No teacher file maps TTS voices across providers (the teacher's own
//! TTS surface is a local on-device model); this crate is grounded on
//! the *shape* of `transcribe-proxy/src/hyprnote_routing.rs`'s static
//! priority/equivalence table pattern instead, applied to a new
//! domain.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Gender {
    Male,
    Female,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[schema(as = VoiceQualityTier)]
pub enum QualityTier {
    Standard,
    Enhanced,
    Premium,
    Studio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VoiceProfile {
    pub provider: String,
    pub voice_id: String,
    pub language_tag: String,
    pub gender: Gender,
    pub quality_tier: QualityTier,
    pub tone_tag: Option<String>,
    pub price_per_1k_chars: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VoiceKey {
    provider: String,
    voice_id: String,
}

/// Provider → voice catalog, plus a static (source voice, target
/// provider) → equivalent voice mapping table for popular voices.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    voices: HashMap<String, Vec<VoiceProfile>>,
    equivalences: HashMap<(VoiceKey, String), String>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_voice(&mut self, profile: VoiceProfile) {
        self.voices.entry(profile.provider.clone()).or_default().push(profile);
    }

    /// Declares a static equivalence: `source` on `source.provider` is
    /// the preferred match on `target_provider`.
    pub fn declare_equivalence(&mut self, source: &VoiceProfile, target_provider: &str, target_voice_id: &str) {
        let key = VoiceKey {
            provider: source.provider.clone(),
            voice_id: source.voice_id.clone(),
        };
        self.equivalences.insert((key, target_provider.to_string()), target_voice_id.to_string());
    }

    pub fn voices_for(&self, provider: &str) -> &[VoiceProfile] {
        self.voices.get(provider).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn find(&self, provider: &str, voice_id: &str) -> Option<&VoiceProfile> {
        self.voices_for(provider).iter().find(|v| v.voice_id == voice_id)
    }

    /// Resolves the equivalent voice for `source` on `target_provider`.
    /// Reflexive on identity: asking for a voice's equivalent on its
    /// own provider always returns the voice itself. On cache miss,
    /// falls back to nearest-voice search (same language → same
    /// gender → same quality tier → same tone tag, ties broken by
    /// lower price).
    pub fn equivalent<'a>(&'a self, source: &VoiceProfile, target_provider: &'a str) -> Option<&'a VoiceProfile> {
        if source.provider == target_provider {
            return self.find(target_provider, &source.voice_id);
        }

        let key = VoiceKey {
            provider: source.provider.clone(),
            voice_id: source.voice_id.clone(),
        };
        if let Some(mapped_id) = self.equivalences.get(&(key, target_provider.to_string())) {
            if let Some(v) = self.find(target_provider, mapped_id) {
                return Some(v);
            }
        }

        nearest_voice(self.voices_for(target_provider), source)
    }
}

/// Nearest-voice search: filters candidates progressively by
/// (language, gender, quality tier, tone tag), keeping the broadest
/// surviving set at each step, then breaks ties by lowest price.
fn nearest_voice<'a>(candidates: &'a [VoiceProfile], source: &VoiceProfile) -> Option<&'a VoiceProfile> {
    let mut pool: Vec<&VoiceProfile> = candidates.iter().filter(|v| v.language_tag == source.language_tag).collect();
    if pool.is_empty() {
        return None;
    }

    let by_gender: Vec<&VoiceProfile> = pool.iter().copied().filter(|v| v.gender == source.gender).collect();
    if !by_gender.is_empty() {
        pool = by_gender;
    }

    let by_tier: Vec<&VoiceProfile> = pool.iter().copied().filter(|v| v.quality_tier == source.quality_tier).collect();
    if !by_tier.is_empty() {
        pool = by_tier;
    }

    let by_tone: Vec<&VoiceProfile> = pool.iter().copied().filter(|v| v.tone_tag == source.tone_tag).collect();
    if !by_tone.is_empty() {
        pool = by_tone;
    }

    pool.into_iter().min_by(|a, b| a.price_per_1k_chars.partial_cmp(&b.price_per_1k_chars).unwrap())
}
