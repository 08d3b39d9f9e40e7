//! Translator (spec §4.5): translates a timed script into a target
//! language while preserving timing. Shares the fallback/retry driver
//! with the Post-Editor (`redub-llm-fallback`) and the chunker for
//! oversized input, differing only in its prompt and validation rules.

use std::collections::HashMap;

use async_trait::async_trait;
use redub_chunker::{self as chunker, ChunkError};
use redub_llm_fallback::{run_fallback, AttemptError, FallbackError, FallbackOutcome, FallbackPolicy};
use redub_segmenter::{parse_script_text, Script};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ContextTag {
    Legal,
    Spiritual,
    Marketing,
    Scientific,
    Educational,
    News,
    Casual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[schema(as = TranslationQualityTier)]
pub enum QualityTier {
    Fast,
    Detailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TranslationParams {
    pub target_language: String,
    pub context_tag: ContextTag,
    pub target_audience: String,
    pub desired_tone: String,
    pub quality_tier: QualityTier,
}

/// Canned instruction sets keyed by context tag, so any rewrite of the
/// prompt family is reproducible from configuration rather than
/// scattered through call sites.
#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub instructions: HashMap<ContextTag, String>,
    pub single_call_budget_chars: usize,
    pub chunk_overlap_chars: usize,
    pub max_chunks: usize,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        let mut instructions = HashMap::new();
        instructions.insert(
            ContextTag::Legal,
            "Translate precisely, preserving defined terms and formal register; do not paraphrase obligations.".to_string(),
        );
        instructions.insert(
            ContextTag::Spiritual,
            "Preserve reverent tone and any scriptural or liturgical phrasing conventions of the target language.".to_string(),
        );
        instructions.insert(
            ContextTag::Marketing,
            "Favor persuasive, idiomatic phrasing over literal translation; keep brand names untranslated.".to_string(),
        );
        instructions.insert(
            ContextTag::Scientific,
            "Preserve technical terminology and units; do not simplify precision for readability.".to_string(),
        );
        instructions.insert(
            ContextTag::Educational,
            "Favor clear, simple phrasing suitable for learners; expand idioms that don't translate directly.".to_string(),
        );
        instructions.insert(
            ContextTag::News,
            "Preserve a neutral, factual register and attribution phrasing.".to_string(),
        );
        instructions.insert(
            ContextTag::Casual,
            "Use natural, conversational phrasing appropriate to everyday speech.".to_string(),
        );
        Self {
            instructions,
            single_call_budget_chars: 8_000,
            chunk_overlap_chars: 200,
            max_chunks: 50,
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("no (region, model) pair produced a valid response")]
    Exhausted,
    #[error("input exceeds the single-call budget and chunking failed: {0}")]
    InputTooLarge(#[from] ChunkError),
    #[error("translated response was malformed: {0}")]
    MalformedResponse(String),
    #[error("no canned instructions configured for context tag {0:?}")]
    MissingInstructions(ContextTag),
}

#[async_trait]
pub trait TranslateClient: Send + Sync {
    async fn translate(
        &self,
        region: &str,
        model: &str,
        instructions: &str,
        rendered_script: &str,
        params: &TranslationParams,
    ) -> Result<String, AttemptError>;
}

pub async fn translate<C: TranslateClient>(
    script: &Script,
    client: &C,
    policy: &FallbackPolicy,
    params: &TranslationParams,
    config: &TranslateConfig,
) -> Result<FallbackOutcome<Script>, TranslateError> {
    let instructions = config
        .instructions
        .get(&params.context_tag)
        .ok_or(TranslateError::MissingInstructions(params.context_tag))?
        .clone();

    let rendered = script.render();
    let source_char_count = rendered.chars().count();
    let allowed_timestamps: Vec<u64> = script.lines.iter().map(|l| l.timestamp_secs).collect();

    if rendered.chars().count() <= config.single_call_budget_chars {
        return run_single_call(client, policy, &instructions, &rendered, params, &allowed_timestamps, source_char_count).await;
    }

    let chunks = chunker::split(&rendered, config.single_call_budget_chars, config.chunk_overlap_chars, config.max_chunks)?;

    let mut translated_chunks = Vec::with_capacity(chunks.len());
    let mut last_pair = None;

    for chunk in &chunks {
        let outcome = run_fallback(policy, |region, model| {
            let instructions = instructions.clone();
            let chunk = chunk.clone();
            async move { client.translate(&region, &model, &instructions, &chunk, params).await }
        })
        .await
        .map_err(|FallbackError::Exhausted| TranslateError::Exhausted)?;
        last_pair = Some((outcome.region, outcome.model));
        translated_chunks.push(outcome.value);
    }

    let merged = chunker::merge(&translated_chunks, config.chunk_overlap_chars);
    let script = parse_script_text(&merged).map_err(|e| TranslateError::MalformedResponse(e.to_string()))?;
    validate_translation(&script, &allowed_timestamps, source_char_count)?;

    let (region, model) = last_pair.expect("at least one chunk was processed");
    Ok(FallbackOutcome { value: script, region, model })
}

#[allow(clippy::too_many_arguments)]
async fn run_single_call<C: TranslateClient>(
    client: &C,
    policy: &FallbackPolicy,
    instructions: &str,
    rendered: &str,
    params: &TranslationParams,
    allowed_timestamps: &[u64],
    source_char_count: usize,
) -> Result<FallbackOutcome<Script>, TranslateError> {
    run_fallback(policy, |region, model| async move {
        let text = client.translate(&region, &model, instructions, rendered, params).await?;
        let script = parse_script_text(&text).map_err(|e| AttemptError::Transient(e.to_string()))?;
        validate_translation(&script, allowed_timestamps, source_char_count)
            .map_err(|e| AttemptError::Transient(e.to_string()))?;
        Ok(script)
    })
    .await
    .map_err(|FallbackError::Exhausted| TranslateError::Exhausted)
}

/// Enforces the translator's timing-preservation rules: the output
/// timestamps must be exactly the multiset the source emitted (spec §8
/// `multiset(timestamps(O)) = multiset(timestamps(I))`, spec §4.5
/// "every timestamp from the input appears exactly once in the
/// output"), in non-decreasing order, with the total character count
/// staying within `[0.5x, 2.0x]` of the source (spec §4.5 Validation).
fn validate_translation(script: &Script, allowed_timestamps: &[u64], source_char_count: usize) -> Result<(), TranslateError> {
    let mut remaining: HashMap<u64, usize> = HashMap::new();
    for ts in allowed_timestamps {
        *remaining.entry(*ts).or_insert(0) += 1;
    }

    let mut prev = None;
    for line in &script.lines {
        match remaining.get_mut(&line.timestamp_secs) {
            Some(count) if *count > 0 => *count -= 1,
            _ => {
                return Err(TranslateError::MalformedResponse(format!(
                    "timestamp {} was not present in the source (or appears more often than the source)",
                    line.timestamp_secs
                )));
            }
        }
        if let Some(p) = prev {
            if line.timestamp_secs < p {
                return Err(TranslateError::MalformedResponse("timestamp sequence is not non-decreasing".into()));
            }
        }
        prev = Some(line.timestamp_secs);
    }

    if remaining.values().any(|&count| count > 0) {
        return Err(TranslateError::MalformedResponse(
            "output is missing one or more timestamps present in the source".into(),
        ));
    }

    let output_char_count: usize = script.lines.iter().map(|l| l.text.chars().count()).sum();
    let lower = (source_char_count as f64) * 0.5;
    let upper = (source_char_count as f64) * 2.0;
    if source_char_count > 0 && ((output_char_count as f64) < lower || (output_char_count as f64) > upper) {
        return Err(TranslateError::MalformedResponse(format!(
            "output character count {output_char_count} outside [{lower}, {upper}] of source {source_char_count}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use redub_segmenter::{segment, RecognizedWord};

    fn sample_script() -> Script {
        let words = vec![
            RecognizedWord {
                text: "hello".into(),
                start_secs: 0.0,
                end_secs: 0.3,
                confidence: 0.9,
            },
            RecognizedWord {
                text: "world.".into(),
                start_secs: 5.0,
                end_secs: 5.3,
                confidence: 0.9,
            },
        ];
        segment(&words, 100).0
    }

    fn policy() -> FallbackPolicy {
        FallbackPolicy {
            regions: vec!["us".into()],
            models: vec!["recommended-fast".into()],
            max_retries_per_pair: 1,
            max_retry_delay: std::time::Duration::from_millis(5),
        }
    }

    fn params() -> TranslationParams {
        TranslationParams {
            target_language: "es".into(),
            context_tag: ContextTag::Casual,
            target_audience: "general".into(),
            desired_tone: "friendly".into(),
            quality_tier: QualityTier::Fast,
        }
    }

    struct EchoClient;

    #[async_trait]
    impl TranslateClient for EchoClient {
        async fn translate(
            &self,
            _region: &str,
            _model: &str,
            _instructions: &str,
            rendered_script: &str,
            _params: &TranslationParams,
        ) -> Result<String, AttemptError> {
            Ok(rendered_script.to_string())
        }
    }

    #[tokio::test]
    async fn echoed_script_passes_validation() {
        let script = sample_script();
        let outcome = translate(&script, &EchoClient, &policy(), &params(), &TranslateConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome.value.lines.len(), script.lines.len());
    }

    struct InventedTimestampClient;

    #[async_trait]
    impl TranslateClient for InventedTimestampClient {
        async fn translate(
            &self,
            _region: &str,
            _model: &str,
            _instructions: &str,
            _rendered_script: &str,
            _params: &TranslationParams,
        ) -> Result<String, AttemptError> {
            Ok("[0:00:00] hola\n[0:00:09] mundo\n".to_string())
        }
    }

    #[tokio::test]
    async fn invented_timestamp_is_rejected() {
        let script = sample_script();
        let result = translate(&script, &InventedTimestampClient, &policy(), &params(), &TranslateConfig::default()).await;
        assert!(matches!(result, Err(TranslateError::Exhausted)));
    }

    struct DroppedLineClient;

    #[async_trait]
    impl TranslateClient for DroppedLineClient {
        async fn translate(
            &self,
            _region: &str,
            _model: &str,
            _instructions: &str,
            _rendered_script: &str,
            _params: &TranslationParams,
        ) -> Result<String, AttemptError> {
            let padding = "x".repeat(50);
            Ok(format!("[0:00:00] {padding}\n\n[0:00:09] {padding}\n"))
        }
    }

    #[tokio::test]
    async fn dropped_timestamp_is_rejected_even_in_order_and_in_band() {
        let words = vec![
            RecognizedWord {
                text: "x".repeat(50),
                start_secs: 0.0,
                end_secs: 0.3,
                confidence: 0.9,
            },
            RecognizedWord {
                text: "x".repeat(50),
                start_secs: 5.0,
                end_secs: 5.3,
                confidence: 0.9,
            },
            RecognizedWord {
                text: "x".repeat(50),
                start_secs: 9.0,
                end_secs: 9.3,
                confidence: 0.9,
            },
        ];
        let (script, _) = segment(&words, 100);
        assert_eq!(script.lines.len(), 3);

        // The response below drops the [0:00:05] line entirely while keeping
        // the remaining two in order and well within the char-count band —
        // exactly the case a pure subset + non-decreasing check would miss.
        let result = translate(&script, &DroppedLineClient, &policy(), &params(), &TranslateConfig::default()).await;
        assert!(matches!(result, Err(TranslateError::Exhausted)));
    }

    struct BloatedClient;

    #[async_trait]
    impl TranslateClient for BloatedClient {
        async fn translate(
            &self,
            _region: &str,
            _model: &str,
            _instructions: &str,
            rendered_script: &str,
            _params: &TranslationParams,
        ) -> Result<String, AttemptError> {
            let bloated = rendered_script.repeat(5);
            Ok(bloated)
        }
    }

    #[tokio::test]
    async fn wildly_longer_response_is_rejected() {
        let script = sample_script();
        let result = translate(&script, &BloatedClient, &policy(), &params(), &TranslateConfig::default()).await;
        assert!(matches!(result, Err(TranslateError::Exhausted)));
    }

    #[test]
    fn every_context_tag_has_canned_instructions() {
        let config = TranslateConfig::default();
        for tag in [
            ContextTag::Legal,
            ContextTag::Spiritual,
            ContextTag::Marketing,
            ContextTag::Scientific,
            ContextTag::Educational,
            ContextTag::News,
            ContextTag::Casual,
        ] {
            assert!(config.instructions.contains_key(&tag));
        }
    }
}
