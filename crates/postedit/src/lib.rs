//! Script Post-Editor (spec §4.5): cleans punctuation, capitalization,
//! and script-style line breaks in a timed script via a generative
//! model, preserving every timestamp and segment order.
//!
//! Delegates fallback/retry across (region, model) pairs to
//! `redub-llm-fallback` and oversized-input splitting to
//! `redub-chunker`. Grounded on the teacher's
//! `llm-proxy::provider::openrouter::Provider` shape (a thin
//! trait implemented per concrete backend, called through a shared
//! driver).

use async_trait::async_trait;
use redub_chunker::{self as chunker, ChunkError};
use redub_llm_fallback::{run_fallback, AttemptError, FallbackError, FallbackOutcome, FallbackPolicy};
use redub_segmenter::{parse_script_text, Script};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostEditError {
    #[error("no (region, model) pair produced a valid response")]
    Exhausted,
    #[error("input exceeds the single-call budget and chunking failed: {0}")]
    InputTooLarge(#[from] ChunkError),
    #[error("post-edited response was malformed: {0}")]
    MalformedResponse(String),
}

/// A generative-model backend able to clean up a rendered script. One
/// call is one (region, model) attempt; retries/fallback live in
/// `redub-llm-fallback`, not here.
#[async_trait]
pub trait PostEditClient: Send + Sync {
    async fn clean(&self, region: &str, model: &str, script_text: &str) -> Result<String, AttemptError>;
}

#[derive(Debug, Clone)]
pub struct PostEditConfig {
    pub single_call_budget_chars: usize,
    pub chunk_overlap_chars: usize,
    pub max_chunks: usize,
}

impl Default for PostEditConfig {
    fn default() -> Self {
        Self {
            single_call_budget_chars: 8_000,
            chunk_overlap_chars: 200,
            max_chunks: 50,
        }
    }
}

/// Runs the post-editor over `script`, returning the cleaned script
/// and the winning (region, model) pair for the Job to record.
pub async fn post_edit<C: PostEditClient>(
    script: &Script,
    client: &C,
    policy: &FallbackPolicy,
    config: &PostEditConfig,
) -> Result<FallbackOutcome<Script>, PostEditError> {
    let rendered = script.render();
    let original_timestamps: Vec<u64> = script.lines.iter().map(|l| l.timestamp_secs).collect();

    if rendered.chars().count() <= config.single_call_budget_chars {
        let outcome = run_single_call(client, policy, &rendered, &original_timestamps).await?;
        return Ok(outcome);
    }

    let chunks = chunker::split(
        &rendered,
        config.single_call_budget_chars,
        config.chunk_overlap_chars,
        config.max_chunks,
    )?;

    let mut cleaned_chunks = Vec::with_capacity(chunks.len());
    let mut last_pair = None;

    for chunk in &chunks {
        let outcome = run_single_call_raw(client, policy, chunk).await?;
        last_pair = Some((outcome.region.clone(), outcome.model.clone()));
        cleaned_chunks.push(outcome.value);
    }

    let merged = chunker::merge(&cleaned_chunks, config.chunk_overlap_chars);
    let script = parse_script_text(&merged).map_err(|e| PostEditError::MalformedResponse(e.to_string()))?;
    validate_timestamps(&script, &original_timestamps)?;

    let (region, model) = last_pair.expect("at least one chunk was processed");
    Ok(FallbackOutcome { value: script, region, model })
}

async fn run_single_call<C: PostEditClient>(
    client: &C,
    policy: &FallbackPolicy,
    rendered: &str,
    original_timestamps: &[u64],
) -> Result<FallbackOutcome<Script>, PostEditError> {
    let outcome = run_fallback(policy, |region, model| async move {
        let text = client.clean(&region, &model, rendered).await?;
        let script = parse_script_text(&text).map_err(|e| AttemptError::Transient(e.to_string()))?;
        validate_timestamps(&script, original_timestamps).map_err(|e| AttemptError::Transient(e.to_string()))?;
        Ok(script)
    })
    .await
    .map_err(|FallbackError::Exhausted| PostEditError::Exhausted)?;

    Ok(outcome)
}

async fn run_single_call_raw<C: PostEditClient>(
    client: &C,
    policy: &FallbackPolicy,
    chunk: &str,
) -> Result<FallbackOutcome<String>, PostEditError> {
    run_fallback(policy, |region, model| async move { client.clean(&region, &model, chunk).await })
        .await
        .map_err(|FallbackError::Exhausted| PostEditError::Exhausted)
}

fn validate_timestamps(script: &Script, original: &[u64]) -> Result<(), PostEditError> {
    let actual: Vec<u64> = script.lines.iter().map(|l| l.timestamp_secs).collect();
    if actual != original {
        return Err(PostEditError::MalformedResponse(
            "timestamp sequence changed or was reordered".into(),
        ));
    }
    Ok(())
}
