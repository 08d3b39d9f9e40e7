//! Chunked parallel synthesis (spec §4.7): split a script on segment
//! boundaries under a provider's per-call character cap, synthesize
//! chunks concurrently up to a bounded worker count, and stitch by
//! byte-level concatenation.
//!
//! Byte-level concatenation only produces valid audio when the
//! provider's output container actually concatenates that way (raw PCM
//! and most MP3 streams do; a container with global headers/trailers,
//! e.g. most MP4-based formats, does not). Per spec §4.7 this is the
//! provider adapter's responsibility, not this helper's: pick a
//! concat-safe container, or decode/recode once at each chunk boundary
//! before calling [`synthesize_chunked`].

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};
use redub_segmenter::{Script, TimedLine};
use redub_tts::TtsError;

/// Splits `script` into sub-scripts of at most `char_cap` characters
/// each, never splitting a line. A single line longer than `char_cap`
/// still gets its own chunk (the provider's cap is a soft batching
/// target, not a hard per-line limit).
pub fn split_into_synthesis_chunks(script: &Script, char_cap: usize) -> Vec<Script> {
    let mut chunks = Vec::new();
    let mut current: Vec<TimedLine> = Vec::new();
    let mut current_len = 0usize;

    for line in &script.lines {
        let line_len = line.text.chars().count();
        if !current.is_empty() && current_len + line_len > char_cap {
            chunks.push(Script { lines: std::mem::take(&mut current) });
            current_len = 0;
        }
        current_len += line_len;
        current.push(line.clone());
    }

    if !current.is_empty() {
        chunks.push(Script { lines: current });
    }

    chunks
}

/// Runs `synth(chunk)` over every chunk with at most `max_workers`
/// concurrent in flight, then concatenates the resulting byte streams
/// in original chunk order (never completion order).
pub async fn synthesize_chunked<F, Fut>(chunks: Vec<Script>, max_workers: usize, synth: F) -> Result<Vec<u8>, TtsError>
where
    F: Fn(Script) -> Fut,
    Fut: Future<Output = Result<Vec<u8>, TtsError>>,
{
    let results: Vec<Vec<u8>> = stream::iter(chunks.into_iter().map(|chunk| synth(chunk)))
        .buffered(max_workers.max(1))
        .try_collect()
        .await?;

    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn script(lines: Vec<(u64, &str)>) -> Script {
        Script {
            lines: lines
                .into_iter()
                .map(|(ts, text)| TimedLine {
                    timestamp_secs: ts,
                    text: text.to_string(),
                    paragraph_break_before: false,
                })
                .collect(),
        }
    }

    #[test]
    fn splits_without_breaking_lines() {
        let s = script(vec![(0, "aaaaa"), (1, "bbbbb"), (2, "ccccc")]);
        let chunks = split_into_synthesis_chunks(&s, 8);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].lines.len(), 1);
        assert_eq!(chunks[1].lines.len(), 2);
    }

    #[tokio::test]
    async fn concatenates_in_original_order_regardless_of_completion_order() {
        let s = script(vec![(0, "a"), (1, "b"), (2, "c")]);
        let chunks = split_into_synthesis_chunks(&s, 1);
        assert_eq!(chunks.len(), 3);

        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let result = synthesize_chunked(chunks, 2, {
            let concurrent = concurrent.clone();
            let max_concurrent = max_concurrent.clone();
            move |chunk| {
                let concurrent = concurrent.clone();
                let max_concurrent = max_concurrent.clone();
                async move {
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(now, Ordering::SeqCst);
                    let text = chunk.lines[0].text.clone();
                    if text == "a" {
                        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    }
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                    Ok(text.into_bytes())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, b"abc".to_vec());
        assert!(max_concurrent.load(Ordering::SeqCst) <= 2);
    }
}
