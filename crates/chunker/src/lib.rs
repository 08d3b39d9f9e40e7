//! Text chunker (spec §4.2): splits long text on sentence or
//! timestamp-line boundaries with a trailing overlap window, and
//! stitches per-chunk outputs back together.
//!
//! Grounded on the teacher's `transcribe-proxy` batching style, which
//! splits oversized inputs before handing them to a per-call-limited
//! remote service and reassembles the pieces on the way back.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("input requires more than max_chunks={max_chunks} chunks at size={size}")]
    InputTooLarge { max_chunks: usize, size: usize },
}

const TERMINAL_PUNCTUATION: [char; 4] = ['.', '!', '?', '…'];

/// Splits `text` into chunks of at most `size` characters, each
/// carrying a trailing `overlap`-character window from the following
/// content. Prefers to end a chunk right after terminal punctuation or
/// right before a `[hh:mm:ss]` timestamp line; falls back to a hard
/// cut at `size` when no such boundary exists.
pub fn split(text: &str, size: usize, overlap: usize, max_chunks: usize) -> Result<Vec<String>, ChunkError> {
    assert!(size > 0, "chunk size must be positive");

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(vec![]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        if chunks.len() >= max_chunks {
            return Err(ChunkError::InputTooLarge { max_chunks, size });
        }

        let end = find_boundary(&chars, start, size);
        let overlap_end = (end + overlap).min(chars.len());
        chunks.push(chars[start..overlap_end].iter().collect());

        if overlap_end >= chars.len() {
            break;
        }
        start = end;
    }

    Ok(chunks)
}

/// Finds the end of the next chunk starting at `start`, preferring (in
/// order) a timestamp-line boundary, then a terminal-punctuation
/// boundary, within `(start, start + size]`; falls back to a hard cut.
fn find_boundary(chars: &[char], start: usize, size: usize) -> usize {
    let hard_limit = (start + size).min(chars.len());
    if hard_limit >= chars.len() {
        return chars.len();
    }

    for i in (start + 1..=hard_limit).rev() {
        if i < chars.len() && chars[i - 1] == '\n' && chars[i] == '[' {
            return i;
        }
    }

    for i in (start + 1..hard_limit).rev() {
        if TERMINAL_PUNCTUATION.contains(&chars[i - 1]) && chars[i].is_whitespace() {
            return i;
        }
    }

    hard_limit
}

/// Reassembles `chunks` produced by [`split`] with the same `overlap`
/// into the original text, stripping the duplicated overlap prefix
/// from every chunk after the first by longest-common-suffix matching
/// against the tail of the already-merged output.
pub fn merge(chunks: &[String], overlap: usize) -> String {
    let mut result: Vec<char> = match chunks.first() {
        Some(first) => first.chars().collect(),
        None => return String::new(),
    };

    for chunk in &chunks[1..] {
        let cur: Vec<char> = chunk.chars().collect();
        let max_k = overlap.min(result.len()).min(cur.len());
        let mut k_found = 0;
        for k in (0..=max_k).rev() {
            if result[result.len() - k..] == cur[..k] {
                k_found = k;
                break;
            }
        }
        result.extend_from_slice(&cur[k_found..]);
    }

    result.into_iter().collect()
}

/// Whitespace canonicalization used to compare round-tripped text:
/// collapses runs of whitespace to a single space and trims ends.
pub fn canonicalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_boundary() {
        let text = "First sentence. Second sentence. Third sentence.";
        let chunks = split(text, 20, 0, 10).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 20 || !c.contains(' '));
        }
    }

    #[test]
    fn hard_cuts_when_no_boundary_exists() {
        let text = "a".repeat(50);
        let chunks = split(&text, 10, 0, 10).unwrap();
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.chars().count() == 10));
    }

    #[test]
    fn never_splits_timestamp_line_markers() {
        let text = "[0:00:01] hello there\n[0:00:05] more words here\n[0:00:09] final";
        let chunks = split(text, 15, 0, 10).unwrap();
        for c in &chunks {
            if let Some(rest) = c.strip_prefix('[') {
                assert!(rest.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false));
            }
        }
    }

    #[test]
    fn max_chunks_exceeded_on_single_chunk_budget() {
        let text = "word ".repeat(100);
        let err = split(&text, 10, 0, 1).unwrap_err();
        assert_eq!(
            err,
            ChunkError::InputTooLarge {
                max_chunks: 1,
                size: 10
            }
        );
    }

    #[test]
    fn merge_strips_duplicated_overlap() {
        let text = "The quick brown fox jumps over the lazy dog and keeps running.";
        let chunks = split(text, 20, 5, 20).unwrap();
        let merged = merge(&chunks, 5);
        assert_eq!(canonicalize_whitespace(&merged), canonicalize_whitespace(text));
    }

    #[test]
    fn empty_input_produces_no_chunks() {
        assert_eq!(split("", 10, 0, 10).unwrap(), Vec::<String>::new());
        assert_eq!(merge(&[], 5), "");
    }

    #[quickcheck_macros::quickcheck]
    fn prop_split_then_merge_round_trips(words: Vec<String>) -> bool {
        let text = words.join(" ");
        if text.is_empty() {
            return true;
        }
        match split(&text, 40, 8, 500) {
            Ok(chunks) => {
                let merged = merge(&chunks, 8);
                canonicalize_whitespace(&merged) == canonicalize_whitespace(&text)
            }
            Err(_) => true,
        }
    }
}
