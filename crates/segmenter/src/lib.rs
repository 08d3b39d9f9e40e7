//! Timed Segmenter & pause detector (spec §4.3).
//!
//! Converts recognizer output — a sequence of words each carrying a
//! start/end time and a confidence — into a `Script`: timestamped
//! lines with embedded pause markers, plus summary statistics.
//!
//! This is a batch counterpart to the teacher's streaming
//! `transcript::accumulator` pipeline (`words.rs`'s gap-based
//! stitching, `processor.rs`'s word-state machine): instead of
//! reconciling partial/final updates across responses, it runs once
//! over a complete word sequence and classifies every inter-word gap.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SOFT_LINE_LIMIT: usize = 100;

const TERMINAL_PUNCTUATION: [char; 4] = ['.', '!', '?', '…'];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GapAction {
    None,
    ShortPause,
    LongPause,
    SentenceEnd,
    Paragraph,
}

fn classify_gap(gap: f64, prev_ends_terminal: bool) -> GapAction {
    if gap >= 3.0 {
        GapAction::Paragraph
    } else if gap >= 1.0 && prev_ends_terminal {
        GapAction::SentenceEnd
    } else if gap >= 1.5 {
        GapAction::LongPause
    } else if gap >= 0.6 {
        GapAction::ShortPause
    } else {
        GapAction::None
    }
}

fn ends_with_terminal(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .map(|c| TERMINAL_PUNCTUATION.contains(&c))
        .unwrap_or(false)
}

/// A single timestamped line of the output script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedLine {
    /// Start time of the line's first word, truncated to whole seconds.
    pub timestamp_secs: u64,
    pub text: String,
    /// Whether a blank line should precede this one (paragraph break).
    pub paragraph_break_before: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub lines: Vec<TimedLine>,
}

impl Script {
    /// Renders `[h:mm:ss] words…` lines, with a blank line preceding
    /// any paragraph break, matching the format named in spec §4.3.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if line.paragraph_break_before && i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("[{}] {}\n", format_timestamp(line.timestamp_secs), line.text));
        }
        out
    }
}

fn format_timestamp(total_secs: u64) -> String {
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h}:{m:02}:{s:02}")
}

#[derive(Debug, Error)]
pub enum ParseScriptError {
    #[error("line missing timestamp prefix: {0:?}")]
    MissingTimestampPrefix(String),
}

/// Parses `[h:mm:ss] words…` lines (with blank lines marking paragraph
/// breaks) back into a `Script`. The inverse of `Script::render`, shared
/// by every call site that re-parses a generative model's rendered-script
/// response (the Post-Editor and the Translator).
pub fn parse_script_text(text: &str) -> Result<Script, ParseScriptError> {
    let mut lines = Vec::new();
    let mut pending_paragraph_break = false;

    for raw_line in text.lines() {
        if raw_line.trim().is_empty() {
            if !lines.is_empty() {
                pending_paragraph_break = true;
            }
            continue;
        }

        let (timestamp_secs, rest) = parse_timestamp_line(raw_line)
            .ok_or_else(|| ParseScriptError::MissingTimestampPrefix(raw_line.to_string()))?;

        lines.push(TimedLine {
            timestamp_secs,
            text: rest.trim().to_string(),
            paragraph_break_before: pending_paragraph_break,
        });
        pending_paragraph_break = false;
    }

    Ok(Script { lines })
}

fn parse_timestamp_line(line: &str) -> Option<(u64, &str)> {
    let line = line.trim_start();
    let rest = line.strip_prefix('[')?;
    let (stamp, after) = rest.split_once(']')?;
    let mut parts = stamp.split(':');
    let h: u64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    let s: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((h * 3600 + m * 60 + s, after))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptStats {
    pub total_words: usize,
    pub mean_confidence: f32,
    pub short_pause_count: u32,
    pub long_pause_count: u32,
    pub paragraph_count: u32,
    pub words_per_minute: f64,
    pub pause_fraction: f64,
}

struct LineBuilder {
    start_secs: f64,
    text: String,
    paragraph_break_before: bool,
}

impl LineBuilder {
    fn new(start_secs: f64, paragraph_break_before: bool) -> Self {
        Self {
            start_secs,
            text: String::new(),
            paragraph_break_before,
        }
    }

    fn push_word(&mut self, word: &str, marker: Option<&str>) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        if let Some(m) = marker {
            self.text.push_str(m);
            self.text.push(' ');
        }
        self.text.push_str(word);
    }

    fn finish(self) -> TimedLine {
        TimedLine {
            timestamp_secs: self.start_secs.trunc() as u64,
            text: self.text,
            paragraph_break_before: self.paragraph_break_before,
        }
    }
}

/// Converts recognizer words into a `Script` plus its `ScriptStats`.
/// `soft_line_limit` is the character-count threshold beyond which a
/// line is force-broken even without a pause or sentence-end trigger.
pub fn segment(words: &[RecognizedWord], soft_line_limit: usize) -> (Script, ScriptStats) {
    let mut lines = Vec::new();

    if words.is_empty() {
        return (Script { lines }, ScriptStats::default());
    }

    let mut short_pause_count = 0u32;
    let mut long_pause_count = 0u32;
    let mut paragraph_count = 0u32;
    let mut total_pause_secs = 0.0f64;

    let mut builder = LineBuilder::new(words[0].start_secs, false);
    builder.push_word(&words[0].text, None);

    for i in 1..words.len() {
        let gap = words[i].start_secs - words[i - 1].end_secs;
        if gap > 0.0 {
            total_pause_secs += gap;
        }

        let action = classify_gap(gap, ends_with_terminal(&words[i - 1].text));

        match action {
            GapAction::Paragraph => {
                paragraph_count += 1;
                lines.push(std::mem::replace(&mut builder, LineBuilder::new(words[i].start_secs, true)).finish());
                builder.push_word(&words[i].text, None);
            }
            GapAction::SentenceEnd => {
                lines.push(std::mem::replace(&mut builder, LineBuilder::new(words[i].start_secs, false)).finish());
                builder.push_word(&words[i].text, None);
            }
            GapAction::LongPause => {
                long_pause_count += 1;
                builder.push_word(&words[i].text, Some("••"));
            }
            GapAction::ShortPause => {
                short_pause_count += 1;
                builder.push_word(&words[i].text, Some("•"));
            }
            GapAction::None => {
                builder.push_word(&words[i].text, None);
            }
        }

        if builder.text.chars().count() > soft_line_limit && i + 1 < words.len() {
            lines.push(std::mem::replace(&mut builder, LineBuilder::new(words[i + 1].start_secs, false)).finish());
        }
    }

    lines.push(builder.finish());

    let total_words = words.len();
    let mean_confidence = words.iter().map(|w| w.confidence).sum::<f32>() / total_words as f32;
    let total_duration_secs = (words[words.len() - 1].end_secs - words[0].start_secs).max(f64::EPSILON);
    let words_per_minute = total_words as f64 / (total_duration_secs / 60.0);
    let pause_fraction = total_pause_secs / total_duration_secs;

    let stats = ScriptStats {
        total_words,
        mean_confidence,
        short_pause_count,
        long_pause_count,
        paragraph_count,
        words_per_minute,
        pause_fraction,
    };

    (Script { lines }, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> RecognizedWord {
        RecognizedWord {
            text: text.to_string(),
            start_secs: start,
            end_secs: end,
            confidence: 0.95,
        }
    }

    #[test]
    fn no_gap_keeps_single_line() {
        let words = vec![word("hello", 0.0, 0.3), word("world", 0.35, 0.6)];
        let (script, stats) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        assert_eq!(script.lines.len(), 1);
        assert_eq!(script.lines[0].text, "hello world");
        assert_eq!(stats.short_pause_count, 0);
    }

    #[test]
    fn short_gap_inserts_inline_marker() {
        let words = vec![word("hello", 0.0, 0.3), word("world", 1.0, 1.3)];
        let (script, stats) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        assert_eq!(script.lines.len(), 1);
        assert_eq!(script.lines[0].text, "hello • world");
        assert_eq!(stats.short_pause_count, 1);
    }

    #[test]
    fn long_gap_inserts_double_marker() {
        let words = vec![word("hello", 0.0, 0.3), word("world", 2.0, 2.3)];
        let (_, stats) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        assert_eq!(stats.long_pause_count, 1);
    }

    #[test]
    fn terminal_punctuation_plus_gap_breaks_line() {
        let words = vec![word("done.", 0.0, 0.3), word("Next", 1.4, 1.7)];
        let (script, stats) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        assert_eq!(script.lines.len(), 2);
        assert_eq!(script.lines[1].timestamp_secs, 1);
        assert_eq!(stats.long_pause_count, 0);
        assert_eq!(stats.short_pause_count, 0);
    }

    #[test]
    fn huge_gap_starts_new_paragraph() {
        let words = vec![word("hello", 0.0, 0.3), word("world", 5.0, 5.3)];
        let (script, stats) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        assert_eq!(script.lines.len(), 2);
        assert!(script.lines[1].paragraph_break_before);
        assert_eq!(stats.paragraph_count, 1);
    }

    #[test]
    fn soft_limit_forces_line_break() {
        let mut words = Vec::new();
        let mut t = 0.0;
        for i in 0..30 {
            words.push(word(&format!("word{i}"), t, t + 0.2));
            t += 0.25;
        }
        let (script, _) = segment(&words, 20);
        assert!(script.lines.len() > 1);
        for line in &script.lines {
            assert!(line.text.chars().count() <= 20 + "word29".len());
        }
    }

    #[test]
    fn empty_input_produces_empty_script() {
        let (script, stats) = segment(&[], DEFAULT_SOFT_LINE_LIMIT);
        assert!(script.lines.is_empty());
        assert_eq!(stats, ScriptStats::default());
    }

    #[test]
    fn render_places_blank_line_before_paragraph_break() {
        let words = vec![word("hello", 0.0, 0.3), word("world", 5.0, 5.3)];
        let (script, _) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        let rendered = script.render();
        assert!(rendered.contains("\n\n["));
    }

    #[test]
    fn parse_script_text_round_trips_through_render() {
        let words = vec![word("hello", 0.0, 0.3), word("world", 5.0, 5.3)];
        let (script, _) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        let rendered = script.render();
        let parsed = parse_script_text(&rendered).unwrap();
        assert_eq!(parsed, script);
    }

    #[test]
    fn parse_script_text_rejects_missing_timestamp_prefix() {
        let result = parse_script_text("no timestamp here\n");
        assert!(matches!(result, Err(ParseScriptError::MissingTimestampPrefix(_))));
    }

    #[quickcheck_macros::quickcheck]
    fn prop_progress_stats_are_finite(gaps: Vec<u8>) -> bool {
        let mut words = Vec::new();
        let mut t = 0.0;
        for (i, gap) in gaps.iter().enumerate() {
            let start = t + (*gap as f64) / 10.0;
            words.push(word(&format!("w{i}"), start, start + 0.2));
            t = start + 0.2;
        }
        if words.is_empty() {
            return true;
        }
        let (_, stats) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        stats.pause_fraction.is_finite() && stats.words_per_minute.is_finite()
    }
}
