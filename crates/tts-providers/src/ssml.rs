//! Per-segment SSML generation.

use redub_segmenter::Script;

/// A voice's default prosody and the provider's max allowed break
/// duration, both looked up once per synthesis call.
#[derive(Debug, Clone, Copy)]
pub struct VoiceDefaults {
    pub rate_percent: i32,
    pub pitch_semitones: i32,
    pub max_break_ms: u32,
}

impl Default for VoiceDefaults {
    fn default() -> Self {
        Self {
            rate_percent: 0,
            pitch_semitones: 0,
            max_break_ms: 3_000,
        }
    }
}

/// A single utterance plus how long to pause before the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSegment {
    pub start_secs: u64,
    pub text: String,
    pub break_after_ms: u32,
}

/// Derives `TimedSegment`s from a `Script`: one per line, with the gap
/// to the next line's start time as the trailing break (the last
/// segment gets no break).
pub fn segments_from_script(script: &Script) -> Vec<TimedSegment> {
    let mut segments = Vec::with_capacity(script.lines.len());
    for (i, line) in script.lines.iter().enumerate() {
        let break_after_ms = script
            .lines
            .get(i + 1)
            .map(|next| next.timestamp_secs.saturating_sub(line.timestamp_secs) * 1000)
            .unwrap_or(0) as u32;
        segments.push(TimedSegment {
            start_secs: line.timestamp_secs,
            text: strip_pause_markers(&line.text),
            break_after_ms,
        });
    }
    segments
}

fn strip_pause_markers(text: &str) -> String {
    text.replace("••", "").replace('•', "").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Renders one segment's SSML fragment: prosody from the voice's
/// defaults, an explicit trailing break clamped to the provider's max,
/// text normalized (pause markers stripped, quotes/punctuation kept).
pub fn generate_ssml(segment: &TimedSegment, defaults: &VoiceDefaults) -> String {
    let break_ms = segment.break_after_ms.min(defaults.max_break_ms);
    let escaped = escape_xml(&segment.text);

    let mut out = format!(
        "<speak><prosody rate=\"{:+}%\" pitch=\"{:+}st\">{}</prosody>",
        defaults.rate_percent, defaults.pitch_semitones, escaped
    );
    if break_ms > 0 {
        out.push_str(&format!("<break time=\"{break_ms}ms\"/>"));
    }
    out.push_str("</speak>");
    out
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use redub_segmenter::TimedLine;

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
    fn derives_break_from_next_segment_gap() {
        let s = script(vec![(0, "hello • world"), (3, "more text")]);
        let segments = segments_from_script(&s);
        assert_eq!(segments[0].break_after_ms, 3000);
        assert_eq!(segments[0].text, "hello world");
        assert_eq!(segments[1].break_after_ms, 0);
    }

    #[test]
    fn ssml_clamps_break_to_provider_max() {
        let segment = TimedSegment {
            start_secs: 0,
            text: "hello".into(),
            break_after_ms: 10_000,
        };
        let defaults = VoiceDefaults {
            max_break_ms: 2_000,
            ..Default::default()
        };
        let ssml = generate_ssml(&segment, &defaults);
        assert!(ssml.contains("2000ms"));
        assert!(!ssml.contains("10000ms"));
    }

    #[test]
    fn ssml_escapes_markup_characters() {
        let segment = TimedSegment {
            start_secs: 0,
            text: "Tom & Jerry <fight>".into(),
            break_after_ms: 0,
        };
        let ssml = generate_ssml(&segment, &VoiceDefaults::default());
        assert!(ssml.contains("Tom &amp; Jerry &lt;fight&gt;"));
    }

    #[test]
    fn zero_break_omits_break_tag() {
        let segment = TimedSegment {
            start_secs: 0,
            text: "hello".into(),
            break_after_ms: 0,
        };
        let ssml = generate_ssml(&segment, &VoiceDefaults::default());
        assert!(!ssml.contains("<break"));
    }
}
