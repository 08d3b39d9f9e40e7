//! Timing reconciliation (spec §4.7): compares synthesized duration
//! against the source script's total duration and pads with silence
//! at natural paragraph breaks if the result came out short. A result
//! that came out long is returned as-is with a warning — pitch is
//! never distorted to fit either way.

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledAudio {
    pub audio_bytes: Vec<u8>,
    pub padded_secs: f64,
    pub overrun_warning: Option<String>,
}

/// `paragraph_break_byte_offsets` are candidate insertion points for
/// silence, in ascending byte-offset order (derived by the caller from
/// which `TimedSegment`s followed a paragraph break). `silence_frame`
/// is one unit of silence for the provider's output format/sample
/// rate; it is repeated to cover the deficit.
pub fn reconcile_timing(
    audio_bytes: Vec<u8>,
    synthesized_duration_secs: f64,
    source_duration_secs: f64,
    paragraph_break_byte_offsets: &[usize],
    silence_frame: &[u8],
) -> ReconciledAudio {
    let deficit = source_duration_secs - synthesized_duration_secs;

    if deficit <= 0.0 || silence_frame.is_empty() {
        let overrun_warning = if deficit < 0.0 {
            Some(format!(
                "synthesized audio ({synthesized_duration_secs:.2}s) exceeds source duration ({source_duration_secs:.2}s) by {:.2}s",
                -deficit
            ))
        } else {
            None
        };
        return ReconciledAudio {
            audio_bytes,
            padded_secs: 0.0,
            overrun_warning,
        };
    }

    let frame_secs = synthesized_duration_secs / (audio_bytes.len().max(1) as f64 / silence_frame.len().max(1) as f64);
    let frames_needed = if frame_secs > 0.0 {
        (deficit / frame_secs).ceil() as usize
    } else {
        0
    };

    let insert_at = paragraph_break_byte_offsets.last().copied().unwrap_or(audio_bytes.len()).min(audio_bytes.len());

    let mut out = Vec::with_capacity(audio_bytes.len() + frames_needed * silence_frame.len());
    out.extend_from_slice(&audio_bytes[..insert_at]);
    for _ in 0..frames_needed {
        out.extend_from_slice(silence_frame);
    }
    out.extend_from_slice(&audio_bytes[insert_at..]);

    ReconciledAudio {
        audio_bytes: out,
        padded_secs: deficit.max(0.0),
        overrun_warning: None,
    }
}
