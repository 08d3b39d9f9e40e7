//! Concrete TTS adapter toolkit (spec §4.7): SSML generation per
//! timed segment, chunked parallel synthesis under a provider's
//! per-call character cap, timing reconciliation against the source
//! script's duration, and the shared retry policy concrete adapters
//! apply around their `synthesize` call.
//!
//! Built for any `redub_tts::TtsProvider` implementation to reuse —
//! no teacher file speaks to a TTS vendor, so this is modeled on the
//! teacher's general "shared helper crate behind N thin adapters"
//! shape (`owhisper-client::adapter::parsing`, `url_builder`).

pub mod chunking;
pub mod retry;
pub mod ssml;
pub mod timing;

pub use chunking::{split_into_synthesis_chunks, synthesize_chunked};
pub use retry::retry_synthesis;
pub use ssml::{generate_ssml, segments_from_script, TimedSegment, VoiceDefaults};
pub use timing::reconcile_timing;
