//! Orchestration core: the Job model, registry, cancellation, budget
//! gate, media pipeline glue, and the Orchestrator that drives all four
//! job kinds through the adapter crates (spec §4.1).

mod budget;
mod cancellation;
mod error;
mod job;
mod media;
mod orchestrator;
mod registry;

pub use budget::check_budget;
pub use cancellation::CancellationToken;
pub use error::CoreError;
pub use job::{JobRecord, JobSnapshot, JobStatus, TransitionError};
pub use media::{MediaConfig, MediaError};
pub use orchestrator::{DubRequest, Orchestrator, Providers, SynthesizeRequest, TranscribeRequest, TranslateRequest, TtsSelection};
pub use registry::JobRegistry;
