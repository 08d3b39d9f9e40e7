//! Job record (spec §4.1, §4.9): the unit the Orchestrator owns. The
//! status enum is a hand-rolled state machine with checked transitions
//! rather than a `statig`-style generated one — see `DESIGN.md` for why.

use chrono::{DateTime, Utc};
use redub_ledger::{CostLedger, JobKind, ProgressLedger};
use redub_validators::JobId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Error)]
#[error("cannot transition job from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

pub(crate) fn job_kind_label(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Transcribe => "transcribe",
        JobKind::Translate => "translate",
        JobKind::Synthesize => "synthesize",
        JobKind::Dub => "dub",
    }
}

/// A read-only, serializable view of a [`JobRecord`] — what `GET
/// /v1/jobs/{id}` returns (spec §4.11).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobSnapshot {
    pub id: String,
    pub kind: &'static str,
    pub status: JobStatus,
    pub progress: u32,
    pub cost_total: f64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: ProgressLedger,
    pub cost: CostLedger,
    pub error: Option<CoreError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            status: JobStatus::Queued,
            progress: ProgressLedger::new(kind),
            cost: CostLedger::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), TransitionError> {
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        );
        if !allowed {
            return Err(TransitionError { from: self.status, to });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Running)
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)
    }

    pub fn fail(&mut self, error: CoreError) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Cancelled)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.as_str().to_string(),
            kind: job_kind_label(self.kind),
            status: self.status,
            progress: self.progress.overall(),
            cost_total: self.cost.total(),
            error: self.error.as_ref().map(|e| e.to_string()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_job_is_queued_with_zero_progress() {
        let job = JobRecord::new(JobKind::Dub);
        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.progress, 0);
    }

    #[test]
    fn valid_transition_sequence_succeeds() {
        let mut job = JobRecord::new(JobKind::Transcribe);
        job.start().unwrap();
        job.complete().unwrap();
        assert_eq!(job.snapshot().status, JobStatus::Completed);
    }

    #[test]
    fn completing_before_running_is_rejected() {
        let mut job = JobRecord::new(JobKind::Transcribe);
        assert!(job.complete().is_err());
    }

    #[test]
    fn terminal_status_cannot_transition_again() {
        let mut job = JobRecord::new(JobKind::Transcribe);
        job.start().unwrap();
        job.fail(CoreError::StageFailed("boom".into())).unwrap();
        assert!(job.complete().is_err());
        assert!(job.cancel().is_err());
    }

    #[test]
    fn queued_job_can_be_cancelled_directly() {
        let mut job = JobRecord::new(JobKind::Transcribe);
        job.cancel().unwrap();
        assert_eq!(job.snapshot().status, JobStatus::Cancelled);
    }
}
