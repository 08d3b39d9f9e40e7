//! Job registry (spec §5): single writer per job; the id → Job index
//! needs mutual exclusion on insert/delete; status snapshots are taken
//! by copy-out so readers never observe a partial stage transition.

use std::collections::HashMap;
use std::sync::Mutex;

use redub_validators::JobId;

use crate::cancellation::CancellationToken;
use crate::error::CoreError;
use crate::job::{JobRecord, JobSnapshot};

#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, (JobRecord, CancellationToken)>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `record` and returns the cancellation token callers use
    /// to request it stop.
    pub fn insert(&self, record: JobRecord) -> CancellationToken {
        let token = CancellationToken::new();
        let id = record.id.clone();
        self.jobs.lock().unwrap().insert(id, (record, token.clone()));
        token
    }

    pub fn snapshot(&self, id: &JobId) -> Result<JobSnapshot, CoreError> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(id).map(|(record, _)| record.snapshot()).ok_or(CoreError::NotFound)
    }

    pub fn token(&self, id: &JobId) -> Result<CancellationToken, CoreError> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(id).map(|(_, token)| token.clone()).ok_or(CoreError::NotFound)
    }

    pub fn cancel(&self, id: &JobId) -> Result<(), CoreError> {
        self.token(id).map(|token| token.cancel())
    }

    pub fn remove(&self, id: &JobId) -> Result<(), CoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.remove(id).map(|_| ()).ok_or(CoreError::NotFound)
    }

    /// Runs `f` against the job's record while holding the registry
    /// lock. `f` must not block or re-enter the registry.
    pub fn with_record<T>(&self, id: &JobId, f: impl FnOnce(&mut JobRecord) -> T) -> Result<T, CoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let (record, _) = jobs.get_mut(id).ok_or(CoreError::NotFound)?;
        Ok(f(record))
    }

    pub fn list(&self) -> Vec<JobSnapshot> {
        self.jobs.lock().unwrap().values().map(|(record, _)| record.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redub_ledger::JobKind;

    #[test]
    fn insert_then_snapshot_round_trips() {
        let registry = JobRegistry::new();
        let record = JobRecord::new(JobKind::Transcribe);
        let id = record.id.clone();
        registry.insert(record);
        let snapshot = registry.snapshot(&id).unwrap();
        assert_eq!(snapshot.id, id.as_str());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let registry = JobRegistry::new();
        assert!(matches!(registry.snapshot(&redub_validators::JobId::new()), Err(CoreError::NotFound)));
    }

    #[test]
    fn cancel_sets_the_shared_token() {
        let registry = JobRegistry::new();
        let record = JobRecord::new(JobKind::Transcribe);
        let id = record.id.clone();
        registry.insert(record);
        registry.cancel(&id).unwrap();
        assert!(registry.token(&id).unwrap().is_cancelled());
    }

    #[test]
    fn with_record_mutates_under_the_lock() {
        let registry = JobRegistry::new();
        let record = JobRecord::new(JobKind::Transcribe);
        let id = record.id.clone();
        registry.insert(record);
        registry.with_record(&id, |r| r.start().unwrap()).unwrap();
        assert_eq!(registry.snapshot(&id).unwrap().status, crate::job::JobStatus::Running);
    }

    #[test]
    fn remove_deletes_the_entry() {
        let registry = JobRegistry::new();
        let record = JobRecord::new(JobKind::Transcribe);
        let id = record.id.clone();
        registry.insert(record);
        registry.remove(&id).unwrap();
        assert!(matches!(registry.snapshot(&id), Err(CoreError::NotFound)));
    }
}
