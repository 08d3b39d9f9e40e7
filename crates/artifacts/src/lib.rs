//! Artifact Store (spec §4.10): every artifact is a file under a unique
//! per-job directory, named deterministically. Guarantees: no
//! path-traversal in names, existence-check + size on open, one directory
//! per job.
//!
//! Grounded on the teacher's path-safety invariant in
//! `redub-validators::sanitize_path_component` (itself modeled on the
//! teacher's vault path checks), reused here rather than re-implemented.

use std::fs;
use std::path::{Path, PathBuf};

use redub_validators::{sanitize_path_component, JobId, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("invalid artifact name component: {0}")]
    InvalidName(#[from] ValidationError),
    #[error("artifact not found at {0}")]
    NotFound(PathBuf),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The deterministic artifact names spec §4.10 enumerates. `lang`/`ext`
/// are sanitized the same way a job id is, since they ultimately become
/// path components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    Transcript,
    Script,
    Translated { lang: String },
    Audio { lang: String, ext: String },
    Dubbed { lang: String, ext: String },
}

impl ArtifactKind {
    pub fn filename(&self) -> Result<String, ArtifactError> {
        match self {
            ArtifactKind::Transcript => Ok("transcript.txt".to_string()),
            ArtifactKind::Script => Ok("script.txt".to_string()),
            ArtifactKind::Translated { lang } => {
                let lang = sanitize_path_component(lang)?;
                Ok(format!("translated.{lang}.txt"))
            }
            ArtifactKind::Audio { lang, ext } => {
                let lang = sanitize_path_component(lang)?;
                let ext = sanitize_path_component(ext)?;
                Ok(format!("audio.{lang}.{ext}"))
            }
            ArtifactKind::Dubbed { lang, ext } => {
                let lang = sanitize_path_component(lang)?;
                let ext = sanitize_path_component(ext)?;
                Ok(format!("dubbed.{lang}.{ext}"))
            }
        }
    }
}

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    pub fn ensure_job_dir(&self, job_id: &JobId) -> Result<PathBuf, ArtifactError> {
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir).map_err(|source| ArtifactError::Io { path: dir.clone(), source })?;
        Ok(dir)
    }

    pub fn path_for(&self, job_id: &JobId, kind: &ArtifactKind) -> Result<PathBuf, ArtifactError> {
        Ok(self.job_dir(job_id).join(kind.filename()?))
    }

    pub fn write(&self, job_id: &JobId, kind: &ArtifactKind, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        self.ensure_job_dir(job_id)?;
        let path = self.path_for(job_id, kind)?;
        fs::write(&path, bytes).map_err(|source| ArtifactError::Io { path: path.clone(), source })?;
        Ok(path)
    }

    /// Returns an open handle plus its size in bytes, having already
    /// confirmed the artifact exists.
    pub fn open(&self, job_id: &JobId, kind: &ArtifactKind) -> Result<(fs::File, u64), ArtifactError> {
        let path = self.path_for(job_id, kind)?;
        let file = fs::File::open(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::NotFound(path.clone())
            } else {
                ArtifactError::Io { path: path.clone(), source }
            }
        })?;
        let size = file.metadata().map_err(|source| ArtifactError::Io { path: path.clone(), source })?.len();
        Ok((file, size))
    }

    pub fn exists(&self, job_id: &JobId, kind: &ArtifactKind) -> Result<bool, ArtifactError> {
        Ok(self.path_for(job_id, kind)?.exists())
    }

    /// Removes the whole per-job directory, used by cleanup (spec §4.12)
    /// on job deletion or TTL sweep. A missing directory is not an error.
    pub fn remove_job_dir(&self, job_id: &JobId) -> Result<(), ArtifactError> {
        let dir = self.job_dir(job_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ArtifactError::Io { path: dir, source }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Removes job directories whose last modification is older than
    /// `ttl` (spec §4.12's background TTL sweep). Job records themselves
    /// are not tracked here — a restarted process still sweeps correctly
    /// because this reads directory mtimes, not the in-memory registry.
    /// Returns the job ids removed, for logging.
    pub fn sweep_expired(&self, ttl: std::time::Duration) -> Result<Vec<String>, ArtifactError> {
        let mut removed = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
            Err(source) => return Err(ArtifactError::Io { path: self.root.clone(), source }),
        };
        for entry in entries {
            let entry = entry.map_err(|source| ArtifactError::Io { path: self.root.clone(), source })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let metadata = entry.metadata().map_err(|source| ArtifactError::Io { path: path.clone(), source })?;
            let modified = metadata.modified().map_err(|source| ArtifactError::Io { path: path.clone(), source })?;
            if modified.elapsed().unwrap_or_default() > ttl {
                fs::remove_dir_all(&path).map_err(|source| ArtifactError::Io { path: path.clone(), source })?;
                if let Some(name) = path.file_name() {
                    removed.push(name.to_string_lossy().into_owned());
                }
            }
        }
        Ok(removed)
    }
}
