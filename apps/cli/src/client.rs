//! Thin HTTP client over `redub-api` (spec §6): the interactive mode is
//! just another caller of the same job service the HTTP surface exposes,
//! so this mirrors `apps/api/src/adapters.rs`'s one-reqwest-client-per-
//! backend shape rather than reimplementing any orchestration logic.

use std::time::Duration;

use redub_core::JobStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {0} failed: {1}")]
    Request(String, reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}

#[derive(Debug, Serialize)]
pub struct PostEditBody {
    pub enabled: bool,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DubBody {
    pub url: String,
    pub test_mode: bool,
    pub breath_detection: bool,
    pub language: String,
    pub post_edit: Option<PostEditBody>,
    pub enable_translation: bool,
    pub target_lang: Option<String>,
    pub context: Option<redub_translate::ContextTag>,
    pub audience: Option<String>,
    pub tone: Option<String>,
    pub translation_quality: Option<redub_translate::QualityTier>,
    pub enable_synthesis: bool,
    pub provider: Option<String>,
    pub voice_id: Option<String>,
    pub cost_first: bool,
    pub quality: redub_voice_equivalence::QualityTier,
    pub mux: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct JobSnapshotView {
    pub id: String,
    pub status: JobStatus,
    pub progress: u32,
    pub cost_total: f64,
    pub error: Option<String>,
}

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::builder().timeout(Duration::from_secs(30)).build().expect("reqwest client builds"),
        }
    }

    async fn check(&self, path: &str, resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::Server { status, body: format!("{path}: {body}") })
    }

    pub async fn submit_dub(&self, body: &DubBody) -> Result<SubmitResponse, ClientError> {
        let resp = self
            .client
            .post(format!("{}/v1/dub", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|err| ClientError::Request("/v1/dub".into(), err))?;
        let resp = self.check("/v1/dub", resp).await?;
        resp.json().await.map_err(|err| ClientError::Request("/v1/dub".into(), err))
    }

    pub async fn get_job(&self, id: &str) -> Result<JobSnapshotView, ClientError> {
        let path = format!("/v1/jobs/{id}");
        let resp = self.client.get(format!("{}{path}", self.base_url)).send().await.map_err(|err| ClientError::Request(path.clone(), err))?;
        let resp = self.check(&path, resp).await?;
        resp.json().await.map_err(|err| ClientError::Request(path, err))
    }
}

/// Polls `GET /v1/jobs/{id}` until the job reaches a terminal status,
/// printing progress as it changes. Spec §4.11's only client-visible
/// contract for a submitted job is "poll until terminal"; the interval
/// here is a fixed, conservative default since the spec leaves polling
/// cadence to the client.
pub async fn wait_for_terminal(client: &ApiClient, job_id: &str) -> Result<JobSnapshotView, ClientError> {
    let mut last_progress = u32::MAX;
    loop {
        let snapshot = client.get_job(job_id).await?;
        if snapshot.progress != last_progress {
            println!("  progress: {}%", snapshot.progress);
            last_progress = snapshot.progress;
        }
        match snapshot.status {
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => return Ok(snapshot),
            JobStatus::Queued | JobStatus::Running => tokio::time::sleep(Duration::from_secs(2)).await,
        }
    }
}
