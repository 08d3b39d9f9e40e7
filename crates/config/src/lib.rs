//! Environment-backed configuration (spec §6): every recognized key is
//! parsed once at process start and never again. Grounded on the
//! teacher's `apps/api/src/env.rs` pattern — `dotenvy` loads a local
//! `.env` first, `envy` deserializes the process environment into a
//! struct, and a `OnceLock` makes the result a process-wide singleton.
//!
//! `envy` only flattens scalar fields, so a few keys (`region_list`,
//! `tts_rate_cards_json`) carry structured values as env strings and are
//! parsed in a second pass rather than during deserialization.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment: {0}")]
    Env(String),
    #[error("invalid max_cost_usd_per_job value {value:?}: {source}")]
    InvalidMaxCost { value: String, source: std::num::ParseFloatError },
    #[error("invalid tts_rate_cards_json: {0}")]
    InvalidRateCards(serde_json::Error),
}

fn default_sync_size_limit_mb() -> u64 {
    10
}
fn default_language_code() -> String {
    "hu-HU".to_string()
}
fn default_max_concurrent_jobs() -> usize {
    5
}
fn default_chunk_size() -> usize {
    4_000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_max_chunks() -> usize {
    50
}
fn default_tts_default_provider() -> String {
    "auto".to_string()
}
fn default_post_editor_model() -> String {
    "auto".to_string()
}
fn default_region_list() -> String {
    "us,eu".to_string()
}
fn default_max_cost_usd_per_job() -> String {
    String::new()
}
fn default_temp_dir() -> String {
    std::env::temp_dir().to_string_lossy().into_owned()
}
fn default_artifact_ttl_seconds() -> u64 {
    7 * 24 * 3_600
}
fn default_tts_rate_cards_json() -> String {
    "{}".to_string()
}

/// The flat shape `envy` deserializes directly from the process
/// environment. [`Config`] is derived from this by parsing the handful of
/// fields that are structured.
#[derive(Debug, Deserialize)]
pub struct RawEnv {
    #[serde(default = "default_sync_size_limit_mb")]
    pub sync_size_limit_mb: u64,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_tts_default_provider")]
    pub tts_default_provider: String,
    #[serde(default)]
    pub tts_auto_cost_first: bool,
    #[serde(default = "default_post_editor_model")]
    pub post_editor_model: String,
    #[serde(default = "default_region_list")]
    pub region_list: String,
    #[serde(default = "default_max_cost_usd_per_job")]
    pub max_cost_usd_per_job: String,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
    #[serde(default = "default_artifact_ttl_seconds")]
    pub artifact_ttl_seconds: u64,
    #[serde(default = "default_tts_rate_cards_json")]
    pub tts_rate_cards_json: String,
}

/// Process configuration, resolved from [`RawEnv`]. See spec §6 for the
/// source list of recognized keys.
#[derive(Debug, Clone)]
pub struct Config {
    pub sync_size_limit_bytes: u64,
    pub language_code: String,
    pub max_concurrent_jobs: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks: usize,
    /// An explicit provider id, or the literal `"auto"`.
    pub tts_default_provider: String,
    pub tts_auto_cost_first: bool,
    pub post_editor_model: String,
    pub region_list: Vec<String>,
    pub max_cost_usd_per_job: Option<f64>,
    pub temp_dir: PathBuf,
    pub artifact_ttl: Duration,
    /// Per-provider USD price per 1,000 characters. Rate cards are
    /// configuration, not constants baked into a provider adapter, since
    /// providers revise pricing independently of a release cycle.
    pub tts_rate_cards: HashMap<String, f64>,
}

impl Config {
    pub fn from_raw(raw: RawEnv) -> Result<Self, ConfigError> {
        let max_cost_usd_per_job = if raw.max_cost_usd_per_job.trim().is_empty() {
            None
        } else {
            Some(raw.max_cost_usd_per_job.trim().parse::<f64>().map_err(|source| ConfigError::InvalidMaxCost {
                value: raw.max_cost_usd_per_job.clone(),
                source,
            })?)
        };

        let region_list = raw
            .region_list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let tts_rate_cards: HashMap<String, f64> =
            serde_json::from_str(&raw.tts_rate_cards_json).map_err(ConfigError::InvalidRateCards)?;

        Ok(Config {
            sync_size_limit_bytes: raw.sync_size_limit_mb * 1024 * 1024,
            language_code: raw.language_code,
            max_concurrent_jobs: raw.max_concurrent_jobs,
            chunk_size: raw.chunk_size,
            chunk_overlap: raw.chunk_overlap,
            max_chunks: raw.max_chunks,
            tts_default_provider: raw.tts_default_provider,
            tts_auto_cost_first: raw.tts_auto_cost_first,
            post_editor_model: raw.post_editor_model,
            region_list,
            max_cost_usd_per_job,
            temp_dir: PathBuf::from(raw.temp_dir),
            artifact_ttl: Duration::from_secs(raw.artifact_ttl_seconds),
            tts_rate_cards,
        })
    }
}

pub fn load() -> Result<Config, ConfigError> {
    let raw: RawEnv = envy::from_env().map_err(|err| ConfigError::Env(err.to_string()))?;
    Config::from_raw(raw)
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Process-wide configuration, loaded once on first access.
pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        let _ = dotenvy::dotenv();
        load().expect("failed to load configuration")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_defaults() -> RawEnv {
        RawEnv {
            sync_size_limit_mb: default_sync_size_limit_mb(),
            language_code: default_language_code(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_chunks: default_max_chunks(),
            tts_default_provider: default_tts_default_provider(),
            tts_auto_cost_first: false,
            post_editor_model: default_post_editor_model(),
            region_list: default_region_list(),
            max_cost_usd_per_job: default_max_cost_usd_per_job(),
            temp_dir: default_temp_dir(),
            artifact_ttl_seconds: default_artifact_ttl_seconds(),
            tts_rate_cards_json: default_tts_rate_cards_json(),
        }
    }

    #[test]
    fn empty_max_cost_means_unbounded() {
        let config = Config::from_raw(raw_defaults()).unwrap();
        assert_eq!(config.max_cost_usd_per_job, None);
    }

    #[test]
    fn max_cost_parses_to_some() {
        let mut raw = raw_defaults();
        raw.max_cost_usd_per_job = "12.50".to_string();
        let config = Config::from_raw(raw).unwrap();
        assert_eq!(config.max_cost_usd_per_job, Some(12.50));
    }

    #[test]
    fn invalid_max_cost_is_rejected() {
        let mut raw = raw_defaults();
        raw.max_cost_usd_per_job = "not-a-number".to_string();
        assert!(matches!(Config::from_raw(raw), Err(ConfigError::InvalidMaxCost { .. })));
    }

    #[test]
    fn region_list_is_split_and_trimmed() {
        let mut raw = raw_defaults();
        raw.region_list = " us , eu ,apac ".to_string();
        let config = Config::from_raw(raw).unwrap();
        assert_eq!(config.region_list, vec!["us", "eu", "apac"]);
    }

    #[test]
    fn rate_cards_parse_from_json() {
        let mut raw = raw_defaults();
        raw.tts_rate_cards_json = r#"{"elevenlabs": 0.30, "azure": 0.16}"#.to_string();
        let config = Config::from_raw(raw).unwrap();
        assert_eq!(config.tts_rate_cards.get("elevenlabs"), Some(&0.30));
        assert_eq!(config.tts_rate_cards.get("azure"), Some(&0.16));
    }

    #[test]
    fn malformed_rate_cards_json_is_rejected() {
        let mut raw = raw_defaults();
        raw.tts_rate_cards_json = "not json".to_string();
        assert!(matches!(Config::from_raw(raw), Err(ConfigError::InvalidRateCards(_))));
    }

    #[test]
    fn sync_size_limit_is_converted_to_bytes() {
        let config = Config::from_raw(raw_defaults()).unwrap();
        assert_eq!(config.sync_size_limit_bytes, 10 * 1024 * 1024);
    }
}
