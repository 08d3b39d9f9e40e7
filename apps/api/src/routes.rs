//! Thin axum handlers (spec §4.11): each route only shapes wire
//! structs and calls straight through to the Orchestrator. The one
//! HTTP-novel behavior — cross-provider cost comparison — lives here
//! rather than in `redub-core`, since it only ever executes as a
//! response to a GET request, not as part of a job pipeline.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use redub_artifacts::ArtifactKind;
use redub_core::{CoreError, DubRequest, Orchestrator, SynthesizeRequest, TranscribeRequest, TranslateRequest, TtsSelection};
use redub_translate::TranslationParams;
use redub_validators::JobId;
use redub_voice_equivalence::{QualityTier, VoiceProfile};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;

pub type AppState = Arc<Orchestrator>;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    providers_ready: bool,
}

#[utoipa::path(get, path = "/health", responses((status = 200, body = HealthResponse)))]
pub async fn health(State(orchestrator): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
        providers_ready: !orchestrator.tts_providers().is_empty(),
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PostEditBody {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TranscribeBody {
    pub url: String,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub breath_detection: bool,
    #[serde(default)]
    pub post_edit: Option<PostEditBody>,
    pub language: String,
}

#[utoipa::path(post, path = "/v1/transcribe", request_body = TranscribeBody, responses((status = 202, body = SubmitResponse)))]
pub async fn submit_transcribe(State(orchestrator): State<AppState>, Json(body): Json<TranscribeBody>) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let _ = body.test_mode;
    let source_url = redub_validators::normalize_video_url(&body.url).map_err(|err| CoreError::InvalidRequest(err.to_string()))?;
    let post_edit = body.post_edit.unwrap_or(PostEditBody { enabled: false, model: None });

    let request = TranscribeRequest {
        source_url,
        language_code: body.language,
        breath_detection: body.breath_detection,
        run_post_edit: post_edit.enabled,
        post_edit_model: post_edit.model.unwrap_or_else(|| "auto".to_string()),
    };
    let job_id = orchestrator.submit_transcribe(request);
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id: job_id.as_str().to_string() })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TranslateBody {
    pub transcript: String,
    pub target_lang: String,
    pub context: redub_translate::ContextTag,
    pub audience: String,
    pub tone: String,
    pub quality: redub_translate::QualityTier,
}

#[utoipa::path(post, path = "/v1/translate", request_body = TranslateBody, responses((status = 202, body = SubmitResponse)))]
pub async fn submit_translate(State(orchestrator): State<AppState>, Json(body): Json<TranslateBody>) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let params = TranslationParams {
        target_language: body.target_lang,
        context_tag: body.context,
        target_audience: body.audience,
        desired_tone: body.tone,
        quality_tier: body.quality,
    };
    let request = TranslateRequest {
        rendered_script: body.transcript,
        params,
    };
    let job_id = orchestrator.submit_translate(request)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id: job_id.as_str().to_string() })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SynthesizeBody {
    pub script: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    pub quality: QualityTier,
    #[serde(default)]
    pub format: Option<String>,
    pub language: String,
    #[serde(default)]
    pub requested_voice: Option<VoiceProfile>,
    #[serde(default)]
    pub cost_first: bool,
    #[serde(default)]
    pub max_cost_usd: Option<f64>,
}

#[utoipa::path(post, path = "/v1/synthesize", request_body = SynthesizeBody, responses((status = 202, body = SubmitResponse)))]
pub async fn submit_synthesize(State(orchestrator): State<AppState>, Json(body): Json<SynthesizeBody>) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let _ = body.format;
    let tts_selection = TtsSelection {
        provider: body.provider,
        voice_id: body.voice_id,
        requested_voice: body.requested_voice,
        cost_first: body.cost_first,
    };
    let request = SynthesizeRequest {
        rendered_script: body.script,
        tts_selection,
        quality_tier: body.quality,
        language_tag: body.language,
        max_cost_usd: body.max_cost_usd,
    };
    let job_id = orchestrator.submit_synthesize(request)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id: job_id.as_str().to_string() })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DubBody {
    pub url: String,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub breath_detection: bool,
    pub language: String,
    #[serde(default)]
    pub post_edit: Option<PostEditBody>,
    #[serde(default)]
    pub enable_translation: bool,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub context: Option<redub_translate::ContextTag>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub translation_quality: Option<redub_translate::QualityTier>,
    #[serde(default)]
    pub enable_synthesis: bool,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub requested_voice: Option<VoiceProfile>,
    #[serde(default)]
    pub cost_first: bool,
    pub quality: QualityTier,
    #[serde(default)]
    pub mux: bool,
    #[serde(default)]
    pub max_cost_usd: Option<f64>,
}

#[utoipa::path(post, path = "/v1/dub", request_body = DubBody, responses((status = 202, body = SubmitResponse)))]
pub async fn submit_dub(State(orchestrator): State<AppState>, Json(body): Json<DubBody>) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let _ = body.test_mode;
    let source_url = redub_validators::normalize_video_url(&body.url).map_err(|err| CoreError::InvalidRequest(err.to_string()))?;
    let post_edit = body.post_edit.unwrap_or(PostEditBody { enabled: false, model: None });

    let translation_params = if body.enable_translation {
        Some(TranslationParams {
            target_language: body.target_lang.ok_or_else(|| CoreError::InvalidRequest("target_lang required when enable_translation is set".into()))?,
            context_tag: body.context.ok_or_else(|| CoreError::InvalidRequest("context required when enable_translation is set".into()))?,
            target_audience: body.audience.ok_or_else(|| CoreError::InvalidRequest("audience required when enable_translation is set".into()))?,
            desired_tone: body.tone.ok_or_else(|| CoreError::InvalidRequest("tone required when enable_translation is set".into()))?,
            quality_tier: body.translation_quality.unwrap_or(redub_translate::QualityTier::Fast),
        })
    } else {
        None
    };

    let tts_selection = if body.enable_synthesis {
        Some(TtsSelection {
            provider: body.provider,
            voice_id: body.voice_id,
            requested_voice: body.requested_voice,
            cost_first: body.cost_first,
        })
    } else {
        None
    };

    let request = DubRequest {
        source_url,
        language_code: body.language,
        breath_detection: body.breath_detection,
        run_post_edit: post_edit.enabled,
        post_edit_model: post_edit.model.unwrap_or_else(|| "auto".to_string()),
        run_translate: body.enable_translation,
        translation_params,
        run_synthesize: body.enable_synthesis,
        tts_selection,
        quality_tier: body.quality,
        run_mux: body.mux,
        max_cost_usd: body.max_cost_usd,
    };
    let job_id = orchestrator.submit_dub(request);
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id: job_id.as_str().to_string() })))
}

#[utoipa::path(get, path = "/v1/jobs/{id}", params(("id" = String, Path)), responses((status = 200, body = redub_core::JobSnapshot)))]
pub async fn get_job(State(orchestrator): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = JobId::parse(&id).map_err(|err| CoreError::InvalidRequest(err.to_string()))?;
    let snapshot = orchestrator.registry().snapshot(&id)?;
    Ok(Json(snapshot))
}

#[utoipa::path(delete, path = "/v1/jobs/{id}", params(("id" = String, Path)), responses((status = 204)))]
pub async fn delete_job(State(orchestrator): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = JobId::parse(&id).map_err(|err| CoreError::InvalidRequest(err.to_string()))?;
    orchestrator.delete_job(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct ArtifactQuery {
    pub kind: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
}

fn artifact_kind_from_query(query: &ArtifactQuery) -> Result<ArtifactKind, CoreError> {
    match query.kind.as_str() {
        "transcript" => Ok(ArtifactKind::Transcript),
        "script" => Ok(ArtifactKind::Script),
        "translated" => Ok(ArtifactKind::Translated {
            lang: query.lang.clone().ok_or_else(|| CoreError::InvalidRequest("lang is required for kind=translated".into()))?,
        }),
        "audio" => Ok(ArtifactKind::Audio {
            lang: query.lang.clone().ok_or_else(|| CoreError::InvalidRequest("lang is required for kind=audio".into()))?,
            ext: query.ext.clone().unwrap_or_else(|| "wav".to_string()),
        }),
        "dubbed" => Ok(ArtifactKind::Dubbed {
            lang: query.lang.clone().ok_or_else(|| CoreError::InvalidRequest("lang is required for kind=dubbed".into()))?,
            ext: query.ext.clone().unwrap_or_else(|| "mp4".to_string()),
        }),
        other => Err(CoreError::InvalidRequest(format!("unknown artifact kind {other}"))),
    }
}

#[utoipa::path(get, path = "/v1/jobs/{id}/artifact", params(("id" = String, Path), ArtifactQuery), responses((status = 200, body = Vec<u8>)))]
pub async fn get_artifact(State(orchestrator): State<AppState>, Path(id): Path<String>, Query(query): Query<ArtifactQuery>) -> Result<impl IntoResponse, ApiError> {
    let id = JobId::parse(&id).map_err(|err| CoreError::InvalidRequest(err.to_string()))?;
    let kind = artifact_kind_from_query(&query)?;
    let store = orchestrator.artifacts();

    let path = store.path_for(&id, &kind).map_err(|err| CoreError::StageFailed(err.to_string()))?;
    if !store.exists(&id, &kind).map_err(|err| CoreError::StageFailed(err.to_string()))? {
        return Err(ApiError::from(CoreError::ArtifactNotReady));
    }
    let bytes = tokio::fs::read(&path).await.map_err(|err| CoreError::StageFailed(err.to_string()))?;
    Ok(bytes)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TtsProviderSummary {
    id: String,
    voices_count: usize,
    rate_per_1k: Option<f64>,
    languages: Vec<String>,
}

#[utoipa::path(get, path = "/v1/tts-providers", responses((status = 200, body = Vec<TtsProviderSummary>)))]
pub async fn list_tts_providers(State(orchestrator): State<AppState>) -> Json<Vec<TtsProviderSummary>> {
    let summaries = orchestrator
        .tts_providers()
        .iter()
        .map(|p| {
            let voices = p.list_voices(None);
            let mut languages: Vec<String> = voices.iter().map(|v| v.language_tag.clone()).collect();
            languages.sort();
            languages.dedup();
            TtsProviderSummary {
                id: p.name().to_string(),
                voices_count: voices.len(),
                rate_per_1k: voices.first().map(|v| v.price_per_1k_chars),
                languages,
            }
        })
        .collect();
    Json(summaries)
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct VoicesQuery {
    #[serde(default)]
    pub language: Option<String>,
}

#[utoipa::path(get, path = "/v1/tts-providers/{provider_id}/voices", params(("provider_id" = String, Path), VoicesQuery), responses((status = 200, body = Vec<VoiceProfile>)))]
pub async fn list_provider_voices(State(orchestrator): State<AppState>, Path(provider_id): Path<String>, Query(query): Query<VoicesQuery>) -> Result<Json<Vec<VoiceProfile>>, ApiError> {
    let provider = orchestrator
        .tts_providers()
        .iter()
        .find(|p| p.name() == provider_id)
        .ok_or_else(|| CoreError::InvalidRequest(format!("unknown tts provider {provider_id}")))?;
    Ok(Json(provider.list_voices(query.language.as_deref())))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct CostComparisonQuery {
    pub text: String,
    #[serde(default)]
    pub quality: Option<QualityTier>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CostQuote {
    provider: String,
    voice: String,
    cost: f64,
    currency: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CostComparisonResponse {
    quotes: Vec<CostQuote>,
    cheapest: Option<CostQuote>,
}

/// The one behavior spec §4.11 calls out as novel: quote every
/// available provider/voice pair against the submitted text and
/// recommend the cheapest.
#[utoipa::path(get, path = "/v1/tts-cost-comparison", params(CostComparisonQuery), responses((status = 200, body = CostComparisonResponse)))]
pub async fn tts_cost_comparison(State(orchestrator): State<AppState>, Query(query): Query<CostComparisonQuery>) -> Json<CostComparisonResponse> {
    let quality = query.quality.unwrap_or(QualityTier::Standard);
    let mut quotes = Vec::new();
    for provider in orchestrator.tts_providers() {
        for voice in provider.list_voices(None) {
            if let Ok(estimate) = provider.quote(&query.text, &voice.voice_id, quality) {
                quotes.push(CostQuote {
                    provider: provider.name().to_string(),
                    voice: voice.voice_id.clone(),
                    cost: estimate.amount,
                    currency: estimate.currency,
                });
            }
        }
    }
    let cheapest = quotes.iter().min_by(|a, b| a.cost.total_cmp(&b.cost)).map(|q| CostQuote {
        provider: q.provider.clone(),
        voice: q.voice.clone(),
        cost: q.cost,
        currency: q.currency,
    });
    Json(CostComparisonResponse { quotes, cheapest })
}
