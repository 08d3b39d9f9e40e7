use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::submit_transcribe,
        crate::routes::submit_translate,
        crate::routes::submit_synthesize,
        crate::routes::submit_dub,
        crate::routes::get_job,
        crate::routes::delete_job,
        crate::routes::get_artifact,
        crate::routes::list_tts_providers,
        crate::routes::list_provider_voices,
        crate::routes::tts_cost_comparison,
    ),
    components(
        schemas(
            crate::routes::HealthResponse,
            crate::routes::SubmitResponse,
            crate::routes::PostEditBody,
            crate::routes::TranscribeBody,
            crate::routes::TranslateBody,
            crate::routes::SynthesizeBody,
            crate::routes::DubBody,
            crate::routes::TtsProviderSummary,
            crate::routes::CostQuote,
            crate::routes::CostComparisonResponse,
            redub_core::JobStatus,
            redub_core::JobSnapshot,
            redub_translate::ContextTag,
            redub_translate::QualityTier,
            redub_translate::TranslationParams,
            redub_voice_equivalence::Gender,
            redub_voice_equivalence::QualityTier,
            redub_voice_equivalence::VoiceProfile,
        )
    ),
    tags(
        (name = "jobs", description = "Transcription, translation, synthesis and dub job submission and status"),
        (name = "tts", description = "TTS provider catalog and cost comparison"),
    )
)]
struct ApiDoc;

pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
