mod adapters;
mod error;
mod openapi;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Request;
use axum::routing::{get, post};
use axum::{body::Body, extract::MatchedPath, Router};
use redub_artifacts::ArtifactStore;
use redub_core::{Orchestrator, Providers};
use redub_objectstore::{ObjectStore, ObjectStoreConfig};
use redub_voice_equivalence::{Gender, ProviderCatalog, QualityTier, VoiceProfile};
use tower::ServiceBuilder;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use adapters::{HttpLlmClient, HttpSttProvider, HttpTtsProvider, YtDlpVideoFetcher};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Builds the out-of-scope collaborator set (spec §1) from environment
/// configuration: base URLs for the recognizer and generative-model
/// backends, plus one TTS provider per entry in `redub-config`'s rate
/// card map. No vendor SDK lives in this crate — every collaborator is
/// reached over HTTP or by shelling out, per `apps/api/src/adapters.rs`.
/// The one exception is the staged-recognizer object store
/// (`redub-objectstore`), which talks to S3 directly per spec §4.4.
async fn build_providers(config: &redub_config::Config) -> Providers {
    let presign_ttl_secs: u64 = std::env::var("STAGED_AUDIO_PRESIGN_TTL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(900);
    let objectstore_config = ObjectStoreConfig {
        bucket: env_or("STAGED_AUDIO_BUCKET", "redub-staged-audio"),
        key_prefix: env_or("STAGED_AUDIO_PREFIX", "staged"),
        presign_ttl: Duration::from_secs(presign_ttl_secs),
    };
    let objectstore = Arc::new(ObjectStore::from_env(objectstore_config).await);
    let stt = Arc::new(HttpSttProvider::new(env_or("STT_BASE_URL", "http://localhost:8081"), objectstore));
    let llm = Arc::new(HttpLlmClient::new(env_or("LLM_BASE_URL", "http://localhost:8082")));

    let mut catalog = ProviderCatalog::new();
    let mut tts: Vec<Box<dyn redub_tts::TtsProvider>> = Vec::new();
    for (provider_id, price_per_1k_chars) in &config.tts_rate_cards {
        let voice = VoiceProfile {
            provider: provider_id.clone(),
            voice_id: format!("{provider_id}-default"),
            language_tag: config.language_code.clone(),
            gender: Gender::Neutral,
            quality_tier: QualityTier::Standard,
            tone_tag: None,
            price_per_1k_chars: *price_per_1k_chars,
        };
        catalog.add_voice(voice.clone());
        let base_url = env_or(&format!("TTS_{}_BASE_URL", provider_id.to_uppercase()), "http://localhost:8083");
        tts.push(Box::new(HttpTtsProvider::new(provider_id.clone(), base_url, vec![voice], *price_per_1k_chars)));
    }

    let video_source = Arc::new(YtDlpVideoFetcher::new(env_or("VIDEO_DOWNLOADER_BIN", "yt-dlp"), Duration::from_secs(1_800)));

    Providers {
        stt,
        post_edit: llm.clone(),
        translate: llm,
        tts,
        tts_catalog: catalog,
        video_source,
    }
}

fn app(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/transcribe", post(routes::submit_transcribe))
        .route("/v1/translate", post(routes::submit_translate))
        .route("/v1/synthesize", post(routes::submit_synthesize))
        .route("/v1/dub", post(routes::submit_dub))
        .route("/v1/jobs/:id", get(routes::get_job).delete(routes::delete_job))
        .route("/v1/jobs/:id/artifact", get(routes::get_artifact))
        .route("/v1/tts-providers", get(routes::list_tts_providers))
        .route("/v1/tts-providers/:id/voices", get(routes::list_provider_voices))
        .route("/v1/tts-cost-comparison", get(routes::tts_cost_comparison))
        .route("/openapi.json", get(openapi_json))
        .with_state(orchestrator)
        .layer(CorsLayer::new().allow_origin(cors::Any).allow_methods(cors::Any).allow_headers(cors::Any))
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &Request<Body>| {
                        let path = request.uri().path();
                        if path == "/health" {
                            return tracing::Span::none();
                        }
                        let method = request.method();
                        let matched_path = request.extensions().get::<MatchedPath>().map(MatchedPath::as_str).unwrap_or(path);
                        tracing::info_span!("http_request", method = %method, http.route = %matched_path)
                    })
                    .on_request(|request: &Request<Body>, _span: &tracing::Span| {
                        if request.uri().path() == "/health" {
                            return;
                        }
                        tracing::info!(method = %request.method(), path = %request.uri().path(), "http_request_started");
                    })
                    .on_response(|response: &axum::http::Response<Body>, latency: Duration, span: &tracing::Span| {
                        if span.is_disabled() {
                            return;
                        }
                        tracing::info!(parent: span, http_status = %response.status().as_u16(), latency_ms = %latency.as_millis(), "http_request_finished");
                    })
                    .on_failure(|failure_class: ServerErrorsFailureClass, latency: Duration, span: &tracing::Span| {
                        if span.is_disabled() {
                            return;
                        }
                        tracing::error!(parent: span, failure_class = ?failure_class, latency_ms = %latency.as_millis(), "http_request_failed");
                    }),
            ),
        )
}

async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(openapi::openapi())
}

/// Background sweep for spec §4.12's TTL cleanup: runs independently of
/// any job's lifecycle, since a completed job's artifacts must survive
/// the process that produced them.
async fn spawn_ttl_sweep(artifacts: Arc<ArtifactStore>, ttl: Duration) {
    let mut interval = tokio::time::interval(Duration::from_secs(3_600).min(ttl.max(Duration::from_secs(60))));
    loop {
        interval.tick().await;
        match artifacts.sweep_expired(ttl) {
            Ok(removed) if !removed.is_empty() => tracing::info!(count = removed.len(), "artifact_ttl_sweep_removed"),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "artifact_ttl_sweep_failed"),
        }
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C signal handler");
    tracing::info!("shutdown_signal_received");
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(async {
        let config = Arc::new(redub_config::config().clone());
        let providers = build_providers(&config).await;
        let artifacts = ArtifactStore::new(config.temp_dir.join("redub-artifacts"));
        let orchestrator = Arc::new(Orchestrator::new(providers, ArtifactStore::new(artifacts.root()), config.clone()));

        tokio::spawn(spawn_ttl_sweep(Arc::new(artifacts), config.artifact_ttl));

        let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tracing::info!(addr = %addr, "server_listening");

        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app(orchestrator)).with_graceful_shutdown(shutdown_signal()).await.unwrap();
    });

    Ok(())
}
