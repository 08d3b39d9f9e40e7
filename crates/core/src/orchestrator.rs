//! The Orchestrator (spec §4.1, §5): owns the fixed worker pool, runs
//! each job kind's stage sequence, and keeps the registry's progress/
//! cost ledgers current as stages report in.
//!
//! Dub is the representative pipeline — every stage runs. Transcribe,
//! Translate, and Synthesize reuse the same stage helpers as subsets,
//! the way the teacher's `transcribe-proxy` routes share one
//! attempt/retry driver across endpoints instead of duplicating it per
//! route.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use redub_artifacts::{ArtifactKind, ArtifactStore};
use redub_config::Config;
use redub_ledger::{JobKind, Stage};
use redub_llm_fallback::{AttemptError, FallbackPolicy};
use redub_muxer::{MuxerConfig, VideoSourceFetcher};
use redub_postedit::{post_edit, PostEditClient, PostEditConfig};
use redub_recognizer::{AudioMeta, RecognizerAdapter, RecognizerConfig, SttProvider};
use redub_segmenter::{segment, DEFAULT_SOFT_LINE_LIMIT};
use redub_translate::{translate, TranslateClient, TranslateConfig, TranslationParams};
use redub_tts::{select_provider, ProviderSelection, TtsProvider};
use redub_validators::JobId;
use redub_voice_equivalence::{ProviderCatalog, QualityTier, VoiceProfile};
use tokio::sync::Semaphore;

use crate::budget::{check_budget, effective_cap};
use crate::error::CoreError;
use crate::job::JobRecord;
use crate::media::{self, MediaConfig};
use crate::registry::JobRegistry;

struct DynStt(Arc<dyn SttProvider>);

#[async_trait]
impl SttProvider for DynStt {
    async fn transcribe_sync(
        &self,
        audio_path: &std::path::Path,
        language_tag: &str,
        breath_detection: bool,
    ) -> Result<Vec<redub_segmenter::RecognizedWord>, redub_recognizer::RecognizerError> {
        self.0.transcribe_sync(audio_path, language_tag, breath_detection).await
    }

    async fn submit_staged(
        &self,
        audio_path: &std::path::Path,
        language_tag: &str,
        breath_detection: bool,
    ) -> Result<redub_recognizer::StagedHandle, redub_recognizer::RecognizerError> {
        self.0.submit_staged(audio_path, language_tag, breath_detection).await
    }

    async fn poll(&self, handle: &redub_recognizer::StagedHandle) -> Result<redub_recognizer::PollStatus, redub_recognizer::RecognizerError> {
        self.0.poll(handle).await
    }
}

struct DynPostEdit(Arc<dyn PostEditClient>);

#[async_trait]
impl PostEditClient for DynPostEdit {
    async fn clean(&self, region: &str, model: &str, script_text: &str) -> Result<String, AttemptError> {
        self.0.clean(region, model, script_text).await
    }
}

struct DynTranslate(Arc<dyn TranslateClient>);

#[async_trait]
impl TranslateClient for DynTranslate {
    async fn translate(
        &self,
        region: &str,
        model: &str,
        instructions: &str,
        rendered_script: &str,
        params: &TranslationParams,
    ) -> Result<String, AttemptError> {
        self.0.translate(region, model, instructions, rendered_script, params).await
    }
}

/// The out-of-scope external collaborators every job draws on (spec
/// §1). Consumed only through their trait surfaces.
pub struct Providers {
    pub stt: Arc<dyn SttProvider>,
    pub post_edit: Arc<dyn PostEditClient>,
    pub translate: Arc<dyn TranslateClient>,
    pub tts: Vec<Box<dyn TtsProvider>>,
    pub tts_catalog: ProviderCatalog,
    pub video_source: Arc<dyn VideoSourceFetcher>,
}

/// TTS provider/voice selection as carried on the wire (spec §4.6),
/// before it is resolved against `ProviderCatalog`.
#[derive(Debug, Clone)]
pub struct TtsSelection {
    pub provider: Option<String>,
    pub voice_id: Option<String>,
    pub requested_voice: Option<VoiceProfile>,
    pub cost_first: bool,
}

#[derive(Debug, Clone)]
pub struct DubRequest {
    pub source_url: String,
    pub language_code: String,
    pub breath_detection: bool,
    pub run_post_edit: bool,
    pub post_edit_model: String,
    pub run_translate: bool,
    pub translation_params: Option<TranslationParams>,
    pub run_synthesize: bool,
    pub tts_selection: Option<TtsSelection>,
    pub quality_tier: QualityTier,
    pub run_mux: bool,
    pub max_cost_usd: Option<f64>,
}

/// `POST /v1/transcribe` (spec §6): download, decode, recognize,
/// segment, and optionally post-edit — the Dub pipeline's prefix.
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    pub source_url: String,
    pub language_code: String,
    pub breath_detection: bool,
    pub run_post_edit: bool,
    pub post_edit_model: String,
}

/// `POST /v1/translate` (spec §6): translates an already-produced
/// script, supplied as rendered text, without touching media at all.
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    pub rendered_script: String,
    pub params: TranslationParams,
}

/// `POST /v1/synthesize` (spec §6): synthesizes an already-produced
/// script, supplied as rendered text.
#[derive(Debug, Clone)]
pub struct SynthesizeRequest {
    pub rendered_script: String,
    pub tts_selection: TtsSelection,
    pub quality_tier: QualityTier,
    pub language_tag: String,
    pub max_cost_usd: Option<f64>,
}

pub struct Orchestrator {
    registry: Arc<JobRegistry>,
    providers: Arc<Providers>,
    artifacts: Arc<ArtifactStore>,
    config: Arc<Config>,
    semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(providers: Providers, artifacts: ArtifactStore, config: Arc<Config>) -> Self {
        let max_concurrent_jobs = config.max_concurrent_jobs;
        Self {
            registry: Arc::new(JobRegistry::new()),
            providers: Arc::new(providers),
            artifacts: Arc::new(artifacts),
            config,
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn tts_catalog(&self) -> &ProviderCatalog {
        &self.providers.tts_catalog
    }

    pub fn tts_providers(&self) -> &[Box<dyn TtsProvider>] {
        &self.providers.tts
    }

    /// Cancels the job's token (the pipeline observes it at its next
    /// checkpoint) and removes both the job record and its artifacts
    /// (spec §6 `DELETE /v1/jobs/{id}`, spec §4.12).
    pub fn delete_job(&self, id: &JobId) -> Result<(), CoreError> {
        let _ = self.registry.cancel(id);
        self.registry.remove(id)?;
        self.artifacts.remove_job_dir(id)?;
        Ok(())
    }

    /// Registers the job and spawns its worker; returns immediately
    /// with the new job's id (spec §6 `POST /v1/dub` is async).
    pub fn submit_dub(self: &Arc<Self>, request: DubRequest) -> JobId {
        let record = JobRecord::new(JobKind::Dub);
        let id = record.id.clone();
        let token = self.registry.insert(record);

        let this = Arc::clone(self);
        let spawned_id = id.clone();
        tokio::spawn(async move {
            let _permit = this.semaphore.acquire().await.expect("semaphore is never closed");
            let id2 = spawned_id.clone();
            finish_job(&this.registry, spawned_id, this.run_dub_pipeline(&id2, &token, &request)).await;
        });

        id
    }

    /// Registers and spawns a `transcribe`-kind job (spec §6
    /// `POST /v1/transcribe`): the Dub pipeline's prefix, no post-edit
    /// output beyond what `run_post_edit` controls.
    pub fn submit_transcribe(self: &Arc<Self>, request: TranscribeRequest) -> JobId {
        let record = JobRecord::new(JobKind::Transcribe);
        let id = record.id.clone();
        let token = self.registry.insert(record);

        let this = Arc::clone(self);
        let spawned_id = id.clone();
        tokio::spawn(async move {
            let _permit = this.semaphore.acquire().await.expect("semaphore is never closed");
            let id2 = spawned_id.clone();
            finish_job(&this.registry, spawned_id, this.run_transcribe_pipeline(&id2, &token, &request)).await;
        });

        id
    }

    async fn run_transcribe_pipeline(&self, id: &JobId, token: &crate::cancellation::CancellationToken, request: &TranscribeRequest) -> Result<(), CoreError> {
        check_cancelled(token)?;
        let workdir = tempfile::tempdir().map_err(|err| CoreError::StageFailed(err.to_string()))?;
        let media_config = MediaConfig::default();

        let downloaded = workdir.path().join("source.wav");
        media::download_audio(&request.source_url, &downloaded, &media_config).await?;
        self.report(id, Stage::Download, 100);
        check_cancelled(token)?;

        let decoded = workdir.path().join("decoded.wav");
        media::decode_audio(&downloaded, &decoded, &media_config).await?;
        self.report(id, Stage::Decode, 100);
        check_cancelled(token)?;

        let meta = media::probe_audio(&decoded, &media_config).await?;
        let words = self.recognize(id, token, &decoded, meta, &request.language_code, request.breath_detection).await?;
        check_cancelled(token)?;

        let (mut script, _stats) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        self.report(id, Stage::Segment, 100);
        self.artifacts.write(id, &ArtifactKind::Transcript, script.render().as_bytes())?;

        if request.run_post_edit {
            script = self.run_post_edit(id, &script, &request.post_edit_model).await?;
        } else {
            self.report(id, Stage::PostEdit, 100);
        }
        self.artifacts.write(id, &ArtifactKind::Script, script.render().as_bytes())?;
        Ok(())
    }

    /// Registers and spawns a `translate`-kind job.
    pub fn submit_translate(self: &Arc<Self>, request: TranslateRequest) -> Result<JobId, CoreError> {
        let record = JobRecord::new(JobKind::Translate);
        let id = record.id.clone();
        let _token = self.registry.insert(record);

        let this = Arc::clone(self);
        let spawned_id = id.clone();
        tokio::spawn(async move {
            let _permit = this.semaphore.acquire().await.expect("semaphore is never closed");
            let id2 = spawned_id.clone();
            finish_job(&this.registry, spawned_id, this.run_translate_pipeline(&id2, &request)).await;
        });

        Ok(id)
    }

    async fn run_translate_pipeline(&self, id: &JobId, request: &TranslateRequest) -> Result<(), CoreError> {
        let script = redub_segmenter::parse_script_text(&request.rendered_script).map_err(|err| CoreError::InvalidRequest(err.to_string()))?;
        let translated = self.run_translate(id, &script, &request.params).await?;
        let lang = request.params.target_language.clone();
        self.artifacts.write(id, &ArtifactKind::Translated { lang }, translated.render().as_bytes())?;
        Ok(())
    }

    /// Registers and spawns a `synthesize`-kind job.
    pub fn submit_synthesize(self: &Arc<Self>, request: SynthesizeRequest) -> Result<JobId, CoreError> {
        let record = JobRecord::new(JobKind::Synthesize);
        let id = record.id.clone();
        let _token = self.registry.insert(record);

        let this = Arc::clone(self);
        let spawned_id = id.clone();
        tokio::spawn(async move {
            let _permit = this.semaphore.acquire().await.expect("semaphore is never closed");
            let id2 = spawned_id.clone();
            finish_job(&this.registry, spawned_id, this.run_synthesize_pipeline(&id2, &request)).await;
        });

        Ok(id)
    }

    async fn run_synthesize_pipeline(&self, id: &JobId, request: &SynthesizeRequest) -> Result<(), CoreError> {
        let script = redub_segmenter::parse_script_text(&request.rendered_script).map_err(|err| CoreError::InvalidRequest(err.to_string()))?;
        let workdir = tempfile::tempdir().map_err(|err| CoreError::StageFailed(err.to_string()))?;
        self.run_synthesize(
            id,
            &script,
            &request.tts_selection,
            request.quality_tier,
            &request.language_tag,
            workdir.path(),
            request.max_cost_usd,
        )
        .await?;
        Ok(())
    }

    async fn run_dub_pipeline(&self, id: &JobId, token: &crate::cancellation::CancellationToken, request: &DubRequest) -> Result<(), CoreError> {
        check_cancelled(token)?;

        // Every intermediate pipeline file lives under this directory;
        // it is removed on every exit path via `Drop`. Final artifacts
        // go through `self.artifacts` and are never touched here.
        let workdir = tempfile::tempdir().map_err(|err| CoreError::StageFailed(err.to_string()))?;
        let media_config = MediaConfig::default();

        let downloaded = workdir.path().join("source.wav");
        media::download_audio(&request.source_url, &downloaded, &media_config).await?;
        self.report(id, Stage::Download, 100);
        check_cancelled(token)?;

        let decoded = workdir.path().join("decoded.wav");
        media::decode_audio(&downloaded, &decoded, &media_config).await?;
        self.report(id, Stage::Decode, 100);
        check_cancelled(token)?;

        let meta: AudioMeta = media::probe_audio(&decoded, &media_config).await?;
        check_cancelled(token)?;

        let words = self.recognize(id, token, &decoded, meta, &request.language_code, request.breath_detection).await?;
        check_cancelled(token)?;

        let (mut script, _stats) = segment(&words, DEFAULT_SOFT_LINE_LIMIT);
        self.report(id, Stage::Segment, 100);
        self.artifacts.write(id, &ArtifactKind::Transcript, script.render().as_bytes())?;
        check_cancelled(token)?;

        if request.run_post_edit {
            script = self.run_post_edit(id, &script, &request.post_edit_model).await?;
        } else {
            self.report(id, Stage::PostEdit, 100);
        }
        self.artifacts.write(id, &ArtifactKind::Script, script.render().as_bytes())?;
        check_cancelled(token)?;

        let mut final_script = script.clone();
        if request.run_translate {
            let params = request
                .translation_params
                .as_ref()
                .ok_or(CoreError::InvalidRequest("translation requested without translation parameters".into()))?;
            final_script = self.run_translate(id, &script, params).await?;
            let lang = params.target_language.clone();
            self.artifacts.write(id, &ArtifactKind::Translated { lang }, final_script.render().as_bytes())?;
        } else {
            self.report(id, Stage::Translate, 100);
        }
        check_cancelled(token)?;

        let mut synthesized_audio: Option<PathBuf> = None;
        if request.run_synthesize {
            let selection = request.tts_selection.as_ref().ok_or(CoreError::InvalidRequest("synthesis requested without a tts selection".into()))?;
            let lang = request.translation_params.as_ref().map(|p| p.target_language.clone()).unwrap_or_else(|| request.language_code.clone());
            synthesized_audio =
                Some(self.run_synthesize(id, &final_script, selection, request.quality_tier, &lang, workdir.path(), request.max_cost_usd).await?);
        } else {
            self.report(id, Stage::Synthesize, 100);
        }
        check_cancelled(token)?;

        if request.run_mux {
            let audio_path = synthesized_audio.ok_or(CoreError::InvalidRequest("mux requested without a synthesized audio track".into()))?;
            self.run_mux(id, &request.source_url, &audio_path).await?;
        } else {
            self.report(id, Stage::Mux, 100);
        }

        Ok(())
    }

    async fn recognize(
        &self,
        id: &JobId,
        token: &crate::cancellation::CancellationToken,
        decoded: &std::path::Path,
        meta: AudioMeta,
        language_code: &str,
        breath_detection: bool,
    ) -> Result<Vec<redub_segmenter::RecognizedWord>, CoreError> {
        let adapter = RecognizerAdapter::new(DynStt(Arc::clone(&self.providers.stt)), RecognizerConfig::default());
        let registry = &self.registry;
        let words = adapter
            .transcribe(
                decoded,
                meta,
                language_code,
                breath_detection,
                |pct| {
                    let _ = registry.with_record(id, |r| r.progress.report(Stage::Recognize, pct));
                },
                || token.is_cancelled(),
            )
            .await?;
        Ok(words)
    }

    async fn run_post_edit(&self, id: &JobId, script: &redub_segmenter::Script, model: &str) -> Result<redub_segmenter::Script, CoreError> {
        let policy = FallbackPolicy::expand(model, &["gpt-4o-mini".to_string()], self.config.region_list.clone());
        let outcome = post_edit(script, &DynPostEdit(Arc::clone(&self.providers.post_edit)), &policy, &PostEditConfig {
            single_call_budget_chars: self.config.chunk_size,
            chunk_overlap_chars: self.config.chunk_overlap,
            max_chunks: self.config.max_chunks,
        })
        .await?;
        self.report(id, Stage::PostEdit, 100);
        Ok(outcome.value)
    }

    async fn run_translate(&self, id: &JobId, script: &redub_segmenter::Script, params: &TranslationParams) -> Result<redub_segmenter::Script, CoreError> {
        let policy = FallbackPolicy::expand("auto", &["gpt-4o".to_string()], self.config.region_list.clone());
        let outcome = translate(script, &DynTranslate(Arc::clone(&self.providers.translate)), &policy, params, &TranslateConfig {
            single_call_budget_chars: self.config.chunk_size,
            chunk_overlap_chars: self.config.chunk_overlap,
            max_chunks: self.config.max_chunks,
            ..TranslateConfig::default()
        })
        .await?;
        self.report(id, Stage::Translate, 100);
        Ok(outcome.value)
    }

    async fn run_synthesize(
        &self,
        id: &JobId,
        script: &redub_segmenter::Script,
        selection: &TtsSelection,
        quality: QualityTier,
        language_tag: &str,
        workdir: &std::path::Path,
        max_cost_usd: Option<f64>,
    ) -> Result<PathBuf, CoreError> {
        let resolved = match (&selection.provider, &selection.voice_id) {
            (Some(provider), Some(voice_id)) => ProviderSelection::Explicit {
                provider: provider.clone(),
                voice_id: voice_id.clone(),
            },
            _ => ProviderSelection::Auto {
                requested_voice: selection
                    .requested_voice
                    .clone()
                    .ok_or(CoreError::InvalidRequest("auto tts selection requires a requested voice profile".into()))?,
                cost_first: selection.cost_first,
            },
        };

        let (provider, voice) = select_provider(&self.providers.tts, &self.providers.tts_catalog, &resolved, language_tag)?;

        let rendered_chars = script.render().chars().count() as f64;
        let quote = provider.quote(&script.render(), &voice.voice_id, quality)?;
        let rate = quote.amount / rendered_chars.max(1.0);

        let cost_before_quote = self.registry.with_record(id, |r| r.cost.clone())?;
        let cap = effective_cap(max_cost_usd, self.config.max_cost_usd_per_job);
        check_budget(&cost_before_quote, rendered_chars, rate, cap)?;
        self.registry.with_record(id, |r| r.cost.quote(Stage::Synthesize, rendered_chars, rate))?;

        // Synthesize per-chunk, up to `max_concurrent_jobs` chunks in
        // flight at once, when the script is large enough that a single
        // call risks the provider's own input limits (spec §4.7); chunk
        // concatenation is byte-level, so this relies on the provider
        // emitting a concat-safe container (see
        // `redub_tts_providers::chunking`'s module doc).
        let chunks = redub_tts_providers::split_into_synthesis_chunks(script, self.config.chunk_size);
        let chunk_count = chunks.len().max(1) as u32;
        let paragraph_break_before: Vec<bool> = chunks.iter().map(|c| c.lines.first().map(|l| l.paragraph_break_before).unwrap_or(false)).collect();

        let next_index = std::sync::atomic::AtomicUsize::new(0);
        let completed = std::sync::atomic::AtomicU32::new(0);
        let synthesized_secs = std::sync::Mutex::new(0.0_f64);
        let chunk_lens = std::sync::Mutex::new(vec![0usize; chunk_count as usize]);
        let voice_id = voice.voice_id.clone();
        let registry = &self.registry;

        let audio_bytes = redub_tts_providers::synthesize_chunked(chunks, self.config.max_concurrent_jobs, |chunk| {
            let index = next_index.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let voice_id = voice_id.clone();
            async move {
                let piece = provider.synthesize(&chunk, &voice_id, quality, "wav").await?;
                *synthesized_secs.lock().expect("synthesized_secs mutex poisoned") += piece.duration_secs;
                chunk_lens.lock().expect("chunk_lens mutex poisoned")[index] = piece.audio_bytes.len();
                let done = completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                let _ = registry.with_record(id, |r| r.progress.report(Stage::Synthesize, (done * 100) / chunk_count));
                Ok(piece.audio_bytes)
            }
        })
        .await?;

        self.registry.with_record(id, |r| r.cost.actual(Stage::Synthesize, rendered_chars, rate))?;
        self.report(id, Stage::Synthesize, 100);

        let synthesized_duration_secs = *synthesized_secs.lock().expect("synthesized_secs mutex poisoned");
        let source_duration_secs = script.lines.last().map(|l| l.timestamp_secs as f64).unwrap_or(0.0);
        let paragraph_break_byte_offsets: Vec<usize> = {
            let lens = chunk_lens.lock().expect("chunk_lens mutex poisoned");
            let mut offsets = Vec::new();
            let mut running = 0usize;
            for (i, len) in lens.iter().enumerate() {
                if paragraph_break_before[i] && running > 0 {
                    offsets.push(running);
                }
                running += len;
            }
            offsets
        };
        // One frame of 16-bit silence; every provider adapter is asked
        // to emit raw PCM or PCM-compatible WAV for this reason (see
        // `redub_tts_providers::chunking`'s module doc).
        let silence_frame = [0u8, 0u8];
        let reconciled = redub_tts_providers::reconcile_timing(
            audio_bytes,
            synthesized_duration_secs,
            source_duration_secs,
            &paragraph_break_byte_offsets,
            &silence_frame,
        );
        if let Some(warning) = &reconciled.overrun_warning {
            tracing::warn!(job_id = %id.as_str(), %warning, "synthesized audio overran source duration");
        }
        let audio_bytes = reconciled.audio_bytes;

        let out_path = workdir.join("synthesized.wav");
        tokio::fs::write(&out_path, &audio_bytes).await.map_err(|err| CoreError::StageFailed(err.to_string()))?;
        self.artifacts.write(id, &ArtifactKind::Audio { lang: language_tag.to_string(), ext: "wav".to_string() }, &audio_bytes)?;
        Ok(out_path)
    }

    async fn run_mux(&self, id: &JobId, source_url: &str, audio_path: &std::path::Path) -> Result<(), CoreError> {
        let job_dir = self.artifacts.ensure_job_dir(id)?;
        let output_path = job_dir.join(
            ArtifactKind::Dubbed {
                lang: "out".to_string(),
                ext: "mp4".to_string(),
            }
            .filename()?,
        );
        redub_muxer::mux(self.providers.video_source.as_ref(), source_url, audio_path, &output_path, &MuxerConfig::default()).await?;
        self.report(id, Stage::Mux, 100);
        Ok(())
    }

    fn report(&self, id: &JobId, stage: Stage, pct: u32) {
        let _ = self.registry.with_record(id, |r| r.progress.report(stage, pct));
    }
}

fn check_cancelled(token: &crate::cancellation::CancellationToken) -> Result<(), CoreError> {
    if token.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    Ok(())
}

/// Drives `start -> pipeline -> complete|fail|cancel` for any job kind;
/// every `submit_*` entry point funnels through this so the transition
/// bookkeeping lives in exactly one place. Takes only a shared borrow
/// of the registry so callers never need to move an owned `Arc` out of
/// a borrowed `self`.
async fn finish_job(registry: &JobRegistry, id: JobId, pipeline: impl std::future::Future<Output = Result<(), CoreError>>) {
    let _ = registry.with_record(&id, |r| r.start());

    match pipeline.await {
        Ok(()) => {
            let _ = registry.with_record(&id, |r| r.complete());
        }
        Err(CoreError::Cancelled) => {
            let _ = registry.with_record(&id, |r| r.cancel());
        }
        Err(err) => {
            let _ = registry.with_record(&id, |r| r.fail(err));
        }
    }
}
