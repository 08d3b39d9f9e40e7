//! The interactive dub flow (spec §6): prompts for the same fields as
//! `POST /v1/dub`'s body, in the fixed order the spec names — URL, test
//! mode, breath detection, post-edit on/off (+ model), translation
//! on/off (+ target language, context, audience, tone), TTS provider +
//! voice id, mux on/off — then submits the job and polls it to
//! completion. The prompt sequence and the resulting request shape are
//! the contract; rendering is intentionally unstyled.

use std::str::FromStr;

use redub_translate::ContextTag;
use redub_voice_equivalence::QualityTier;

use crate::client::{ApiClient, DubBody, PostEditBody};
use crate::prompt;

pub async fn run(client: &ApiClient) {
    let url = prompt::text("Video URL: ");
    let test_mode = prompt::confirm("Test mode", false);
    let breath_detection = prompt::confirm("Detect breaths/pauses", true);
    let language = prompt::text_default("Source language code", "en");

    let post_edit_enabled = prompt::confirm("Run post-edit cleanup", false);
    let post_edit = if post_edit_enabled {
        let model = prompt::text_default("Post-edit model", "auto");
        Some(PostEditBody { enabled: true, model: Some(model) })
    } else {
        None
    };

    let enable_translation = prompt::confirm("Translate", false);
    let (target_lang, context, audience, tone) = if enable_translation {
        let target_lang = prompt::text("Target language code: ");
        let context = prompt::parse_loop("Context (legal/spiritual/marketing/scientific/educational/news/casual): ", |s| ContextTag::from_str(s).ok());
        let audience = prompt::text_default("Target audience", "general");
        let tone = prompt::text_default("Desired tone", "neutral");
        (Some(target_lang), Some(context), Some(audience), Some(tone))
    } else {
        (None, None, None, None)
    };

    let enable_synthesis = prompt::confirm("Synthesize new speech", false);
    let (provider, voice_id) = if enable_synthesis {
        let provider = prompt::optional("TTS provider (blank = auto): ");
        let voice_id = prompt::optional("Voice id (blank = auto): ");
        (provider, voice_id)
    } else {
        (None, None)
    };

    let mux = prompt::confirm("Mux dubbed audio into the original video", false);

    let body = DubBody {
        url,
        test_mode,
        breath_detection,
        language,
        post_edit,
        enable_translation,
        target_lang,
        context,
        audience,
        tone,
        translation_quality: None,
        enable_synthesis,
        provider,
        voice_id,
        cost_first: false,
        quality: QualityTier::Standard,
        mux,
    };

    match client.submit_dub(&body).await {
        Ok(submitted) => {
            println!("submitted job {}", submitted.job_id);
            match crate::client::wait_for_terminal(client, &submitted.job_id).await {
                Ok(snapshot) => {
                    println!("job {} finished as {:?} (cost ${:.4})", snapshot.id, snapshot.status, snapshot.cost_total);
                    if let Some(error) = snapshot.error {
                        println!("error: {error}");
                        std::process::exit(1);
                    }
                }
                Err(err) => {
                    eprintln!("failed to poll job: {err}");
                    std::process::exit(1);
                }
            }
        }
        Err(err) => {
            eprintln!("failed to submit job: {err}");
            std::process::exit(1);
        }
    }
}
