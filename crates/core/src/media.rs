//! Download + decode (spec §4.1 stages 1-2). Both the video-downloader
//! tool and the audio transcoder binary are out-of-scope external
//! collaborators (spec §1) — this module only owns invoking them
//! through `redub_subprocess::spawn_with_deadline` and reading back
//! what they produced, the same pattern `redub_muxer` uses for the
//! transcoder's replace-audio invocation.

use std::path::Path;
use std::time::Duration;

use redub_recognizer::AudioMeta;
use redub_subprocess::spawn_with_deadline;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum MediaError {
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("could not read decoded audio metadata: {0}")]
    ProbeFailed(String),
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub downloader_bin: String,
    pub transcoder_bin: String,
    pub probe_bin: String,
    pub deadline: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            downloader_bin: "yt-dlp".to_string(),
            transcoder_bin: "ffmpeg".to_string(),
            probe_bin: "ffprobe".to_string(),
            deadline: Duration::from_secs(1_800),
        }
    }
}

/// Downloads `source_url`'s best audio track to `dest`.
pub async fn download_audio(source_url: &str, dest: &Path, config: &MediaConfig) -> Result<(), MediaError> {
    let args = [
        "-x".to_string(),
        "--audio-format".to_string(),
        "wav".to_string(),
        "-o".to_string(),
        dest.to_string_lossy().into_owned(),
        source_url.to_string(),
    ];
    let out = spawn_with_deadline(&config.downloader_bin, &args, None, config.deadline)
        .await
        .map_err(|err| MediaError::DownloadFailed(err.to_string()))?;
    if !out.success() {
        return Err(MediaError::DownloadFailed(out.stderr_last_line));
    }
    Ok(())
}

/// Decodes `input` to a canonical mono 16kHz PCM WAV at `dest`, the
/// shape the recognizer expects.
pub async fn decode_audio(input: &Path, dest: &Path, config: &MediaConfig) -> Result<(), MediaError> {
    let args = [
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-ac".to_string(),
        "1".to_string(),
        "-ar".to_string(),
        "16000".to_string(),
        dest.to_string_lossy().into_owned(),
    ];
    let out = spawn_with_deadline(&config.transcoder_bin, &args, None, config.deadline)
        .await
        .map_err(|err| MediaError::DecodeFailed(err.to_string()))?;
    if !out.success() {
        return Err(MediaError::DecodeFailed(out.stderr_last_line));
    }
    Ok(())
}

/// Probes decoded audio for size + duration — the recognizer's sync vs
/// staged decision (spec §4.4) needs both.
pub async fn probe_audio(path: &Path, config: &MediaConfig) -> Result<AudioMeta, MediaError> {
    let size_bytes = tokio::fs::metadata(path).await.map_err(|err| MediaError::ProbeFailed(err.to_string()))?.len();

    let args = [
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.to_string_lossy().into_owned(),
    ];
    let out = spawn_with_deadline(&config.probe_bin, &args, None, config.deadline)
        .await
        .map_err(|err| MediaError::ProbeFailed(err.to_string()))?;
    if !out.success() {
        return Err(MediaError::ProbeFailed(out.stderr_last_line));
    }

    let duration_secs: f64 = String::from_utf8_lossy(&out.stdout)
        .trim()
        .parse()
        .map_err(|_| MediaError::ProbeFailed("ffprobe returned an unparseable duration".to_string()))?;

    Ok(AudioMeta { size_bytes, duration_secs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn fake_bin(dir: &Path, name: &str, script: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn download_failure_surfaces_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_bin(dir.path(), "dl.sh", "echo '404 not found' 1>&2\nexit 1");
        let config = MediaConfig {
            downloader_bin: bin,
            ..Default::default()
        };
        let err = download_audio("https://example.com/video", &dir.path().join("out.wav"), &config).await.unwrap_err();
        assert!(matches!(err, MediaError::DownloadFailed(ref msg) if msg == "404 not found"));
    }

    #[tokio::test]
    async fn probe_reads_duration_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("a.wav");
        fs::write(&audio, b"fake-audio-bytes").unwrap();
        let probe_bin = fake_bin(dir.path(), "ffprobe.sh", "echo 12.5");
        let config = MediaConfig {
            probe_bin,
            ..Default::default()
        };
        let meta = probe_audio(&audio, &config).await.unwrap();
        assert_eq!(meta.size_bytes, 16);
        assert!((meta.duration_secs - 12.5).abs() < 1e-9);
    }
}
