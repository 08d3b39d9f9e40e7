//! Video Muxer (spec §4.8): given the original media's URL and a new audio
//! file, produces a container with the original video stream copied (no
//! re-encode) and the new audio stream transcoded to the container's
//! canonical codec, truncated to the shorter of the two streams.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use redub_subprocess::{spawn_with_deadline, SubprocessError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuxerError {
    #[error("could not fetch the original video-only stream: {0}")]
    SourceUnavailable(String),
    #[error("transcoder failed (exit {exit_code:?}): {stderr_last_line}")]
    MuxerFailed { exit_code: Option<i32>, stderr_last_line: String },
}

impl From<SubprocessError> for MuxerError {
    fn from(err: SubprocessError) -> Self {
        match err {
            SubprocessError::DeadlineExceeded { .. } => MuxerError::MuxerFailed {
                exit_code: None,
                stderr_last_line: err.to_string(),
            },
            other => MuxerError::MuxerFailed {
                exit_code: None,
                stderr_last_line: other.to_string(),
            },
        }
    }
}

/// The video-downloader tool is an out-of-scope external collaborator
/// (spec §1): the muxer consumes it only through this contract.
#[async_trait]
pub trait VideoSourceFetcher: Send + Sync {
    /// Fetches the video-only stream of `source_url` to `dest`. Any `Err`
    /// here is treated as non-retryable and surfaces as `SourceUnavailable`.
    async fn fetch_video_only(&self, source_url: &str, dest: &Path) -> Result<(), String>;
}

#[derive(Debug, Clone)]
pub struct MuxerConfig {
    pub transcoder_bin: String,
    pub deadline: Duration,
    /// Canonical audio codec for the output container (e.g. `aac` for mp4).
    pub audio_codec: String,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            transcoder_bin: "ffmpeg".to_string(),
            deadline: Duration::from_secs(600),
            audio_codec: "aac".to_string(),
        }
    }
}

/// Produces `output_path` by copying `source_url`'s video stream unmodified
/// and encoding `new_audio_path`'s audio to `config.audio_codec`, with
/// `-shortest` truncating to whichever stream is shorter.
pub async fn mux(
    fetcher: &dyn VideoSourceFetcher,
    source_url: &str,
    new_audio_path: &Path,
    output_path: &Path,
    config: &MuxerConfig,
) -> Result<PathBuf, MuxerError> {
    let workdir = tempfile::tempdir().map_err(|err| MuxerError::SourceUnavailable(err.to_string()))?;
    let video_only_path = workdir.path().join("video_only");

    fetcher.fetch_video_only(source_url, &video_only_path).await.map_err(MuxerError::SourceUnavailable)?;

    let args = [
        "-y".to_string(),
        "-i".to_string(),
        video_only_path.to_string_lossy().into_owned(),
        "-i".to_string(),
        new_audio_path.to_string_lossy().into_owned(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        config.audio_codec.clone(),
        "-shortest".to_string(),
        output_path.to_string_lossy().into_owned(),
    ];

    let out = spawn_with_deadline(&config.transcoder_bin, &args, None, config.deadline).await?;

    if !out.success() {
        return Err(MuxerError::MuxerFailed {
            exit_code: out.exit_code,
            stderr_last_line: out.stderr_last_line,
        });
    }

    if !output_path.exists() {
        return Err(MuxerError::MuxerFailed {
            exit_code: out.exit_code,
            stderr_last_line: "transcoder exited 0 but produced no output file".to_string(),
        });
    }

    Ok(output_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    struct StubFetcher {
        should_fail: bool,
    }

    #[async_trait]
    impl VideoSourceFetcher for StubFetcher {
        async fn fetch_video_only(&self, _source_url: &str, dest: &Path) -> Result<(), String> {
            if self.should_fail {
                return Err("404 from video host".to_string());
            }
            fs::write(dest, b"fake-video-bytes").map_err(|err| err.to_string())
        }
    }

    fn fake_transcoder(dir: &Path, script: &str) -> String {
        let path = dir.join("fake-transcoder.sh");
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn source_unavailable_short_circuits_before_invoking_transcoder() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher { should_fail: true };
        let output_path = dir.path().join("out.mp4");
        let config = MuxerConfig {
            transcoder_bin: "sh".to_string(),
            ..Default::default()
        };
        let result = mux(&fetcher, "https://example.com/video", Path::new("/tmp/audio.wav"), &output_path, &config).await;
        assert!(matches!(result, Err(MuxerError::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn successful_transcode_returns_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher { should_fail: false };
        let output_path = dir.path().join("out.mp4");
        let bin = fake_transcoder(dir.path(), "for a in \"$@\"; do out=\"$a\"; done\ntouch \"$out\"\nexit 0");
        let config = MuxerConfig {
            transcoder_bin: bin,
            ..Default::default()
        };
        let result = mux(&fetcher, "https://example.com/video", Path::new("/tmp/audio.wav"), &output_path, &config)
            .await
            .unwrap();
        assert_eq!(result, output_path);
        assert!(output_path.exists());
    }

    #[tokio::test]
    async fn transcoder_nonzero_exit_is_muxer_failed_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher { should_fail: false };
        let output_path = dir.path().join("out.mp4");
        let bin = fake_transcoder(dir.path(), "echo boom 1>&2\nexit 2");
        let config = MuxerConfig {
            transcoder_bin: bin,
            ..Default::default()
        };
        let result = mux(&fetcher, "https://example.com/video", Path::new("/tmp/audio.wav"), &output_path, &config).await;
        match result {
            Err(MuxerError::MuxerFailed { exit_code, stderr_last_line }) => {
                assert_eq!(exit_code, Some(2));
                assert_eq!(stderr_last_line, "boom");
            }
            other => panic!("expected MuxerFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_output_file_despite_zero_exit_is_muxer_failed() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher { should_fail: false };
        let output_path = dir.path().join("out.mp4");
        let bin = fake_transcoder(dir.path(), "exit 0");
        let config = MuxerConfig {
            transcoder_bin: bin,
            ..Default::default()
        };
        let result = mux(&fetcher, "https://example.com/video", Path::new("/tmp/audio.wav"), &output_path, &config).await;
        assert!(matches!(result, Err(MuxerError::MuxerFailed { .. })));
    }
}
