//! Shared subprocess execution (spec §9 design notes / §5 "Subprocesses"):
//! every external binary the orchestrator shells out to — the transcoder,
//! the video downloader — goes through [`spawn_with_deadline`] so stdio
//! draining, bounded capture, and kill-on-deadline are implemented exactly
//! once rather than ad hoc per call site.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exceeded its deadline of {deadline_secs:.1}s and was killed")]
    DeadlineExceeded { program: String, deadline_secs: f64 },
    #[error("failed to read output of `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of a finished child process. `stdout`/`stderr` are
/// truncated to `max_captured_bytes` (the stream is still fully drained to
/// avoid a full-pipe deadlock, just not all of it retained).
/// `stderr_last_line` is the last non-blank stderr line regardless of
/// truncation, since that's almost always what a caller's error needs.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stderr_last_line: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

const DEFAULT_MAX_CAPTURED_BYTES: usize = 64 * 1024;

/// Spawns `program` with `args`, drains stdout/stderr concurrently with
/// waiting on exit (never buffering the whole run in the kernel pipe), and
/// kills the child if it is still running once `deadline` elapses.
pub async fn spawn_with_deadline(
    program: &str,
    args: &[impl AsRef<OsStr>],
    cwd: Option<&Path>,
    deadline: Duration,
) -> Result<ProcessOutput, SubprocessError> {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| SubprocessError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let mut stdout_pipe = child.stdout.take().expect("stdout piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr piped");
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let run = async {
        let (stdout_res, stderr_res, wait_res) = tokio::join!(
            read_capped(&mut stdout_pipe, &mut stdout_buf, DEFAULT_MAX_CAPTURED_BYTES),
            read_capped(&mut stderr_pipe, &mut stderr_buf, DEFAULT_MAX_CAPTURED_BYTES),
            child.wait(),
        );
        stdout_res?;
        stderr_res?;
        wait_res.map_err(|source| SubprocessError::Io {
            program: program.to_string(),
            source,
        })
    };

    let status = match timeout(deadline, run).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!(program, deadline_secs = deadline.as_secs_f64(), "killing subprocess past deadline");
            let _ = child.kill().await;
            let _ = child.wait().await;
            return Err(SubprocessError::DeadlineExceeded {
                program: program.to_string(),
                deadline_secs: deadline.as_secs_f64(),
            });
        }
    };

    let stderr_last_line = String::from_utf8_lossy(&stderr_buf)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
        .to_string();

    Ok(ProcessOutput {
        exit_code: status.code(),
        stdout: stdout_buf,
        stderr: stderr_buf,
        stderr_last_line,
    })
}

async fn read_capped<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>, cap: usize) -> Result<(), SubprocessError> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await.map_err(|source| SubprocessError::Io {
            program: "child".to_string(),
            source,
        })?;
        if n == 0 {
            return Ok(());
        }
        if buf.len() < cap {
            let take = n.min(cap - buf.len());
            buf.extend_from_slice(&chunk[..take]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_run_captures_exit_code_and_stdout() {
        let out = spawn_with_deadline("sh", &["-c", "echo hello"], None, Duration::from_secs(5)).await.unwrap();
        assert!(out.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_an_error() {
        let out = spawn_with_deadline("sh", &["-c", "exit 3"], None, Duration::from_secs(5)).await.unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
    }

    #[tokio::test]
    async fn captures_last_nonblank_stderr_line() {
        let out = spawn_with_deadline(
            "sh",
            &["-c", "echo err1 1>&2; echo '' 1>&2; echo err2 1>&2; exit 1"],
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(out.stderr_last_line, "err2");
    }

    #[tokio::test]
    async fn deadline_exceeded_kills_the_child() {
        let result = spawn_with_deadline("sh", &["-c", "sleep 5"], None, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(SubprocessError::DeadlineExceeded { .. })));
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_as_spawn_error() {
        let result = spawn_with_deadline("redub-no-such-binary-xyz", &["--help"], None, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SubprocessError::Spawn { .. })));
    }
}
