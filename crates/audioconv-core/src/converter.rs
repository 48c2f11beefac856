//! External converter invocation.
//!
//! The converter is an opaque command-line tool (ffmpeg by default). It is
//! run through `tokio::process` so a long conversion parks only its own
//! request; the wall-clock timeout kills and reaps the process on expiry.

use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::ConvertError;
use crate::format::TargetFormat;

pub const DEFAULT_CONVERT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Only the tail of each output stream is kept.
const PIPE_TAIL_BYTES: usize = 64 * 1024;
/// How long to wait for pipe readers after the process has gone.
const PIPE_GRACE: Duration = Duration::from_secs(2);

/// Raw observations from one converter run, input to [`crate::classify`].
#[derive(Debug, Clone, Default)]
pub struct ConverterRun {
    /// `None` when the process was killed by a signal (including timeout).
    pub exit_code: Option<i32>,
    pub stderr: String,
    pub timed_out: bool,
    /// Output file exists and is nonempty.
    pub output_ready: bool,
    pub elapsed: Duration,
}

impl ConverterRun {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0) && self.output_ready
    }
}

/// The external conversion tool.
///
/// `Err` is reserved for process-level failures (the tool could not be
/// started at all). A tool that starts and fails is reported through
/// [`ConverterRun`] and left to the classifier.
#[async_trait]
pub trait Converter: Send + Sync + Debug {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        format: TargetFormat,
    ) -> Result<ConverterRun, ConvertError>;

    /// Version string reported by the tool.
    async fn version(&self) -> Result<String, ConvertError>;
}

/// ffmpeg-compatible command-line converter.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    program: PathBuf,
    timeout: Duration,
    probe_timeout: Duration,
}

impl FfmpegConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_CONVERT_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Arguments for one conversion.
///
/// `-f` pins the muxer to the validated format regardless of the output
/// filename.
pub fn conversion_args(input: &Path, output: &Path, format: TargetFormat) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.as_os_str().to_owned(),
        "-y".into(),
        "-f".into(),
        format.extension().into(),
        output.as_os_str().to_owned(),
    ]
}

#[async_trait]
impl Converter for FfmpegConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        format: TargetFormat,
    ) -> Result<ConverterRun, ConvertError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(conversion_args(input, output, format));

        debug!(
            program = %self.program.display(),
            input = %input.display(),
            output = %output.display(),
            %format,
            "starting converter"
        );

        let outcome = run_with_timeout(cmd, self.timeout).await.map_err(|e| {
            error!(program = %self.program.display(), error = %e, "failed to start converter");
            ConvertError::Internal("converter unavailable".into())
        })?;

        let output_ready = tokio::fs::metadata(output)
            .await
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false);

        let run = ConverterRun {
            exit_code: outcome.exit_code,
            stderr: String::from_utf8_lossy(&outcome.stderr).into_owned(),
            timed_out: outcome.timed_out,
            output_ready,
            elapsed: outcome.elapsed,
        };

        if run.succeeded() {
            info!(
                output = %output.display(),
                elapsed_ms = run.elapsed.as_millis(),
                "converter finished"
            );
        } else {
            warn!(
                exit_code = ?run.exit_code,
                timed_out = run.timed_out,
                output_ready = run.output_ready,
                elapsed_ms = run.elapsed.as_millis(),
                "converter run failed"
            );
        }
        Ok(run)
    }

    async fn version(&self) -> Result<String, ConvertError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-version");

        let outcome = run_with_timeout(cmd, self.probe_timeout).await.map_err(|e| {
            debug!(program = %self.program.display(), error = %e, "version query could not start");
            ConvertError::Internal(format!("converter unavailable: {e}"))
        })?;

        if outcome.timed_out {
            return Err(ConvertError::Timeout("version query timed out".into()));
        }
        if outcome.exit_code != Some(0) {
            return Err(ConvertError::ConversionFailed(format!(
                "version query exited with status {}",
                outcome.exit_code.map_or_else(|| "signal".to_owned(), |c| c.to_string())
            )));
        }

        let stdout = String::from_utf8_lossy(&outcome.stdout);
        parse_version(&stdout)
            .ok_or_else(|| ConvertError::Internal("converter printed no version".into()))
    }
}

/// Version token from `-version` output, e.g. `6.1.1` from
/// `ffmpeg version 6.1.1 Copyright (c) ...`. Falls back to the whole first line.
pub fn parse_version(output: &str) -> Option<String> {
    let first = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut words = first.split_whitespace();
    while let Some(word) = words.next() {
        if word.eq_ignore_ascii_case("version") {
            if let Some(v) = words.next() {
                return Some(v.to_owned());
            }
        }
    }
    Some(first.to_owned())
}

// ── process plumbing ─────────────────────────────────────────────────────────

/// What a bounded process run observed.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

/// Spawn `cmd` and wait at most `limit` for it.
///
/// Both output pipes are drained concurrently so a chatty tool cannot stall
/// on a full pipe. On expiry the child is killed and reaped before
/// returning. The child is also killed if this future is dropped.
///
/// `Err` only when the process cannot be spawned or waited on.
pub async fn run_with_timeout(mut cmd: Command, limit: Duration) -> std::io::Result<ProcessOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let mut child = cmd.spawn()?;

    let stdout_task = tokio::spawn(drain_tail(child.stdout.take(), PIPE_TAIL_BYTES));
    let stderr_task = tokio::spawn(drain_tail(child.stderr.take(), PIPE_TAIL_BYTES));

    let waited = timeout(limit, child.wait()).await;
    let (exit_code, timed_out) = match waited {
        Ok(status) => (status?.code(), false),
        Err(_) => {
            warn!(limit_secs = limit.as_secs_f64(), "process exceeded time limit; killing");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed-out process");
            }
            (None, true)
        }
    };

    let stdout = collect_pipe(stdout_task).await;
    let stderr = collect_pipe(stderr_task).await;

    Ok(ProcessOutcome {
        exit_code,
        stdout,
        stderr,
        timed_out,
        elapsed: started.elapsed(),
    })
}

async fn drain_tail<R: AsyncRead + Unpin>(reader: Option<R>, cap: usize) -> Vec<u8> {
    let Some(mut reader) = reader else {
        return Vec::new();
    };
    let mut kept = Vec::new();
    let mut chunk = vec![0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                kept.extend_from_slice(&chunk[..n]);
                if kept.len() > cap {
                    let excess = kept.len() - cap;
                    kept.drain(..excess);
                }
            }
            Err(e) => {
                debug!(error = %e, "pipe read failed");
                break;
            }
        }
    }
    kept
}

/// A grandchild may hold a pipe open past the child's exit; stop waiting
/// after [`PIPE_GRACE`].
async fn collect_pipe(mut task: JoinHandle<Vec<u8>>) -> Vec<u8> {
    match timeout(PIPE_GRACE, &mut task).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(e)) => {
            warn!(error = %e, "pipe reader task failed");
            Vec::new()
        }
        Err(_) => {
            task.abort();
            Vec::new()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn args_carry_input_overwrite_verbosity_and_output() {
        let args = conversion_args(Path::new("/s/in.wav"), Path::new("/o/out.ogg"), TargetFormat::Ogg);
        let args: Vec<String> = args.into_iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(
            args,
            ["-hide_banner", "-loglevel", "error", "-i", "/s/in.wav", "-y", "-f", "ogg", "/o/out.ogg"]
        );
    }

    #[test]
    fn version_token_is_extracted() {
        let out = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\nbuilt with gcc\n";
        assert_eq!(parse_version(out).as_deref(), Some("6.1.1-3ubuntu5"));
    }

    #[test]
    fn version_falls_back_to_first_line() {
        assert_eq!(parse_version("\n  mytool 2.0\n").as_deref(), Some("mytool 2.0"));
        assert_eq!(parse_version(""), None);
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let cmd = Command::new("/definitely/not/a/real/converter");
        assert!(run_with_timeout(cmd, Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn missing_program_is_internal_error() {
        let converter = FfmpegConverter::new("/definitely/not/a/real/converter");
        let err = converter
            .convert(Path::new("/in.wav"), Path::new("/out.mp3"), TargetFormat::Mp3)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Internal(_)));
        assert!(converter.version().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_exit_code_and_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo boom >&2; exit 3"]);

        let outcome = run_with_timeout(cmd, Duration::from_secs(10)).await.unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.timed_out);
        assert_eq!(String::from_utf8_lossy(&outcome.stderr).trim(), "boom");
        assert_eq!(String::from_utf8_lossy(&outcome.stdout).trim(), "out");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_is_killed_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");

        let outcome = run_with_timeout(cmd, Duration::from_millis(200)).await.unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.elapsed < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_keeps_only_the_tail() {
        let mut cmd = Command::new("sh");
        // ~100 KiB of noise followed by a marker line.
        cmd.args(["-c", "i=0; while [ $i -lt 2000 ]; do echo 'xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx' >&2; i=$((i+1)); done; echo LAST >&2"]);

        let outcome = run_with_timeout(cmd, Duration::from_secs(30)).await.unwrap();
        assert!(outcome.stderr.len() <= PIPE_TAIL_BYTES);
        assert!(String::from_utf8_lossy(&outcome.stderr).trim_end().ends_with("LAST"));
    }
}
