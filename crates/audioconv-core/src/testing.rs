//! In-process [`Converter`] with scripted behaviour, for tests that must not
//! depend on a real ffmpeg binary.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::converter::{Converter, ConverterRun};
use crate::error::ConvertError;
use crate::format::TargetFormat;

/// What the scripted converter does on every call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Copy input bytes to the output path and exit 0.
    Copy,
    /// Exit with `exit_code`, optionally leaving a partial output file.
    Fail {
        exit_code: i32,
        stderr: String,
        partial_output: bool,
    },
    /// Leave a partial output file and report a timeout.
    TimeOut { elapsed: Duration },
    /// Exit 0 without writing anything.
    NoOutput,
    /// Behave like a binary that cannot be started.
    Unavailable,
    /// Write partial output, then never finish.
    Stall,
}

#[derive(Debug)]
pub struct ScriptedConverter {
    script: Script,
    delay: Duration,
    version: String,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedConverter {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            version: "6.1.1-scripted".to_owned(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every conversion.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous `convert` calls observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Converter for ScriptedConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        _format: TargetFormat,
    ) -> Result<ConverterRun, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.run_script(input, output).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn version(&self) -> Result<String, ConvertError> {
        match self.script {
            Script::Unavailable => Err(ConvertError::Internal("converter unavailable".into())),
            _ => Ok(self.version.clone()),
        }
    }
}

impl ScriptedConverter {
    async fn run_script(&self, input: &Path, output: &Path) -> Result<ConverterRun, ConvertError> {
        match &self.script {
            Script::Copy => {
                tokio::fs::copy(input, output).await?;
                Ok(ConverterRun {
                    exit_code: Some(0),
                    output_ready: true,
                    ..Default::default()
                })
            }
            Script::Fail { exit_code, stderr, partial_output } => {
                if *partial_output {
                    tokio::fs::write(output, b"partial").await?;
                }
                Ok(ConverterRun {
                    exit_code: Some(*exit_code),
                    stderr: stderr.clone(),
                    output_ready: *partial_output,
                    ..Default::default()
                })
            }
            Script::TimeOut { elapsed } => {
                tokio::fs::write(output, b"partial").await?;
                Ok(ConverterRun {
                    exit_code: None,
                    timed_out: true,
                    output_ready: true,
                    elapsed: *elapsed,
                    ..Default::default()
                })
            }
            Script::NoOutput => Ok(ConverterRun {
                exit_code: Some(0),
                ..Default::default()
            }),
            Script::Unavailable => Err(ConvertError::Internal("converter unavailable".into())),
            Script::Stall => {
                tokio::fs::write(output, b"partial").await?;
                std::future::pending().await
            }
        }
    }
}
