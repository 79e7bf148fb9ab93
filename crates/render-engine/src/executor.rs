//! Transcoder execution.
//!
//! Launches one external transcoder per job, feeds it the inputs and the
//! serialized filter graph, and turns its `-progress` stream into events.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clipforge_common::error::{ClipforgeError, ClipforgeResult};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::events::EventSink;
use crate::graph::FilterGraph;

/// Warn when the reported output time stops advancing for this long.
const STALL_WARNING: Duration = Duration::from_secs(10);

/// Everything needed to run one transcode.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Source files, ordered by input index.
    pub inputs: Vec<PathBuf>,

    /// Compiled graph.
    pub graph: FilterGraph,

    /// Encoder arguments placed after the stream mapping.
    pub encoding_args: Vec<String>,

    /// Output file.
    pub destination: PathBuf,

    /// Expected output length, used to derive percent complete.
    pub expected_duration_secs: f64,
}

impl TranscodeJob {
    /// Full transcoder argument vector.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
        ];

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.display().to_string());
        }

        args.push("-filter_complex".to_string());
        args.push(self.graph.to_filter_complex());
        args.extend(self.graph.map_args());
        args.extend(self.encoding_args.iter().cloned());
        args.push(self.destination.display().to_string());
        args
    }
}

/// Backend that executes transcode jobs.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run the job to completion, emitting `Started` and `Progress` events.
    ///
    /// Terminal events are left to the caller.
    async fn run(&self, job: &TranscodeJob, events: &mut EventSink) -> ClipforgeResult<()>;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Transcoder backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn describe(&self, args: &[String]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(args.iter().map(|a| {
            if a.contains(' ') || a.contains(';') {
                format!("'{a}'")
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, job: &TranscodeJob, events: &mut EventSink) -> ClipforgeResult<()> {
        let args = job.args();
        tracing::debug!(args = ?args, "Running ffmpeg");

        let mut child = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ClipforgeError::render(format!(
                    "Failed to start {}: {e}",
                    self.program.display()
                ))
            })?;

        let start = Instant::now();
        tracing::info!(
            pid = child.id(),
            inputs = job.inputs.len(),
            expected_duration_secs = job.expected_duration_secs,
            "ffmpeg process started"
        );
        events.started(self.describe(&args));

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClipforgeError::render("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClipforgeError::render("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so a chatty process never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut output = Vec::new();
            if let Err(err) = stderr.read_to_end(&mut output).await {
                tracing::warn!(error = %err, "Failed to read ffmpeg stderr");
            }
            String::from_utf8_lossy(&output).into_owned()
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        let mut last_out_time = 0.0f64;
        let mut last_advance = Instant::now();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| ClipforgeError::render(format!("Failed reading ffmpeg progress: {e}")))?
        {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key != "progress" {
                continue;
            }

            if state.out_time_secs > last_out_time + 0.001 {
                last_out_time = state.out_time_secs;
                last_advance = Instant::now();
            } else if last_advance.elapsed() >= STALL_WARNING {
                tracing::warn!(
                    out_time_secs = state.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_advance = Instant::now();
            }

            events.progress(
                state.percent(job.expected_duration_secs),
                state.timemark(),
            );
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ClipforgeError::render(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            tracing::error!(%status, "ffmpeg exited unsuccessfully");
            return Err(ClipforgeError::ProcessFailed {
                status: status.to_string(),
                diagnostics: stderr_output.trim().to_string(),
            });
        }

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            output = %job.destination.display(),
            "ffmpeg finished"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Latest values from the `-progress` key/value stream.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProgressState {
    pub out_time_secs: f64,
    pub out_time: Option<String>,
    pub complete: bool,
}

impl ProgressState {
    pub fn update(&mut self, key: &str, value: &str) {
        match key {
            // Despite the name, `out_time_ms` is reported in microseconds.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    if us.is_finite() && us >= 0.0 {
                        self.out_time_secs = us / 1_000_000.0;
                    }
                }
            }
            "out_time" => {
                if !value.starts_with('-') && value != "N/A" {
                    self.out_time = Some(value.to_string());
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    /// Percent complete against the expected output length.
    pub fn percent(&self, expected_duration_secs: f64) -> f64 {
        if self.complete {
            return 100.0;
        }
        if expected_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_duration_secs * 100.0).clamp(0.0, 100.0)
    }

    /// Human-readable position in the output (`HH:MM:SS.ss`).
    pub fn timemark(&self) -> String {
        if let Some(raw) = &self.out_time {
            return raw.clone();
        }
        format_timemark(self.out_time_secs)
    }
}

fn format_timemark(secs: f64) -> String {
    let total_centis = (secs.max(0.0) * 100.0).round() as u64;
    let hours = total_centis / 360_000;
    let minutes = (total_centis / 6_000) % 60;
    let seconds = (total_centis / 100) % 60;
    let centis = total_centis % 100;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{centis:02}")
}
