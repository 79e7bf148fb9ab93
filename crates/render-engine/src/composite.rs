//! Picture-in-picture composition of finalized captures.
//!
//! The screen capture and camera capture are placed on two lanes of a
//! throwaway project and compiled in overlay mode: the same planner and
//! compiler used for timeline export, with a different join.

use std::path::{Path, PathBuf};

use clipforge_common::clock::RecordingClock;
use clipforge_common::error::ClipforgeResult;
use clipforge_project_model::{
    normalize, Clip, ProjectDocument, RuntimeProject, Track, TrackItem, TrackKind,
};
use serde::Serialize;

use crate::events::EventSink;
use crate::executor::TranscodeJob;
use crate::export::{ensure_destination_writable, validate_destination, Exporter};
use crate::graph::{compile, CompileMode};
use crate::plan::plan_segments;

/// Probed and measured durations further apart than this are logged.
const DURATION_DRIFT_WARN_SECS: f64 = 1.0;

/// A finalized capture file handed over by the recorder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureArtifact {
    pub path: PathBuf,

    /// Wall-clock length measured while recording, if known.
    pub measured_duration_secs: Option<f64>,
}

impl CaptureArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            measured_duration_secs: None,
        }
    }

    pub fn with_measured_duration(mut self, secs: f64) -> Self {
        self.measured_duration_secs = Some(secs);
        self
    }

    /// Capture whose duration comes from the recorder's clock.
    pub fn from_clock(path: impl Into<PathBuf>, clock: &RecordingClock) -> Self {
        Self::new(path).with_measured_duration(clock.measured_duration_secs())
    }

    fn measured(&self) -> Option<f64> {
        self.measured_duration_secs
            .filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// Result of a successful composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionOutcome {
    pub output_path: PathBuf,

    /// Output length: measured when available, otherwise probed.
    pub duration_secs: f64,

    /// Duration the probe reported for the output, if probing succeeded.
    pub probed_duration_secs: Option<f64>,
}

impl Exporter {
    /// Overlay the camera capture onto the screen capture.
    ///
    /// `captures[0]` is the screen, `captures[1]` the camera. Intermediate
    /// captures are deleted on success and kept on failure.
    pub async fn compose_picture_in_picture(
        &self,
        captures: &[CaptureArtifact],
        destination: &Path,
        events: &mut EventSink,
    ) -> ClipforgeResult<CompositionOutcome> {
        tracing::info!(
            captures = captures.len(),
            output = %destination.display(),
            "Starting picture-in-picture composition"
        );

        match self.run_composition(captures, destination, events).await {
            Ok(outcome) => {
                self.remove_intermediates(captures, destination).await;
                tracing::info!(
                    output = %outcome.output_path.display(),
                    duration_secs = outcome.duration_secs,
                    "Composition complete"
                );
                events.completed(&outcome.output_path);
                Ok(outcome)
            }
            Err(err) => {
                let kept: Vec<String> = captures
                    .iter()
                    .map(|c| c.path.display().to_string())
                    .collect();
                tracing::warn!(
                    error = %err,
                    ?kept,
                    "Composition failed, keeping intermediate captures"
                );
                events.failed(err.to_string());
                Err(err)
            }
        }
    }

    async fn run_composition(
        &self,
        captures: &[CaptureArtifact],
        destination: &Path,
        events: &mut EventSink,
    ) -> ClipforgeResult<CompositionOutcome> {
        validate_destination(destination)?;

        let document = self.capture_project(captures).await;
        let timeline = normalize(&document);
        let plan = plan_segments(&timeline.items, &timeline.clips).require_segments()?;
        let graph = compile(
            &plan.segments,
            CompileMode::Overlay(self.config.overlay_layout()),
        )?;

        let expected_duration_secs = plan.segments[0].duration_secs();
        ensure_destination_writable(destination).await?;

        let job = TranscodeJob {
            inputs: plan.inputs,
            graph,
            encoding_args: self.config.overlay_encoding_args(),
            destination: destination.to_path_buf(),
            expected_duration_secs,
        };
        self.transcoder.run(&job, events).await?;

        let probed_duration_secs = match self.probe.probe(destination).await {
            Ok(info) => Some(info.duration),
            Err(err) => {
                tracing::warn!(error = %err, "Could not verify composed output");
                None
            }
        };

        let measured = self.measured_duration(&captures[0]);
        if let (Some(measured), Some(probed)) = (measured, probed_duration_secs) {
            if (measured - probed).abs() > DURATION_DRIFT_WARN_SECS {
                tracing::warn!(
                    measured_secs = measured,
                    probed_secs = probed,
                    "Composed output duration differs from measured capture duration"
                );
            }
        }

        Ok(CompositionOutcome {
            output_path: destination.to_path_buf(),
            duration_secs: measured
                .or(probed_duration_secs)
                .unwrap_or(expected_duration_secs),
            probed_duration_secs,
        })
    }

    /// Two-lane project: the screen on a video track, the camera on an overlay track.
    async fn capture_project(&self, captures: &[CaptureArtifact]) -> ProjectDocument {
        let mut project = RuntimeProject::new("picture-in-picture");

        for (index, capture) in captures.iter().enumerate() {
            let probed = match self.probe.probe(&capture.path).await {
                Ok(info) => Some(info),
                Err(err) => {
                    tracing::warn!(
                        path = %capture.path.display(),
                        error = %err,
                        "Could not probe capture"
                    );
                    None
                }
            };
            let duration = self
                .measured_duration(capture)
                .or(probed.map(|info| info.duration))
                .unwrap_or(0.0);
            let (width, height) = probed.map_or((0, 0), |info| (info.width, info.height));

            let clip = Clip {
                id: format!("capture-{index}"),
                name: capture
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: capture.path.clone(),
                duration,
                width,
                height,
            };

            let track = if index == 0 {
                Track::new("screen", TrackKind::Video, 0)
            } else {
                Track::new(format!("camera-{index}"), TrackKind::Overlay, index as u32)
            };

            // Ids sort lexically, so the screen stays first among equal positions.
            project.add_item(
                TrackItem::new(format!("pip-{index:03}"), &clip.id, 0.0).on_track(&track.id),
            );
            project.add_clip(clip);
            project.add_track(track);
        }

        ProjectDocument::Runtime(project)
    }

    /// Recorder-measured length, never longer than the capture ceiling.
    fn measured_duration(&self, capture: &CaptureArtifact) -> Option<f64> {
        let ceiling = self.config.recording.ceiling().as_secs_f64();
        capture.measured().map(|secs| secs.min(ceiling))
    }

    async fn remove_intermediates(&self, captures: &[CaptureArtifact], destination: &Path) {
        for capture in captures {
            if capture.path == destination {
                continue;
            }
            match tokio::fs::remove_file(&capture.path).await {
                Ok(()) => {
                    tracing::debug!(path = %capture.path.display(), "Removed intermediate capture")
                }
                Err(err) => tracing::warn!(
                    path = %capture.path.display(),
                    error = %err,
                    "Failed to remove intermediate capture"
                ),
            }
        }
    }
}
