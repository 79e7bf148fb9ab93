//! Timeline export orchestration.
//!
//! Runs the full pipeline for one `(project, destination)` request:
//! normalize, backfill unknown clip durations, plan, compile, execute.
//! Every request ends with exactly one terminal event.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use clipforge_common::error::{ClipforgeError, ClipforgeResult};
use clipforge_project_model::{normalize, Clip, NormalizedTimeline, ProjectDocument, TrackItem};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::events::{EventSink, ExportEvent};
use crate::executor::{FfmpegTranscoder, TranscodeJob, Transcoder};
use crate::graph::{compile, CompileMode};
use crate::plan::{plan_segments, PlannedSegment, SegmentPlan};
use crate::probe::{FfprobeProbe, MediaProbe};

/// A compiled export, ready to hand to a transcoder.
#[derive(Debug)]
pub struct ExportPlan {
    pub job: TranscodeJob,

    /// Segments in output order.
    pub segments: Vec<PlannedSegment>,

    /// Items skipped during planning.
    pub warnings: Vec<ClipforgeError>,
}

impl fmt::Display for ExportPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Inputs:")?;
        for (index, input) in self.job.inputs.iter().enumerate() {
            writeln!(f, "  [{index}] {}", input.display())?;
        }

        writeln!(f, "Segments:")?;
        for seg in &self.segments {
            writeln!(
                f,
                "  #{} {} (clip {}, input {}) {:.3}s..{:.3}s at {:.3}s",
                seg.stream_index,
                seg.item_id,
                seg.clip_id,
                seg.input_index,
                seg.in_sec,
                seg.out_sec,
                seg.offset_sec
            )?;
        }

        if !self.warnings.is_empty() {
            writeln!(f, "Skipped:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {warning}")?;
            }
        }

        writeln!(f, "Expected duration: {:.3}s", self.job.expected_duration_secs)?;
        write!(f, "Filter graph: {}", self.job.graph.to_filter_complex())
    }
}

/// Entry point for timeline exports and capture composition.
///
/// Cheap to clone; clones share configuration and backends.
#[derive(Clone)]
pub struct Exporter {
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) probe: Arc<dyn MediaProbe>,
    pub(crate) transcoder: Arc<dyn Transcoder>,
}

impl Exporter {
    /// Exporter backed by the configured `ffmpeg` and `ffprobe` binaries.
    pub fn new(config: EngineConfig) -> Self {
        let probe = FfprobeProbe::new(config.ffprobe.clone(), config.assumed_bitrate_bps);
        let transcoder = FfmpegTranscoder::new(config.ffmpeg.clone());
        Self::with_backends(Arc::new(config), Arc::new(probe), Arc::new(transcoder))
    }

    pub fn with_backends(
        config: Arc<EngineConfig>,
        probe: Arc<dyn MediaProbe>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            config,
            probe,
            transcoder,
        }
    }

    /// Plan and compile an export without launching anything.
    pub async fn prepare(
        &self,
        document: &ProjectDocument,
        destination: &Path,
    ) -> ClipforgeResult<ExportPlan> {
        validate_destination(destination)?;

        let NormalizedTimeline {
            mut clips, items, ..
        } = normalize(document)
            .ensure_not_empty()
            .map_err(|_| ClipforgeError::EmptyTimeline)?;

        self.backfill_durations(&items, &mut clips).await;

        let SegmentPlan {
            inputs,
            segments,
            warnings,
        } = plan_segments(&items, &clips).require_segments()?;

        let graph = compile(&segments, CompileMode::Concat)?;
        let expected_duration_secs = segments.iter().map(PlannedSegment::duration_secs).sum();

        Ok(ExportPlan {
            job: TranscodeJob {
                inputs,
                graph,
                encoding_args: self.config.concat_encoding_args(),
                destination: destination.to_path_buf(),
                expected_duration_secs,
            },
            segments,
            warnings,
        })
    }

    /// Export a project, emitting lifecycle events to `events`.
    ///
    /// Returns the output path; the same outcome is delivered as the
    /// terminal event.
    pub async fn export(
        &self,
        document: &ProjectDocument,
        destination: &Path,
        events: &mut EventSink,
    ) -> ClipforgeResult<PathBuf> {
        tracing::info!(
            project = %document.meta().name,
            output = %destination.display(),
            "Starting export"
        );

        let result = self.run_export(document, destination, events).await;
        match &result {
            Ok(path) => {
                tracing::info!(output = %path.display(), "Export complete");
                events.completed(path);
            }
            Err(err) => {
                tracing::error!(error = %err, "Export failed");
                events.failed(err.to_string());
            }
        }
        result
    }

    /// Run an export on the runtime and return its event stream.
    pub fn spawn_export(
        &self,
        document: ProjectDocument,
        destination: PathBuf,
    ) -> (
        JoinHandle<ClipforgeResult<PathBuf>>,
        UnboundedReceiver<ExportEvent>,
    ) {
        let (mut sink, rx) = EventSink::channel();
        let exporter = self.clone();
        let handle =
            tokio::spawn(async move { exporter.export(&document, &destination, &mut sink).await });
        (handle, rx)
    }

    async fn run_export(
        &self,
        document: &ProjectDocument,
        destination: &Path,
        events: &mut EventSink,
    ) -> ClipforgeResult<PathBuf> {
        let plan = self.prepare(document, destination).await?;
        if !plan.warnings.is_empty() {
            tracing::warn!(
                skipped = plan.warnings.len(),
                segments = plan.segments.len(),
                "Exporting with skipped items"
            );
        }

        ensure_destination_writable(destination).await?;
        tracing::info!(backend = self.transcoder.name(), "Using transcoder");
        self.transcoder.run(&plan.job, events).await?;
        Ok(destination.to_path_buf())
    }

    /// Probe clips whose duration is unknown and that an item plays to the end.
    async fn backfill_durations(&self, items: &[TrackItem], clips: &mut BTreeMap<String, Clip>) {
        let wanted: BTreeSet<&str> = items
            .iter()
            .filter(|item| item.out_sec.is_none())
            .filter(|item| {
                clips
                    .get(&item.clip_id)
                    .is_some_and(|clip| !clip.has_duration())
            })
            .map(|item| item.clip_id.as_str())
            .collect();

        for clip_id in wanted {
            let Some(clip) = clips.get_mut(clip_id) else {
                continue;
            };
            match self.probe.probe(&clip.path).await {
                Ok(info) => {
                    tracing::debug!(
                        clip = %clip.id,
                        duration_secs = info.duration,
                        "Backfilled clip duration"
                    );
                    clip.duration = info.duration;
                    if clip.width == 0 || clip.height == 0 {
                        clip.width = info.width;
                        clip.height = info.height;
                    }
                }
                Err(err) => {
                    tracing::warn!(clip = %clip.id, error = %err, "Could not probe clip duration");
                }
            }
        }
    }
}

/// Reject destinations that cannot name an output file.
pub fn validate_destination(destination: &Path) -> ClipforgeResult<()> {
    if destination.as_os_str().is_empty() {
        return Err(ClipforgeError::invalid_destination(destination, "path is empty"));
    }
    if destination
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ClipforgeError::invalid_destination(
            destination,
            "parent directory traversal is not allowed",
        ));
    }
    if destination.file_name().is_none() {
        return Err(ClipforgeError::invalid_destination(destination, "no file name"));
    }
    Ok(())
}

/// Create the destination directory if needed and confirm it accepts writes.
pub(crate) async fn ensure_destination_writable(destination: &Path) -> ClipforgeResult<()> {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    tokio::fs::create_dir_all(&parent).await.map_err(|e| {
        ClipforgeError::invalid_destination(destination, format!("cannot create directory: {e}"))
    })?;

    if tokio::fs::metadata(destination)
        .await
        .is_ok_and(|m| m.is_dir())
    {
        return Err(ClipforgeError::invalid_destination(
            destination,
            "is a directory",
        ));
    }

    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let marker = parent.join(format!(".{file_name}.clipforge-write-check"));
    tokio::fs::write(&marker, b"").await.map_err(|e| {
        ClipforgeError::invalid_destination(destination, format!("directory is not writable: {e}"))
    })?;
    let _ = tokio::fs::remove_file(&marker).await;
    Ok(())
}
