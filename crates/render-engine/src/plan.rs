//! Segment planning.
//!
//! Resolves each placed item against the clip set into a [`PlannedSegment`]:
//! source input, trim bounds, output offset, and stream labels. Bad items are
//! dropped with a warning; planning itself never fails.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use clipforge_common::error::{ClipforgeError, ClipforgeResult};
use clipforge_project_model::{Clip, TrackItem};
use serde::Serialize;

/// Slack allowed when comparing an out-point against the clip duration.
const TRIM_EPSILON_SECS: f64 = 1e-3;

/// Labels of the streams a segment contributes to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentLabels {
    pub video: String,
    pub audio: String,
}

impl SegmentLabels {
    pub fn for_stream(stream_index: usize) -> Self {
        Self {
            video: format!("v{stream_index}"),
            audio: format!("a{stream_index}"),
        }
    }
}

/// Resolved form of one track item, ready for graph generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedSegment {
    /// Item this segment was planned from.
    pub item_id: String,

    /// Clip the item plays.
    pub clip_id: String,

    /// Absolute source path.
    pub source: PathBuf,

    /// Transcoder input index (one per distinct clip).
    pub input_index: usize,

    /// Position in output order (one per segment).
    pub stream_index: usize,

    /// Trim start within the source.
    pub in_sec: f64,

    /// Trim end within the source.
    pub out_sec: f64,

    /// Where the segment starts on the output timeline.
    pub offset_sec: f64,

    pub labels: SegmentLabels,
}

impl PlannedSegment {
    pub fn duration_secs(&self) -> f64 {
        self.out_sec - self.in_sec
    }
}

/// Result of planning a canonical item sequence.
#[derive(Debug, Default)]
pub struct SegmentPlan {
    /// Source paths ordered by input index.
    pub inputs: Vec<PathBuf>,

    /// Segments in output order.
    pub segments: Vec<PlannedSegment>,

    /// Item-scoped problems that caused an item to be skipped.
    pub warnings: Vec<ClipforgeError>,
}

impl SegmentPlan {
    /// Total output length when segments are joined back to back.
    pub fn expected_duration_secs(&self) -> f64 {
        self.segments.iter().map(PlannedSegment::duration_secs).sum()
    }

    /// Fail with [`ClipforgeError::NoValidSegments`] when every item was dropped.
    pub fn require_segments(self) -> ClipforgeResult<Self> {
        if self.segments.is_empty() {
            return Err(ClipforgeError::NoValidSegments);
        }
        Ok(self)
    }
}

/// Plan segments for items already in canonical order.
pub fn plan_segments(items: &[TrackItem], clips: &BTreeMap<String, Clip>) -> SegmentPlan {
    let mut plan = SegmentPlan::default();
    let mut input_by_clip: HashMap<&str, usize> = HashMap::new();

    for item in items {
        let (clip, in_sec, out_sec, offset_sec) = match resolve_item(item, clips) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(item = %item.id, error = %err, "Skipping track item");
                plan.warnings.push(err);
                continue;
            }
        };

        let input_index = *input_by_clip.entry(clip.id.as_str()).or_insert_with(|| {
            plan.inputs.push(clip.path.clone());
            plan.inputs.len() - 1
        });

        let stream_index = plan.segments.len();
        plan.segments.push(PlannedSegment {
            item_id: item.id.clone(),
            clip_id: clip.id.clone(),
            source: clip.path.clone(),
            input_index,
            stream_index,
            in_sec,
            out_sec,
            offset_sec,
            labels: SegmentLabels::for_stream(stream_index),
        });
    }

    tracing::debug!(
        segments = plan.segments.len(),
        inputs = plan.inputs.len(),
        skipped = plan.warnings.len(),
        "Segment plan built"
    );

    plan
}

fn resolve_item<'a>(
    item: &TrackItem,
    clips: &'a BTreeMap<String, Clip>,
) -> ClipforgeResult<(&'a Clip, f64, f64, f64)> {
    let clip = clips
        .get(&item.clip_id)
        .ok_or_else(|| ClipforgeError::MissingClip {
            item_id: item.id.clone(),
            clip_id: item.clip_id.clone(),
        })?;

    let in_sec = item.in_sec.unwrap_or(0.0);
    let out_sec = item.out_sec.unwrap_or(clip.duration);
    let offset_sec = item.position();

    let exceeds_clip = clip.has_duration() && out_sec > clip.duration + TRIM_EPSILON_SECS;
    let bounds_valid =
        in_sec.is_finite() && out_sec.is_finite() && in_sec >= 0.0 && out_sec > in_sec;
    if !bounds_valid || exceeds_clip {
        return Err(ClipforgeError::InvalidTrim {
            item_id: item.id.clone(),
            in_sec,
            out_sec,
        });
    }

    if !offset_sec.is_finite() || offset_sec < 0.0 {
        return Err(ClipforgeError::InvalidPlacement {
            item_id: item.id.clone(),
            position: offset_sec,
        });
    }

    Ok((clip, in_sec, out_sec, offset_sec))
}
