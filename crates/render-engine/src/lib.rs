//! Clipforge Render Engine
//!
//! Compiles an editing timeline into a single transcoder invocation and
//! supervises it, reporting progress as typed events.
//!
//! # Pipeline Architecture
//!
//! ```text
//! project.json ──┐
//!                ├── Normalize (canonical item order)
//!                │         │
//!  ffprobe ──────┼── Backfill unknown durations
//!                │         │
//!                │   Plan segments (trim, offset, input index, labels)
//!                │         │
//!                │   Compile filter graph (concat | overlay)
//!                │         │
//!                └── ffmpeg -filter_complex ... ──► progress events
//!                                │
//!                                ▼
//!                           output file
//! ```
//!
//! Picture-in-picture composition reuses the same planner and compiler on a
//! two-lane project built from the finalized screen and camera captures.

pub mod composite;
pub mod config;
pub mod events;
pub mod executor;
pub mod export;
pub mod graph;
pub mod plan;
pub mod probe;

#[cfg(test)]
mod testing;

pub use composite::{CaptureArtifact, CompositionOutcome};
pub use config::{EngineConfig, ToolStatus};
pub use events::{EventSink, ExportEvent};
pub use executor::{FfmpegTranscoder, TranscodeJob, Transcoder};
pub use export::{validate_destination, ExportPlan, Exporter};
pub use graph::{compile, CompileMode, FilterGraph, OverlayLayout};
pub use plan::{plan_segments, PlannedSegment, SegmentPlan};
pub use probe::{FfprobeProbe, MediaInfo, MediaProbe};
