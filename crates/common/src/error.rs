//! Error types shared across Clipforge crates.

use std::path::PathBuf;

/// Top-level error type for Clipforge operations.
///
/// Variants fall into three groups:
/// - per-item planning problems (`MissingClip`, `InvalidTrim`, `InvalidPlacement`),
///   which are recorded as warnings and never abort an export;
/// - structural failures (`EmptyTimeline`, `GraphConstruction`,
///   `UnsupportedSegmentCount`, `NoValidSegments`, `InvalidDestination`),
///   raised before any external process is launched;
/// - process-level failures (`ProcessFailed`), raised after the transcoder ran.
#[derive(Debug, thiserror::Error)]
pub enum ClipforgeError {
    #[error("Timeline contains no items; nothing to encode")]
    EmptyTimeline,

    #[error("Track item {item_id} references missing clip {clip_id}")]
    MissingClip { item_id: String, clip_id: String },

    #[error("Track item {item_id} has invalid trim bounds [{in_sec}, {out_sec}]")]
    InvalidTrim {
        item_id: String,
        in_sec: f64,
        out_sec: f64,
    },

    #[error("Track item {item_id} has invalid timeline position {position}")]
    InvalidPlacement { item_id: String, position: f64 },

    #[error("Filter graph construction failed: {message}")]
    GraphConstruction { message: String },

    #[error("Overlay composition expects {expected} segments, found {found}")]
    UnsupportedSegmentCount { expected: usize, found: usize },

    #[error("No valid segments remain after planning")]
    NoValidSegments,

    #[error("Probe failed for {path}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error("Transcoder exited with {status}: {diagnostics}")]
    ProcessFailed { status: String, diagnostics: String },

    #[error("Invalid destination {path}: {reason}")]
    InvalidDestination { path: PathBuf, reason: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using ClipforgeError.
pub type ClipforgeResult<T> = Result<T, ClipforgeError>;

impl ClipforgeError {
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::GraphConstruction {
            message: msg.into(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn invalid_destination(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidDestination {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
