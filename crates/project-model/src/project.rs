//! Project document types.
//!
//! A project arrives in one of two equivalent shapes:
//! - **persisted**: a list of tracks, each carrying its own items;
//! - **runtime**: a flat map of track items plus a separate map of tracks.
//!
//! [`ProjectDocument`] is the union of both, with total conversions
//! in each direction. Items without a `trackId` are assigned to a
//! synthesized primary track.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Track id assigned to items that arrive without one.
pub const PRIMARY_TRACK_ID: &str = "track-primary";

/// A reference to one source media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    /// Unique clip identifier.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Absolute path to the media file.
    pub path: PathBuf,

    /// Probed duration in seconds (0 when unknown).
    #[serde(default)]
    pub duration: f64,

    /// Frame width in pixels.
    #[serde(default)]
    pub width: u32,

    /// Frame height in pixels.
    #[serde(default)]
    pub height: u32,
}

impl Clip {
    /// Create a clip with a generated id.
    pub fn new(path: impl Into<PathBuf>, duration: f64, width: u32, height: u32) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            path,
            duration,
            width,
            height,
        }
    }

    /// Whether the clip carries a usable probed duration.
    pub fn has_duration(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }
}

/// One placement of a clip on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackItem {
    /// Unique item identifier.
    pub id: String,

    /// Clip this item plays.
    pub clip_id: String,

    /// In-point within the clip (seconds). Defaults to 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_sec: Option<f64>,

    /// Out-point within the clip (seconds). Defaults to the clip duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_sec: Option<f64>,

    /// Offset on the output timeline (seconds). Defaults to 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_position: Option<f64>,

    /// Owning track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
}

impl TrackItem {
    /// Create an untrimmed item at the given timeline position.
    pub fn new(id: impl Into<String>, clip_id: impl Into<String>, position: f64) -> Self {
        Self {
            id: id.into(),
            clip_id: clip_id.into(),
            in_sec: None,
            out_sec: None,
            track_position: Some(position),
            track_id: None,
        }
    }

    /// Set trim bounds.
    pub fn trimmed(mut self, in_sec: f64, out_sec: f64) -> Self {
        self.in_sec = Some(in_sec);
        self.out_sec = Some(out_sec);
        self
    }

    /// Assign the owning track.
    pub fn on_track(mut self, track_id: impl Into<String>) -> Self {
        self.track_id = Some(track_id.into());
        self
    }

    /// Timeline position with the default applied.
    pub fn position(&self) -> f64 {
        self.track_position.unwrap_or(0.0)
    }
}

/// Kind of lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    #[default]
    Video,
    Audio,
    Overlay,
}

/// An ordered lane of track items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Unique track identifier.
    pub id: String,

    /// Lane kind.
    #[serde(default)]
    pub kind: TrackKind,

    /// Display order (lower first).
    #[serde(default)]
    pub order: u32,

    /// Whether the lane is shown in the editor.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Track {
    pub fn new(id: impl Into<String>, kind: TrackKind, order: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            order,
            visible: true,
        }
    }

    /// The lane synthesized for items that arrive without a track.
    pub fn primary() -> Self {
        Self::new(PRIMARY_TRACK_ID, TrackKind::Video, 0)
    }
}

/// Track with its nested items (persisted shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTrack {
    #[serde(flatten)]
    pub track: Track,

    #[serde(default)]
    pub items: Vec<TrackItem>,
}

/// Identity and bookkeeping fields common to both shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    /// Unique project identifier (UUID).
    pub id: String,

    /// Human-readable project name.
    #[serde(default)]
    pub name: String,

    /// Schema version.
    #[serde(default = "default_schema_version")]
    pub version: String,

    /// Creation timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Last update timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl ProjectMeta {
    /// Fresh metadata with a generated id and current timestamps.
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            version: default_schema_version(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        }
    }
}

/// Persisted shape: tracks own their items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProject {
    #[serde(flatten)]
    pub meta: ProjectMeta,

    #[serde(default)]
    pub clips: BTreeMap<String, Clip>,

    pub tracks: Vec<PersistedTrack>,
}

/// Runtime shape: flat item map plus a separate track map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeProject {
    #[serde(flatten)]
    pub meta: ProjectMeta,

    #[serde(default)]
    pub clips: BTreeMap<String, Clip>,

    #[serde(default)]
    pub tracks: BTreeMap<String, Track>,

    #[serde(default)]
    pub track_items: BTreeMap<String, TrackItem>,
}

impl RuntimeProject {
    /// Empty runtime project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ProjectMeta::new(name),
            clips: BTreeMap::new(),
            tracks: BTreeMap::new(),
            track_items: BTreeMap::new(),
        }
    }

    /// Register a clip, replacing any clip with the same id.
    pub fn add_clip(&mut self, clip: Clip) {
        self.clips.insert(clip.id.clone(), clip);
    }

    /// Register a track.
    pub fn add_track(&mut self, track: Track) {
        self.tracks.insert(track.id.clone(), track);
    }

    /// Place an item on the timeline.
    pub fn add_item(&mut self, item: TrackItem) {
        self.track_items.insert(item.id.clone(), item);
    }
}

/// A project in either shape.
///
/// Deserialization recognises the runtime shape by its `trackItems` map and
/// the persisted shape by a `tracks` list. A document with neither is a new,
/// empty runtime project.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProjectDocument {
    Runtime(RuntimeProject),
    Persisted(PersistedProject),
}

impl<'de> Deserialize<'de> for ProjectDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl ProjectDocument {
    /// Parse a project document from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Pick the shape by its distinguishing key, then decode that shape only
    /// so field errors are reported as-is.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let persisted = value.get("trackItems").is_none()
            && value.get("tracks").is_some_and(Value::is_array);
        if persisted {
            serde_json::from_value(value).map(Self::Persisted)
        } else {
            serde_json::from_value(value).map(Self::Runtime)
        }
    }

    /// Read and parse a project document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ProjectError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content).map_err(|e| ProjectError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn meta(&self) -> &ProjectMeta {
        match self {
            Self::Runtime(p) => &p.meta,
            Self::Persisted(p) => &p.meta,
        }
    }

    pub fn clips(&self) -> &BTreeMap<String, Clip> {
        match self {
            Self::Runtime(p) => &p.clips,
            Self::Persisted(p) => &p.clips,
        }
    }

    /// Convert to the runtime shape.
    ///
    /// Every item ends up in exactly one track: missing `trackId`s point at
    /// the primary track, and tracks referenced but not declared are
    /// synthesized as video lanes. In the persisted shape, membership in a
    /// track's item list wins over any `trackId` the item carries; when the
    /// same item id appears twice, the first occurrence is kept.
    pub fn to_runtime(&self) -> RuntimeProject {
        match self {
            Self::Runtime(p) => {
                let mut runtime = p.clone();
                for item in runtime.track_items.values_mut() {
                    if item.track_id.is_none() {
                        item.track_id = Some(PRIMARY_TRACK_ID.to_string());
                    }
                }
                ensure_referenced_tracks(&mut runtime);
                runtime
            }
            Self::Persisted(p) => {
                let mut runtime = RuntimeProject {
                    meta: p.meta.clone(),
                    clips: p.clips.clone(),
                    tracks: BTreeMap::new(),
                    track_items: BTreeMap::new(),
                };
                for persisted in &p.tracks {
                    runtime
                        .tracks
                        .entry(persisted.track.id.clone())
                        .or_insert_with(|| persisted.track.clone());
                    for item in &persisted.items {
                        let mut item = item.clone();
                        item.track_id = Some(persisted.track.id.clone());
                        runtime.track_items.entry(item.id.clone()).or_insert(item);
                    }
                }
                runtime
            }
        }
    }

    /// Convert to the persisted shape.
    ///
    /// Tracks are listed by `(order, id)`; items within a track by
    /// `(trackPosition, id)`.
    pub fn to_persisted(&self) -> PersistedProject {
        let runtime = self.to_runtime();

        let mut tracks: Vec<PersistedTrack> = runtime
            .tracks
            .values()
            .map(|track| PersistedTrack {
                track: track.clone(),
                items: runtime
                    .track_items
                    .values()
                    .filter(|item| item.track_id.as_deref() == Some(track.id.as_str()))
                    .cloned()
                    .collect(),
            })
            .collect();

        tracks.sort_by(|a, b| {
            a.track
                .order
                .cmp(&b.track.order)
                .then_with(|| a.track.id.cmp(&b.track.id))
        });
        for track in &mut tracks {
            track.items.sort_by(|a, b| {
                a.position()
                    .total_cmp(&b.position())
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        PersistedProject {
            meta: runtime.meta,
            clips: runtime.clips,
            tracks,
        }
    }
}

fn ensure_referenced_tracks(runtime: &mut RuntimeProject) {
    let mut next_order = runtime
        .tracks
        .values()
        .map(|t| t.order + 1)
        .max()
        .unwrap_or(0);

    let referenced: Vec<String> = runtime
        .track_items
        .values()
        .filter_map(|item| item.track_id.clone())
        .collect();

    for track_id in referenced {
        if runtime.tracks.contains_key(&track_id) {
            continue;
        }
        let track = if track_id == PRIMARY_TRACK_ID {
            Track::primary()
        } else {
            let track = Track::new(track_id.clone(), TrackKind::Video, next_order);
            next_order += 1;
            track
        };
        runtime.tracks.insert(track_id, track);
    }
}

impl From<RuntimeProject> for ProjectDocument {
    fn from(project: RuntimeProject) -> Self {
        Self::Runtime(project)
    }
}

impl From<PersistedProject> for ProjectDocument {
    fn from(project: PersistedProject) -> Self {
        Self::Persisted(project)
    }
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Timeline contains no items")]
    EmptyTimeline,
}
