//! Timeline normalization.
//!
//! Reduces either project shape to one canonical, deterministic sequence of
//! placed items: ascending by `trackPosition`, ties broken by item id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::project::{
    Clip, PersistedProject, ProjectDocument, ProjectError, ProjectMeta, RuntimeProject, Track,
    TrackItem,
};

/// Canonical view of a project's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTimeline {
    pub meta: ProjectMeta,

    /// Clip set, keyed by id.
    pub clips: BTreeMap<String, Clip>,

    /// Lanes, keyed by id.
    pub tracks: BTreeMap<String, Track>,

    /// Placed items in output order. Every item carries its track id.
    pub items: Vec<TrackItem>,
}

/// Normalize a project document.
///
/// An empty timeline is a valid result here (a new project must still
/// open); exports call [`NormalizedTimeline::ensure_not_empty`].
pub fn normalize(document: &ProjectDocument) -> NormalizedTimeline {
    let RuntimeProject {
        meta,
        clips,
        tracks,
        track_items,
    } = document.to_runtime();

    let mut items: Vec<TrackItem> = track_items.into_values().collect();
    sort_canonical(&mut items);

    NormalizedTimeline {
        meta,
        clips,
        tracks,
        items,
    }
}

/// Sort items into output order.
pub fn sort_canonical(items: &mut [TrackItem]) {
    items.sort_by(|a, b| {
        a.position()
            .total_cmp(&b.position())
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl NormalizedTimeline {
    /// Fail with [`ProjectError::EmptyTimeline`] when there is nothing to encode.
    pub fn ensure_not_empty(self) -> Result<Self, ProjectError> {
        if self.is_empty() {
            return Err(ProjectError::EmptyTimeline);
        }
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rebuild the persisted (nested) shape from the canonical view.
    pub fn denormalize(&self) -> PersistedProject {
        let runtime = RuntimeProject {
            meta: self.meta.clone(),
            clips: self.clips.clone(),
            tracks: self.tracks.clone(),
            track_items: self
                .items
                .iter()
                .map(|item| (item.id.clone(), item.clone()))
                .collect(),
        };
        ProjectDocument::Runtime(runtime).to_persisted()
    }
}
