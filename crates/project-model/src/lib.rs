//! Clipforge Project Model
//!
//! Defines the data contracts the export engine reads:
//! - **Project:** clips, tracks, and track items in either the persisted
//!   (nested) or runtime (flat) shape, with total conversions between them
//! - **Timeline:** the canonical, deterministic ordering of placed items
//!
//! All times are seconds as `f64`. Positions are offsets on the output
//! timeline; in/out points are relative to the clip's own start.

pub mod project;
pub mod timeline;

pub use project::*;
pub use timeline::*;
