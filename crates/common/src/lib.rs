//! Clipforge Common Utilities
//!
//! Shared infrastructure for all Clipforge crates:
//! - Error taxonomy and result aliases
//! - Recording clock with the capture duration ceiling
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
