//! Recording clock and capture ceiling.
//!
//! Capture itself happens in the platform recorder; this module tracks how
//! long a capture has been running so that:
//! - sessions are force-stopped once the ceiling is reached
//! - the measured wall-clock duration can stand in for a probed one, which
//!   is unreliable for files written by a live recorder

use std::time::{Duration, Instant};

use crate::config::RecordingDefaults;

/// Default capture ceiling (30 minutes).
pub const DEFAULT_RECORDING_CEILING: Duration = Duration::from_secs(30 * 60);

/// A recording clock anchored to the moment capture started.
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,

    /// Maximum allowed capture length.
    ceiling: Duration,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now with the configured ceiling.
    pub fn from_config(config: &RecordingDefaults) -> Self {
        Self::with_ceiling(config.ceiling())
    }

    /// Create a new recording clock anchored to now.
    pub fn with_ceiling(ceiling: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
            ceiling,
        }
    }

    /// Create a clock from a known epoch.
    pub fn from_epoch(epoch: Instant, wall: String, ceiling: Duration) -> Self {
        Self {
            epoch,
            epoch_wall: wall,
            ceiling,
        }
    }

    /// Seconds elapsed since recording start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Configured ceiling.
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Time left before the ceiling forces a stop.
    pub fn remaining(&self) -> Duration {
        self.ceiling.saturating_sub(self.epoch.elapsed())
    }

    /// Whether the capture has run for at least the ceiling.
    pub fn ceiling_reached(&self) -> bool {
        self.epoch.elapsed() >= self.ceiling
    }

    /// Resolve once the ceiling is reached.
    ///
    /// Callers race this against their own stop signal and run the normal
    /// stop sequence when it wins.
    pub async fn wait_for_ceiling(&self) {
        let deadline = tokio::time::Instant::from_std(self.epoch + self.ceiling);
        tokio::time::sleep_until(deadline).await;
        tracing::warn!(
            ceiling_secs = self.ceiling.as_secs(),
            "Recording ceiling reached, forcing stop"
        );
    }

    /// Measured capture duration, capped at the ceiling.
    pub fn measured_duration_secs(&self) -> f64 {
        self.elapsed_secs().min(self.ceiling.as_secs_f64())
    }
}
