//! Engine configuration.
//!
//! Built once from [`AppConfig`] and shared read-only across concurrent
//! operations.

use std::path::{Path, PathBuf};

use clipforge_common::clock::RecordingClock;
use clipforge_common::config::{AppConfig, CompositeDefaults, ExportDefaults, RecordingDefaults};
use serde::Serialize;

use crate::graph::OverlayLayout;

/// Immutable settings for the export pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Transcoder program, resolved to an absolute path when found on `PATH`.
    pub ffmpeg: PathBuf,

    /// Probe program, resolved the same way.
    pub ffprobe: PathBuf,

    pub export: ExportDefaults,
    pub composite: CompositeDefaults,

    /// Capture ceiling; measured capture lengths never exceed it.
    pub recording: RecordingDefaults,

    /// Bitrate used for size-based duration estimates.
    pub assumed_bitrate_bps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl EngineConfig {
    /// Resolve binaries and copy encoding defaults.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            ffmpeg: resolve_binary(&config.binaries.ffmpeg),
            ffprobe: resolve_binary(&config.binaries.ffprobe),
            export: config.export.clone(),
            composite: config.composite.clone(),
            recording: config.recording.clone(),
            assumed_bitrate_bps: config.probe.assumed_bitrate_bps,
        }
    }

    /// Encoder arguments for sequential timeline export.
    pub fn concat_encoding_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.export.video_codec.clone(),
            "-preset".to_string(),
            self.export.preset.clone(),
            "-crf".to_string(),
            self.export.crf.to_string(),
            "-c:a".to_string(),
            self.export.audio_codec.clone(),
            "-b:a".to_string(),
            format!("{}k", self.export.audio_bitrate_kbps),
        ]
    }

    /// Encoder arguments for picture-in-picture composition (video only).
    pub fn overlay_encoding_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.composite.video_codec.clone(),
            "-b:v".to_string(),
            self.composite.video_bitrate.clone(),
            "-an".to_string(),
        ]
    }

    pub fn overlay_layout(&self) -> OverlayLayout {
        OverlayLayout {
            width: self.composite.overlay_width,
            height: self.composite.overlay_height,
            margin: self.composite.margin,
        }
    }

    /// Clock for a new capture session, anchored to now.
    pub fn recording_clock(&self) -> RecordingClock {
        RecordingClock::from_config(&self.recording)
    }

    /// Availability of the configured external tools.
    pub fn tool_status(&self) -> Vec<ToolStatus> {
        [("ffmpeg", &self.ffmpeg), ("ffprobe", &self.ffprobe)]
            .into_iter()
            .map(|(name, path)| ToolStatus {
                name,
                path: path.clone(),
                available: which::which(path).is_ok(),
            })
            .collect()
    }
}

/// Whether one external tool can be launched.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub name: &'static str,
    pub path: PathBuf,
    pub available: bool,
}

/// Look a bare program name up on `PATH`; explicit paths are kept as given.
fn resolve_binary(program: &Path) -> PathBuf {
    if program.components().count() != 1 {
        return program.to_path_buf();
    }

    match which::which(program) {
        Ok(resolved) => {
            tracing::debug!(
                program = %program.display(),
                resolved = %resolved.display(),
                "Resolved binary on PATH"
            );
            resolved
        }
        Err(_) => {
            tracing::debug!(program = %program.display(), "Binary not found on PATH");
            program.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_encoding_args() {
        let config = EngineConfig::default();
        assert_eq!(
            config.concat_encoding_args(),
            vec!["-c:v", "libx264", "-preset", "fast", "-crf", "23", "-c:a", "aac", "-b:a", "192k"]
        );
    }

    #[test]
    fn test_overlay_encoding_args_drop_audio() {
        let config = EngineConfig::default();
        let args = config.overlay_encoding_args();
        assert_eq!(args, vec!["-c:v", "libvpx-vp9", "-b:v", "2M", "-an"]);
    }

    #[test]
    fn test_overlay_layout_from_defaults() {
        assert_eq!(EngineConfig::default().overlay_layout(), OverlayLayout::default());
    }

    #[test]
    fn test_explicit_binary_path_is_kept() {
        let path = Path::new("/opt/media/bin/ffmpeg");
        assert_eq!(resolve_binary(path), path);
    }

    #[test]
    fn test_tool_status_reports_missing_binary() {
        let mut config = EngineConfig::default();
        config.ffmpeg = PathBuf::from("/nonexistent/ffmpeg");
        let status = config.tool_status();
        assert_eq!(status[0].name, "ffmpeg");
        assert!(!status[0].available);
    }

    #[test]
    fn test_unknown_bare_name_is_kept() {
        let program = Path::new("clipforge-no-such-tool");
        assert_eq!(resolve_binary(program), program);
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_status_reports_executable_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("ffprobe");
        std::fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = EngineConfig::default();
        config.ffprobe = tool.clone();
        let status = config.tool_status();
        assert_eq!(status[1].path, tool);
        assert!(status[1].available);
    }
}
