//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// External transcoder binaries.
    pub binaries: BinaryConfig,

    /// Timeline export (concat mode) encoding defaults.
    pub export: ExportDefaults,

    /// Picture-in-picture composition (overlay mode) defaults.
    pub composite: CompositeDefaults,

    /// Probe fallback settings.
    pub probe: ProbeDefaults,

    /// Recording session limits.
    pub recording: RecordingDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Paths of the external media tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryConfig {
    /// Transcoder program (resolved through `PATH` when bare).
    pub ffmpeg: PathBuf,

    /// Media inspector program.
    pub ffprobe: PathBuf,
}

/// Encoding parameters for sequential timeline export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Video encoder name.
    pub video_codec: String,

    /// Encoder speed preset.
    pub preset: String,

    /// Constant rate factor (lower = better quality).
    pub crf: u8,

    /// Audio encoder name.
    pub audio_codec: String,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,
}

/// Encoding and layout parameters for screen + camera composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeDefaults {
    /// Video encoder name.
    pub video_codec: String,

    /// Target video bitrate (encoder syntax, e.g. `2M`).
    pub video_bitrate: String,

    /// Camera overlay width in pixels.
    pub overlay_width: u32,

    /// Camera overlay height in pixels.
    pub overlay_height: u32,

    /// Distance from the bottom-right corner in pixels.
    pub margin: u32,
}

/// Probe fallback parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeDefaults {
    /// Bitrate assumed when estimating a duration from file size.
    pub assumed_bitrate_bps: u64,
}

/// Recording session limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Hard ceiling after which a capture is force-stopped.
    pub max_duration_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipforge=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            binaries: BinaryConfig::default(),
            export: ExportDefaults::default(),
            composite: CompositeDefaults::default(),
            probe: ProbeDefaults::default(),
            recording: RecordingDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "fast".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 192,
        }
    }
}

impl Default for CompositeDefaults {
    fn default() -> Self {
        Self {
            video_codec: "libvpx-vp9".to_string(),
            video_bitrate: "2M".to_string(),
            overlay_width: 320,
            overlay_height: 240,
            margin: 10,
        }
    }
}

impl Default for ProbeDefaults {
    fn default() -> Self {
        Self {
            assumed_bitrate_bps: 2_500_000,
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            max_duration_secs: crate::clock::DEFAULT_RECORDING_CEILING.as_secs(),
        }
    }
}

impl RecordingDefaults {
    /// Configured ceiling as a duration.
    pub fn ceiling(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.max_duration_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipforge").join("config.json")
}
