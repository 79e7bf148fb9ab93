//! Media probing.
//!
//! Extracts duration and frame size from a media file via `ffprobe`. Files
//! written by a live capture recorder often lack a container duration; in
//! that case the duration is estimated from the file size and an assumed
//! bitrate. The estimate is approximate: callers that measured a capture's
//! wall-clock length should prefer their own value.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use clipforge_common::error::{ClipforgeError, ClipforgeResult};
use serde::{Deserialize, Serialize};

/// Where a probed duration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    /// Container-level duration field.
    Container,
    /// Duration of the first video stream.
    Stream,
    /// File size divided by the assumed bitrate.
    Estimated,
}

/// Probe result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub duration_source: DurationSource,
}

impl MediaInfo {
    pub fn is_estimated(&self) -> bool {
        self.duration_source == DurationSource::Estimated
    }
}

/// Source of media metadata.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Probe a media file.
    async fn probe(&self, path: &Path) -> ClipforgeResult<MediaInfo>;
}

/// Probe backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: PathBuf,
    assumed_bitrate_bps: u64,
}

impl FfprobeProbe {
    pub fn new(program: impl Into<PathBuf>, assumed_bitrate_bps: u64) -> Self {
        Self {
            program: program.into(),
            assumed_bitrate_bps: assumed_bitrate_bps.max(1),
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> ClipforgeResult<MediaInfo> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| ClipforgeError::FileNotFound {
                path: path.to_path_buf(),
            })?;

        let output = tokio::process::Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                ClipforgeError::probe(
                    path,
                    format!("failed to run {}: {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClipforgeError::probe(
                path,
                format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info = parse_probe_output(&stdout, metadata.len(), self.assumed_bitrate_bps, path)?;

        if info.is_estimated() {
            tracing::warn!(
                path = %path.display(),
                duration_secs = info.duration,
                "Container reports no duration, using size-based estimate"
            );
        } else {
            tracing::debug!(
                path = %path.display(),
                duration_secs = info.duration,
                width = info.width,
                height = info.height,
                "Probed media"
            );
        }

        Ok(info)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Interpret `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(
    json: &str,
    file_size_bytes: u64,
    assumed_bitrate_bps: u64,
    path: &Path,
) -> ClipforgeResult<MediaInfo> {
    let parsed: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ClipforgeError::probe(path, format!("unreadable ffprobe output: {e}")))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ClipforgeError::probe(path, "no video stream"))?;

    let container = parsed
        .format
        .as_ref()
        .and_then(|f| parse_duration(f.duration.as_deref()));
    let stream = parse_duration(video.duration.as_deref());

    let (duration, duration_source) = match (container, stream) {
        (Some(d), _) => (d, DurationSource::Container),
        (None, Some(d)) => (d, DurationSource::Stream),
        (None, None) => {
            let estimate = estimate_duration_secs(file_size_bytes, assumed_bitrate_bps);
            if estimate <= 0.0 {
                return Err(ClipforgeError::probe(
                    path,
                    "no duration reported and file is empty",
                ));
            }
            (estimate, DurationSource::Estimated)
        }
    };

    Ok(MediaInfo {
        duration,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        duration_source,
    })
}

/// Rough duration from file size at a fixed bitrate.
pub fn estimate_duration_secs(file_size_bytes: u64, assumed_bitrate_bps: u64) -> f64 {
    (file_size_bytes as f64 * 8.0) / assumed_bitrate_bps.max(1) as f64
}

fn parse_duration(raw: Option<&str>) -> Option<f64> {
    raw?.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BITRATE: u64 = 2_500_000;

    fn path() -> &'static Path {
        Path::new("/captures/screen.webm")
    }

    #[test]
    fn test_container_duration_returned_unmodified() {
        let json = r#"{
            "streams": [
                { "codec_type": "audio", "duration": "9.9" },
                { "codec_type": "video", "width": 1920, "height": 1080, "duration": "12.000000" }
            ],
            "format": { "duration": "12.345678" }
        }"#;
        let info = parse_probe_output(json, 10_000_000, BITRATE, path()).unwrap();
        assert_eq!(info.duration, 12.345678);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.duration_source, DurationSource::Container);
    }

    #[test]
    fn test_stream_duration_used_when_container_missing() {
        let json = r#"{
            "streams": [ { "codec_type": "video", "width": 640, "height": 480, "duration": "4.5" } ],
            "format": { "duration": "N/A" }
        }"#;
        let info = parse_probe_output(json, 1, BITRATE, path()).unwrap();
        assert_eq!(info.duration, 4.5);
        assert_eq!(info.duration_source, DurationSource::Stream);
    }

    #[test]
    fn test_unparseable_duration_falls_back_to_size_estimate() {
        let json = r#"{
            "streams": [ { "codec_type": "video", "width": 1280, "height": 720 } ],
            "format": { "duration": "0" }
        }"#;
        let info = parse_probe_output(json, 3_125_000, BITRATE, path()).unwrap();
        assert!(info.is_estimated());
        assert!(info.duration > 0.0);
        assert!((info.duration - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_video_stream_is_a_probe_error() {
        let json = r#"{ "streams": [ { "codec_type": "audio" } ], "format": { "duration": "3.0" } }"#;
        let err = parse_probe_output(json, 100, BITRATE, path()).unwrap_err();
        assert!(matches!(err, ClipforgeError::Probe { .. }));
        assert!(err.to_string().contains("no video stream"));
    }

    #[test]
    fn test_empty_file_without_duration_fails() {
        let json = r#"{ "streams": [ { "codec_type": "video" } ] }"#;
        assert!(parse_probe_output(json, 0, BITRATE, path()).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_reports_not_found() {
        let probe = FfprobeProbe::new("ffprobe", BITRATE);
        let err = probe
            .probe(Path::new("/definitely/not/here.webm"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClipforgeError::FileNotFound { .. }));
    }
}
