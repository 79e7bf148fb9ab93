//! End-to-end runs against stand-in `ffmpeg` / `ffprobe` shell scripts.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use clipforge_common::error::ClipforgeError;
use clipforge_project_model::ProjectDocument;
use clipforge_render_engine::{CaptureArtifact, EngineConfig, EventSink, ExportEvent, Exporter};
use tokio::sync::mpsc::UnboundedReceiver;

const FFMPEG_OK: &str = r#"#!/bin/sh
for arg in "$@"; do out="$arg"; done
printf '%s\n' "$@" > "$(dirname "$0")/ffmpeg-args.txt"
echo "frame=1"
echo "out_time_us=5000000"
echo "out_time=00:00:05.000000"
echo "progress=continue"
echo "out_time_us=2000000"
echo "out_time=00:00:02.000000"
echo "progress=continue"
echo "out_time_us=20000000"
echo "out_time=00:00:20.000000"
echo "progress=end"
printf 'encoded' > "$out"
exit 0
"#;

const FFMPEG_FAIL: &str = r#"#!/bin/sh
echo "out_time_us=1000000"
echo "progress=continue"
echo "Invalid data found when processing input" >&2
exit 1
"#;

const FFMPEG_FAIL_LATIN1_PATH: &str = r#"#!/bin/sh
printf '/media/caf\351.mp4: Invalid data found when processing input\n' >&2
exit 1
"#;

const FFPROBE_OK: &str = r#"#!/bin/sh
cat <<'JSON'
{
  "streams": [ { "codec_type": "video", "width": 1920, "height": 1080 } ],
  "format": { "duration": "12.300000" }
}
JSON
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("script should be writable");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("script should be executable");
    path
}

fn exporter(dir: &Path, ffmpeg_body: &str) -> Exporter {
    let config = EngineConfig {
        ffmpeg: write_script(dir, "ffmpeg", ffmpeg_body),
        ffprobe: write_script(dir, "ffprobe", FFPROBE_OK),
        ..EngineConfig::default()
    };
    Exporter::new(config)
}

fn sample_project() -> ProjectDocument {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("sample-project")
        .join("project.json");
    ProjectDocument::load(path).expect("fixture project should load")
}

fn drain(rx: &mut UnboundedReceiver<ExportEvent>) -> Vec<ExportEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn export_runs_transcoder_and_reports_monotonic_progress() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = exporter(dir.path(), FFMPEG_OK);
    let destination = dir.path().join("out").join("final.mp4");

    let (handle, mut rx) = exporter.spawn_export(sample_project(), destination.clone());
    let output = handle.await.unwrap().unwrap();
    assert_eq!(output, destination);
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "encoded");

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(ExportEvent::Started { .. })));
    assert!(matches!(events.last(), Some(ExportEvent::Completed { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let percents: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            ExportEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents.len(), 3);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!((percents[0] - 25.0).abs() < 1e-9);
    assert_eq!(percents[2], 100.0);

    let args = std::fs::read_to_string(dir.path().join("ffmpeg-args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    let inputs: Vec<&str> = args
        .windows(2)
        .filter(|w| w[0] == "-i")
        .map(|w| w[1])
        .collect();
    assert_eq!(inputs, vec!["/media/intro.mp4", "/media/demo.mp4"]);

    let graph_pos = args.iter().position(|a| *a == "-filter_complex").unwrap();
    let graph = args[graph_pos + 1];
    assert!(graph.starts_with("[0:v]trim=start=2:end=7,setpts=PTS-STARTPTS+0/TB[v0]"));
    assert!(graph.contains("[1:v]trim=start=30:end=35,setpts=PTS-STARTPTS+15/TB[v2]"));
    assert!(graph.contains("concat=n=3:v=1:a=0[outv]"));
}

#[tokio::test]
async fn failing_transcoder_surfaces_diagnostics_once() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = exporter(dir.path(), FFMPEG_FAIL);

    let (mut sink, mut rx) = EventSink::channel();
    let err = exporter
        .export(&sample_project(), &dir.path().join("final.mp4"), &mut sink)
        .await
        .unwrap_err();

    match &err {
        ClipforgeError::ProcessFailed { diagnostics, .. } => {
            assert!(diagnostics.contains("Invalid data found"));
        }
        other => panic!("expected process failure, got {other:?}"),
    }

    let events = drain(&mut rx);
    assert!(matches!(events.last(), Some(ExportEvent::Failed { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn non_utf8_diagnostics_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = exporter(dir.path(), FFMPEG_FAIL_LATIN1_PATH);

    let (mut sink, mut rx) = EventSink::channel();
    let err = exporter
        .export(&sample_project(), &dir.path().join("final.mp4"), &mut sink)
        .await
        .unwrap_err();

    match &err {
        ClipforgeError::ProcessFailed { diagnostics, .. } => {
            assert!(diagnostics.contains("Invalid data found"));
            assert!(diagnostics.starts_with("/media/caf"));
        }
        other => panic!("expected process failure, got {other:?}"),
    }
    assert!(matches!(drain(&mut rx).last(), Some(ExportEvent::Failed { .. })));
}

#[tokio::test]
async fn dry_run_plan_skips_missing_clip() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = exporter(dir.path(), FFMPEG_OK);

    let plan = exporter
        .prepare(&sample_project(), &dir.path().join("final.mp4"))
        .await
        .unwrap();

    let order: Vec<&str> = plan.segments.iter().map(|s| s.item_id.as_str()).collect();
    assert_eq!(order, vec!["item-01", "item-02", "item-03"]);
    assert_eq!(plan.warnings.len(), 1);
    assert!((plan.job.expected_duration_secs - 20.0).abs() < 1e-9);
    assert!(!dir.path().join("ffmpeg-args.txt").exists());
}

#[tokio::test]
async fn picture_in_picture_verifies_output_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = exporter(dir.path(), FFMPEG_OK);
    let screen = dir.path().join("screen.webm");
    let camera = dir.path().join("camera.webm");
    std::fs::write(&screen, b"screen").unwrap();
    std::fs::write(&camera, b"camera").unwrap();

    let (mut sink, mut rx) = EventSink::channel();
    let outcome = exporter
        .compose_picture_in_picture(
            &[
                CaptureArtifact::new(&screen).with_measured_duration(12.0),
                CaptureArtifact::new(&camera).with_measured_duration(12.0),
            ],
            &dir.path().join("recording.webm"),
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(outcome.duration_secs, 12.0);
    assert_eq!(outcome.probed_duration_secs, Some(12.3));
    assert!(!screen.exists());
    assert!(!camera.exists());

    let args = std::fs::read_to_string(dir.path().join("ffmpeg-args.txt")).unwrap();
    assert!(args.contains(
        "[1:v]scale=320:240[pip];[0:v][pip]overlay=main_w-overlay_w-10:main_h-overlay_h-10[output]"
    ));
    assert!(args.lines().any(|a| a == "-an"));
    assert!(matches!(drain(&mut rx).last(), Some(ExportEvent::Completed { .. })));
}
