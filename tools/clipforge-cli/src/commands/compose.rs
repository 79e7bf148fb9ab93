//! Compose a screen capture and a camera capture into one video.

use std::path::PathBuf;

use clipforge_render_engine::{CaptureArtifact, EngineConfig, EventSink, Exporter};

use super::print_event;

pub async fn run(
    engine: EngineConfig,
    screen: PathBuf,
    camera: PathBuf,
    output: PathBuf,
    screen_duration: Option<f64>,
    camera_duration: Option<f64>,
) -> anyhow::Result<()> {
    println!("Composing picture-in-picture");
    println!("  Screen: {}", screen.display());
    println!("  Camera: {}", camera.display());
    println!("  Output: {}", output.display());

    let captures = [
        artifact(screen, screen_duration),
        artifact(camera, camera_duration),
    ];

    let exporter = Exporter::new(engine);
    let (mut sink, mut events) = EventSink::channel();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event, false);
        }
    });

    let result = exporter
        .compose_picture_in_picture(&captures, &output, &mut sink)
        .await;
    drop(sink);
    let _ = printer.await;

    let outcome = result?;
    println!("  Duration: {:.2}s", outcome.duration_secs);
    if let Some(probed) = outcome.probed_duration_secs {
        println!("  Probed duration: {probed:.2}s");
    }
    Ok(())
}

fn artifact(path: PathBuf, measured: Option<f64>) -> CaptureArtifact {
    let artifact = CaptureArtifact::new(path);
    match measured {
        Some(secs) => artifact.with_measured_duration(secs),
        None => artifact,
    }
}
