//! Probe a media file.

use std::path::PathBuf;

use clipforge_render_engine::{EngineConfig, FfprobeProbe, MediaProbe};

pub async fn run(engine: EngineConfig, path: PathBuf, json: bool) -> anyhow::Result<()> {
    let probe = FfprobeProbe::new(engine.ffprobe, engine.assumed_bitrate_bps);
    let info = probe.probe(&path).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File: {}", path.display());
    println!(
        "  Duration: {:.3}s{}",
        info.duration,
        if info.is_estimated() { " (estimated)" } else { "" }
    );
    println!("  Resolution: {}x{}", info.width, info.height);
    Ok(())
}
