//! Check system capabilities.

use clipforge_render_engine::EngineConfig;

pub fn run(engine: &EngineConfig) -> anyhow::Result<()> {
    println!("Clipforge System Check");
    println!("{}", "=".repeat(50));

    let tools = engine.tool_status();
    for tool in &tools {
        if tool.available {
            println!("[OK] {}: {}", tool.name, tool.path.display());
        } else {
            println!("[MISSING] {}: {}", tool.name, tool.path.display());
        }
    }

    println!();
    println!(
        "Export preset: {} ({}, crf {}) + {} {}k",
        engine.export.video_codec,
        engine.export.preset,
        engine.export.crf,
        engine.export.audio_codec,
        engine.export.audio_bitrate_kbps
    );
    println!(
        "Composite preset: {} @ {}, camera {}x{}",
        engine.composite.video_codec,
        engine.composite.video_bitrate,
        engine.composite.overlay_width,
        engine.composite.overlay_height
    );
    println!(
        "Recording ceiling: {} min",
        engine.recording_clock().ceiling().as_secs() / 60
    );

    println!();
    if tools.iter().all(|t| t.available) {
        println!("All required tools are available. Clipforge is ready.");
        Ok(())
    } else {
        anyhow::bail!(
            "Some required tools are missing. Install ffmpeg or set binaries in the config file."
        )
    }
}
