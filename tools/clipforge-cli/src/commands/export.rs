//! Export a project timeline to video.

use std::path::PathBuf;

use clipforge_project_model::ProjectDocument;
use clipforge_render_engine::{EngineConfig, Exporter};

use super::print_event;

pub async fn run(
    engine: EngineConfig,
    project: PathBuf,
    output: PathBuf,
    json_events: bool,
) -> anyhow::Result<()> {
    let document = ProjectDocument::load(&project)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    if !json_events {
        println!("Exporting project: {}", document.meta().name);
        println!("  Project: {}", project.display());
        println!("  Output: {}", output.display());
    }

    let exporter = Exporter::new(engine);
    let (handle, mut events) = exporter.spawn_export(document, output);

    while let Some(event) = events.recv().await {
        print_event(&event, json_events);
    }

    handle
        .await
        .map_err(|e| anyhow::anyhow!("Export task panicked: {e}"))??;
    Ok(())
}
