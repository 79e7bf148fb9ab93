//! Dry-run an export: print the plan and transcoder command.

use std::path::PathBuf;

use clipforge_project_model::ProjectDocument;
use clipforge_render_engine::{EngineConfig, Exporter};

pub async fn run(engine: EngineConfig, project: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let document = ProjectDocument::load(&project)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let program = engine.ffmpeg.clone();
    let plan = Exporter::new(engine).prepare(&document, &output).await?;

    println!("Project: {}", document.meta().name);
    println!("{plan}");
    println!();
    println!("Command:");
    println!("  {} {}", program.display(), plan.job.args().join(" "));

    Ok(())
}
