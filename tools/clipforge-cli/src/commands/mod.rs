pub mod check;
pub mod compose;
pub mod export;
pub mod plan;
pub mod probe;

use clipforge_render_engine::ExportEvent;

/// Render one event for the terminal.
pub(crate) fn print_event(event: &ExportEvent, json: bool) {
    if json {
        let (channel, payload) = event.wire();
        println!(
            "{}",
            serde_json::json!({ "channel": channel, "payload": payload })
        );
        return;
    }

    match event {
        ExportEvent::Started { command } => {
            tracing::debug!(%command, "Transcoder started");
            println!("  Transcoder started");
        }
        ExportEvent::Progress { percent, timemark } => {
            print!("\r  Progress: {percent:5.1}% ({timemark})  ");
        }
        ExportEvent::Completed { output_path } => {
            println!("\nDone: {}", output_path.display());
        }
        ExportEvent::Failed { error } => {
            println!("\nFailed: {error}");
        }
    }
}
