//! Clipforge CLI: command-line interface for timeline export and capture composition.
//!
//! Usage:
//!   clipforge export <PROJECT> -o <OUT>      Export a project timeline to video
//!   clipforge plan <PROJECT>                 Show the compiled export without running it
//!   clipforge compose <SCREEN> <CAMERA>      Overlay a camera capture on a screen capture
//!   clipforge probe <FILE>                   Show media duration and frame size
//!   clipforge check                          Check that the media tools are available

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clipforge_common::config::AppConfig;
use clipforge_render_engine::EngineConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "clipforge",
    about = "Compile editing timelines into a single transcode",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a project timeline to a video file
    Export {
        /// Path to the project document (JSON)
        project: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Print events as JSON lines instead of a progress bar
        #[arg(long)]
        json_events: bool,
    },

    /// Show the segment plan and filter graph for an export
    Plan {
        /// Path to the project document (JSON)
        project: PathBuf,

        /// Output file path the plan is compiled for
        #[arg(short, long, default_value = "export.mp4")]
        output: PathBuf,
    },

    /// Overlay a camera capture onto a screen capture
    Compose {
        /// Screen capture file
        screen: PathBuf,

        /// Camera capture file
        camera: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Measured screen capture length in seconds (preferred over probing)
        #[arg(long)]
        screen_duration: Option<f64>,

        /// Measured camera capture length in seconds (preferred over probing)
        #[arg(long)]
        camera_duration: Option<f64>,
    },

    /// Probe a media file
    Probe {
        /// Media file path
        path: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and ffprobe are available
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    clipforge_common::logging::init_logging(&config.logging);

    let engine = EngineConfig::from_app_config(&config);

    match cli.command {
        Commands::Export {
            project,
            output,
            json_events,
        } => commands::export::run(engine, project, output, json_events).await,
        Commands::Plan { project, output } => commands::plan::run(engine, project, output).await,
        Commands::Compose {
            screen,
            camera,
            output,
            screen_duration,
            camera_duration,
        } => {
            commands::compose::run(
                engine,
                screen,
                camera,
                output,
                screen_duration,
                camera_duration,
            )
            .await
        }
        Commands::Probe { path, json } => commands::probe::run(engine, path, json).await,
        Commands::Check => commands::check::run(&engine),
    }
}
