//! Export progress events.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Lifecycle event of one export or composition.
///
/// Per operation: at most one `Started`, zero or more `Progress` with
/// non-decreasing percent, then exactly one of `Completed` / `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExportEvent {
    Started { command: String },
    Progress { percent: f64, timemark: String },
    Completed { output_path: PathBuf },
    Failed { error: String },
}

impl ExportEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Channel name and payload as broadcast to presentation surfaces.
    pub fn wire(&self) -> (&'static str, serde_json::Value) {
        match self {
            Self::Started { command } => {
                ("export:start", serde_json::json!({ "command": command }))
            }
            Self::Progress { percent, timemark } => (
                "export:progress",
                serde_json::json!({ "progress": percent, "timemark": timemark }),
            ),
            Self::Completed { output_path } => (
                "export:end",
                serde_json::json!({ "outputPath": output_path.display().to_string() }),
            ),
            Self::Failed { error } => ("export:error", serde_json::json!({ "error": error })),
        }
    }
}

/// Sending half of an event stream.
///
/// Every event goes to all open subscribers. Enforces the event algebra:
/// progress never decreases, and nothing is delivered after the terminal
/// event. A dropped receiver is not an error; it is unsubscribed.
#[derive(Debug)]
pub struct EventSink {
    subscribers: Vec<UnboundedSender<ExportEvent>>,
    last_percent: f64,
    finished: bool,
}

impl EventSink {
    /// Create a sink and its receiver.
    pub fn channel() -> (Self, UnboundedReceiver<ExportEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn new(tx: UnboundedSender<ExportEvent>) -> Self {
        Self {
            subscribers: vec![tx],
            last_percent: 0.0,
            finished: false,
        }
    }

    /// Open another receiver; it sees every event sent from now on.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ExportEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn started(&mut self, command: impl Into<String>) {
        self.send(ExportEvent::Started {
            command: command.into(),
        });
    }

    pub fn progress(&mut self, percent: f64, timemark: impl Into<String>) {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let percent = percent.max(self.last_percent);
        self.last_percent = percent;
        self.send(ExportEvent::Progress {
            percent,
            timemark: timemark.into(),
        });
    }

    pub fn completed(&mut self, output_path: &Path) {
        self.send(ExportEvent::Completed {
            output_path: output_path.to_path_buf(),
        });
    }

    pub fn failed(&mut self, error: impl Into<String>) {
        self.send(ExportEvent::Failed {
            error: error.into(),
        });
    }

    fn send(&mut self, event: ExportEvent) {
        if self.finished {
            tracing::debug!(?event, "Dropping event after terminal event");
            return;
        }
        self.finished = event.is_terminal();
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
