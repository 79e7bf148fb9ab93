//! In-process probe and transcoder doubles for unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clipforge_common::error::{ClipforgeError, ClipforgeResult};

use crate::config::EngineConfig;
use crate::events::EventSink;
use crate::executor::{TranscodeJob, Transcoder};
use crate::export::Exporter;
use crate::probe::{DurationSource, MediaInfo, MediaProbe};

/// Probe answering from a fixed table; unknown paths fail.
#[derive(Default)]
pub struct StaticProbe {
    known: HashMap<PathBuf, MediaInfo>,
    calls: Mutex<Vec<PathBuf>>,
}

impl StaticProbe {
    pub fn with(mut self, path: impl Into<PathBuf>, duration: f64) -> Self {
        self.known.insert(
            path.into(),
            MediaInfo {
                duration,
                width: 1280,
                height: 720,
                duration_source: DurationSource::Container,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaProbe for StaticProbe {
    async fn probe(&self, path: &Path) -> ClipforgeResult<MediaInfo> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        self.known
            .get(path)
            .copied()
            .ok_or_else(|| ClipforgeError::probe(path, "no video stream"))
    }
}

/// Transcoder that records jobs and emits a short progress sequence.
#[derive(Default)]
pub struct RecordingTranscoder {
    jobs: Mutex<Vec<TranscodeJob>>,
    fail_with: Option<String>,
}

impl RecordingTranscoder {
    pub fn failing(diagnostics: &str) -> Self {
        Self {
            jobs: Mutex::default(),
            fail_with: Some(diagnostics.to_string()),
        }
    }

    pub fn jobs(&self) -> Vec<TranscodeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for RecordingTranscoder {
    async fn run(&self, job: &TranscodeJob, events: &mut EventSink) -> ClipforgeResult<()> {
        self.jobs.lock().unwrap().push(job.clone());
        events.started(job.args().join(" "));
        events.progress(50.0, "00:00:01.00");

        if let Some(diagnostics) = &self.fail_with {
            return Err(ClipforgeError::ProcessFailed {
                status: "exit status: 1".to_string(),
                diagnostics: diagnostics.clone(),
            });
        }

        tokio::fs::write(&job.destination, b"encoded").await?;
        events.progress(100.0, "00:00:02.00");
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn exporter(probe: Arc<StaticProbe>, transcoder: Arc<RecordingTranscoder>) -> Exporter {
    Exporter::with_backends(Arc::new(EngineConfig::default()), probe, transcoder)
}
