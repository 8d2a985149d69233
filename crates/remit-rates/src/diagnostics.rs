//! Diagnostics sink handed to every extractor call.
//!
//! Extractors report step-level observations (selected options, candidate
//! texts, extracted values) and ask the sink where to put a failure
//! snapshot. Nothing is captured from the page console.

use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::Value;

/// Receives step-level diagnostics from provider extractors.
pub trait DiagnosticsSink: Send + Sync {
    /// Record an observation made during one step of a provider flow.
    fn note(&self, provider: &str, step: &str, detail: &Value);

    /// Where to write a diagnostic snapshot, or `None` to skip capture.
    fn snapshot_path(&self, provider: &str, label: &str) -> Option<PathBuf>;
}

/// Logs notes through `tracing` and places snapshots under a directory.
#[derive(Debug, Clone, Default)]
pub struct TracingDiagnostics {
    snapshot_dir: Option<PathBuf>,
}

impl TracingDiagnostics {
    pub fn new(snapshot_dir: Option<PathBuf>) -> Self {
        Self { snapshot_dir }
    }
}

impl DiagnosticsSink for TracingDiagnostics {
    fn note(&self, provider: &str, step: &str, detail: &Value) {
        tracing::debug!(provider, step, %detail, "extractor step");
    }

    fn snapshot_path(&self, provider: &str, label: &str) -> Option<PathBuf> {
        let dir = self.snapshot_dir.as_ref()?;
        Some(snapshot_file(dir, provider, label))
    }
}

/// `<dir>/<provider>/debug_<label>_<millis>.png`, provider lowercased.
pub fn snapshot_file(dir: &std::path::Path, provider: &str, label: &str) -> PathBuf {
    let millis = chrono::Utc::now().timestamp_millis();
    dir.join(provider.to_ascii_lowercase())
        .join(format!("debug_{label}_{millis}.png"))
}

/// A recorded note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub provider: String,
    pub step: String,
    pub detail: Value,
}

/// Keeps notes in memory so tests and embedders can inspect the steps a
/// provider took.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    notes: Mutex<Vec<Note>>,
    snapshot_dir: Option<PathBuf>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_dir(dir: PathBuf) -> Self {
        Self {
            notes: Mutex::new(Vec::new()),
            snapshot_dir: Some(dir),
        }
    }

    /// All notes recorded so far.
    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Notes recorded for one step.
    pub fn steps(&self, step: &str) -> Vec<Note> {
        self.notes()
            .into_iter()
            .filter(|n| n.step == step)
            .collect()
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn note(&self, provider: &str, step: &str, detail: &Value) {
        if let Ok(mut notes) = self.notes.lock() {
            notes.push(Note {
                provider: provider.to_string(),
                step: step.to_string(),
                detail: detail.clone(),
            });
        }
    }

    fn snapshot_path(&self, provider: &str, label: &str) -> Option<PathBuf> {
        let dir = self.snapshot_dir.as_ref()?;
        Some(snapshot_file(dir, provider, label))
    }
}
