//! Batch outcome: produced artifacts, per-item failures, skipped stages

use super::MapArtifact;
use serde::Serialize;
use std::path::PathBuf;

/// Pipeline stage an item was in when it failed or was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading the input table
    Load,
    /// Single-snapshot map for the requested date context
    Snapshot,
    /// Rolling-window animated map
    Rolling,
    /// Combined index page
    Index,
}

/// A batch item that could not produce its artifact
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Input file that caused the error
    pub source: PathBuf,
    pub stage: Stage,
    /// Error code (e.g. `MISSING_COLUMN`, `RENDER_ERROR`)
    pub error_code: String,
    /// Human-readable error message
    pub error_message: String,
}

/// A stage that had nothing to render (not an error)
#[derive(Debug, Clone, Serialize)]
pub struct SkippedStage {
    pub source: PathBuf,
    pub stage: Stage,
    pub reason: String,
}

/// Batch completion result
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    /// `(label, path)` pairs in production order
    pub artifacts: Vec<MapArtifact>,
    pub failures: Vec<ItemFailure>,
    pub skipped: Vec<SkippedStage>,
}

impl BatchResult {
    pub fn has_artifacts(&self) -> bool {
        !self.artifacts.is_empty()
    }

    /// Artifact registered under `label`
    pub fn artifact(&self, label: &str) -> Option<&MapArtifact> {
        self.artifacts.iter().find(|a| a.label == label)
    }
}
