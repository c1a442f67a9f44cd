//! Data models for archive entries, per-file failures, and progress snapshots

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A regular file discovered under the archive root, ready to be ingested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub entry_name: String,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, entry_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry_name: entry_name.into(),
        }
    }
}

/// How the bytes of a file reached the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStrategy {
    /// Read fully into memory before taking the writer lock
    Buffered,
    /// Copied from the open file while holding the writer lock
    Streamed,
}

/// One entry successfully written into the archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub name: String,
    pub source_path: String,
    pub size_bytes: u64,
    pub strategy: ReadStrategy,
}

/// Step of the ingest pipeline at which a file failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Open,
    Read,
    Entry,
    Copy,
}

impl FailureStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Open => "open",
            FailureStage::Read => "read",
            FailureStage::Entry => "entry",
            FailureStage::Copy => "copy",
        }
    }
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a non-fatal error encountered while ingesting one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorItem {
    pub path: String,
    pub stage: FailureStage,
    pub code: String,
    pub message: String,
}

impl ErrorItem {
    /// Build an error item from an I/O error, mapping common kinds to errno-style codes.
    #[must_use]
    pub fn from_io(path: &str, stage: FailureStage, error: &std::io::Error) -> Self {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => "ENOENT",
            std::io::ErrorKind::PermissionDenied => "EACCES",
            _ => "IO",
        };

        Self {
            path: path.to_string(),
            stage,
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result reported by every ingest task, success or not
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Added(EntryRecord),
    Failed(ErrorItem),
}

/// Overall result of an archive run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every discovered file was archived
    Success,
    /// Some files were archived, some failed
    PartialSuccess,
    /// Every discovered file failed
    Failure,
}

impl RunStatus {
    /// Derive the run status from the number of archived and failed files.
    #[must_use]
    pub fn from_counts(added: usize, failed: usize) -> Self {
        match (added, failed) {
            (_, 0) => RunStatus::Success,
            (0, _) => RunStatus::Failure,
            _ => RunStatus::PartialSuccess,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::PartialSuccess => "partial_success",
            RunStatus::Failure => "failure",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress snapshot emitted while files are being archived
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub timestamp_ms: u64,
    pub completed_files: u64,
    pub launched_files: u64,
    pub processed_bytes: u64,
    pub recent_throughput_bytes_per_sec: Option<u64>,
}
