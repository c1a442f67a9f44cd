//! Output formatting for CLI

use crate::models::ProgressSnapshot;
use crate::services::format::format_size;
use crate::{ArchiveSummary, RunStatus};

/// Maximum number of failures listed in the text report
const MAX_LISTED_ERRORS: usize = 10;

/// One-line human summary of an archive run
#[must_use]
pub fn summary_line(summary: &ArchiveSummary) -> String {
    let elapsed = summary
        .finished_at
        .duration_since(summary.started_at)
        .unwrap_or_default();

    let verdict = match summary.status() {
        RunStatus::Success => "All files archived",
        RunStatus::PartialSuccess => "Archive completed with failures",
        RunStatus::Failure => "No files could be archived",
    };

    format!(
        "{verdict}: {} of {} files into {} ({} in, {} out, {:.1}s)",
        summary.entries.len(),
        summary.files_seen,
        summary.output,
        format_size(summary.bytes_in),
        format_size(summary.archive_bytes),
        elapsed.as_secs_f64()
    )
}

/// Print the text report: failures (if any) followed by the summary line
pub fn format_text(summary: &ArchiveSummary) {
    if !summary.errors.is_empty() {
        eprintln!("Failed files: {}", summary.errors.len());
        for error in summary.errors.iter().take(MAX_LISTED_ERRORS) {
            eprintln!("  {} [{} {}]: {}", error.path, error.stage, error.code, error.message);
        }
        if summary.errors.len() > MAX_LISTED_ERRORS {
            eprintln!("  ... and {} more", summary.errors.len() - MAX_LISTED_ERRORS);
        }
    }

    println!("{}", summary_line(summary));
}

/// Progress line written to stderr while archiving
#[must_use]
pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    #[allow(clippy::cast_precision_loss)]
    let elapsed_secs = snapshot.timestamp_ms as f64 / 1000.0;
    let throughput_suffix = snapshot
        .recent_throughput_bytes_per_sec
        .map(|bps| format!(", throughput ~{}/s", format_size(bps)))
        .unwrap_or_default();

    format!(
        "[{elapsed_secs:6.1}s] {}/{} files, {} archived{throughput_suffix}",
        snapshot.completed_files,
        snapshot.launched_files,
        format_size(snapshot.processed_bytes)
    )
}

/// Format summary as JSON
#[must_use]
pub fn format_json(summary: &ArchiveSummary) -> String {
    let output = serde_json::json!({
        "root": summary.root,
        "output": summary.output,
        "status": summary.status(),
        "files_seen": summary.files_seen,
        "entry_count": summary.entries.len(),
        "bytes_in": summary.bytes_in,
        "archive_bytes": summary.archive_bytes,
        "entries": summary.entries,
        "error_count": summary.errors.len(),
        "errors": if summary.errors.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::json!(summary.errors)
        }
    });

    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}
