//! Parallel ZIP Archiving Library
//!
//! This library archives a directory tree into a single ZIP file. Files are
//! opened and read by a bounded pool of ingest tasks, while every write to the
//! archive goes through one serialized writer so entries never interleave.

pub mod cli;
pub mod models;
pub mod services;

pub use models::{EntryRecord, ErrorItem, IngestOutcome, ProgressSnapshot, RunStatus, SourceFile};

use services::ingest::{IngestSettings, ingest_file};
use services::progress::{DEFAULT_BYTE_TRIGGER, ProgressReporter};
use services::tasks::TaskSet;
use services::walk::{FileWalker, WalkError};
use services::writer::{ArchiveFormat, SerializedArchiveWriter};
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::result;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Custom error type for the library
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    InvalidInput(String),
    /// The walk failed midway; tasks already launched were finished and the
    /// partial archive was finalized.
    Traversal {
        path: PathBuf,
        source: std::io::Error,
        partial: Box<ArchiveSummary>,
    },
    Archive(String),
    System(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Error::Traversal { path, source, partial } => write!(
                f,
                "Traversal failed at {}: {source} ({} entries archived before the failure)",
                path.display(),
                partial.entries.len()
            ),
            Error::Archive(msg) => write!(f, "Archive error: {msg}"),
            Error::System(msg) => write!(f, "System error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::Traversal { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Callback receiving progress snapshots while an archive is being written
pub type ProgressNotifier = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Compression applied to archive entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    Stored,
    #[default]
    Deflate,
}

impl Compression {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Stored => "stored",
            Compression::Deflate => "deflate",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "stored" | "store" | "none" => Some(Compression::Stored),
            "deflate" | "deflated" => Some(Compression::Deflate),
            _ => None,
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        Compression::from_label(s).ok_or_else(|| format!("unknown compression '{s}'"))
    }
}

/// How archive entry names are derived from file paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryNaming {
    /// Path relative to the archive root, `/`-separated
    #[default]
    RelativePath,
    /// File name only; files with the same name in different directories collide
    BaseName,
}

impl EntryNaming {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryNaming::RelativePath => "relative",
            EntryNaming::BaseName => "basename",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "relative" | "path" => Some(EntryNaming::RelativePath),
            "basename" | "flat" => Some(EntryNaming::BaseName),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryNaming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryNaming {
    type Err = String;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        EntryNaming::from_label(s).ok_or_else(|| format!("unknown naming '{s}'"))
    }
}

/// Default size up to which files are read before taking the writer lock
pub const DEFAULT_PREFETCH_LIMIT: u64 = 256 * 1024;

/// Options for archiving a directory
#[derive(Clone)]
pub struct ArchiveOptions {
    /// Worker threads; `0` uses the available parallelism.
    pub workers: usize,
    /// Maximum tasks in flight; `0` uses four per worker.
    pub max_pending: usize,
    pub naming: EntryNaming,
    pub compression: Compression,
    pub level: Option<i64>,
    pub prefetch_limit: u64,
    pub follow_symlinks: bool,
    pub comment: Option<String>,
    pub progress_interval: Duration,
    pub progress_byte_trigger: u64,
    pub progress_notifier: Option<ProgressNotifier>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            max_pending: 0,
            naming: EntryNaming::RelativePath,
            compression: Compression::Deflate,
            level: None,
            prefetch_limit: DEFAULT_PREFETCH_LIMIT,
            follow_symlinks: false,
            comment: None,
            progress_interval: Duration::from_secs(2),
            progress_byte_trigger: DEFAULT_BYTE_TRIGGER,
            progress_notifier: None,
        }
    }
}

impl std::fmt::Debug for ArchiveOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveOptions")
            .field("workers", &self.workers)
            .field("max_pending", &self.max_pending)
            .field("naming", &self.naming)
            .field("compression", &self.compression)
            .field("level", &self.level)
            .field("prefetch_limit", &self.prefetch_limit)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("comment", &self.comment)
            .field("progress_interval", &self.progress_interval)
            .field("progress_notifier", &self.progress_notifier.is_some())
            .finish_non_exhaustive()
    }
}

impl ArchiveOptions {
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
    }

    #[must_use]
    pub fn effective_max_pending(&self) -> usize {
        if self.max_pending > 0 {
            self.max_pending
        } else {
            self.effective_workers().saturating_mul(4)
        }
    }

    #[must_use]
    pub fn format(&self) -> ArchiveFormat {
        ArchiveFormat {
            compression: self.compression,
            level: self.level,
        }
    }
}

/// Results of running ingest tasks over a sequence of source files
#[derive(Debug)]
pub struct IngestRun {
    pub entries: Vec<EntryRecord>,
    pub errors: Vec<ErrorItem>,
    pub files_seen: u64,
    pub progress: Vec<ProgressSnapshot>,
    pub traversal_error: Option<WalkError>,
}

impl IngestRun {
    #[must_use]
    pub fn status(&self) -> RunStatus {
        RunStatus::from_counts(self.entries.len(), self.errors.len())
    }
}

/// Summary result from an archive operation
#[derive(Debug)]
pub struct ArchiveSummary {
    pub root: String,
    pub output: String,
    pub entries: Vec<EntryRecord>,
    pub errors: Vec<ErrorItem>,
    pub files_seen: u64,
    pub bytes_in: u64,
    pub archive_bytes: u64,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    pub progress: Vec<ProgressSnapshot>,
}

impl ArchiveSummary {
    #[must_use]
    pub fn status(&self) -> RunStatus {
        RunStatus::from_counts(self.entries.len(), self.errors.len())
    }
}

/// Run one ingest task per source on a bounded worker pool, appending into `writer`.
///
/// Sources are enumerated on the calling thread. Each source waits for a free
/// slot (see [`ArchiveOptions::max_pending`]) before it is handed to the pool.
/// This returns only after every launched task has reported completion, so
/// the caller may finalize `writer` afterwards. A source error stops the
/// enumeration; it is returned in [`IngestRun::traversal_error`] once the
/// already-launched tasks have finished.
pub fn archive_sources<I, W>(
    sources: I,
    writer: &SerializedArchiveWriter<W>,
    opts: &ArchiveOptions,
) -> Result<IngestRun>
where
    I: IntoIterator<Item = result::Result<SourceFile, WalkError>>,
    W: Write + Seek + Send,
{
    let workers = opts.effective_workers();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("parzip-ingest-{i}"))
        .build()
        .map_err(|e| Error::System(format!("failed to build worker pool: {e}")))?;

    let tasks = TaskSet::new(opts.effective_max_pending());
    let reporter = ProgressReporter::new(
        opts.progress_interval,
        opts.progress_byte_trigger,
        opts.progress_notifier.clone(),
    );
    let settings = IngestSettings {
        prefetch_limit: opts.prefetch_limit,
    };

    log::debug!(
        "Starting ingest with {workers} workers, at most {} pending tasks",
        opts.effective_max_pending()
    );

    let (files_seen, traversal_error) = pool.in_place_scope(|scope| {
        let mut files_seen = 0u64;
        for source in sources {
            let source = match source {
                Ok(source) => source,
                Err(err) => {
                    log::error!("{err}; waiting for launched tasks to finish");
                    return (files_seen, Some(err));
                }
            };

            files_seen += 1;
            let mut ticket = tasks.launch();
            let tasks = &tasks;
            let reporter = &reporter;
            scope.spawn(move |_| {
                ticket.record(ingest_file(&source, writer, settings));
                drop(ticket);
                reporter.observe(tasks.counters());
            });
        }
        (files_seen, None)
    });

    // The scope has joined every task; nothing may still hold the writer.
    tasks.wait_idle();
    reporter.finish(tasks.counters());

    let (entries, errors) = tasks.into_results();
    Ok(IngestRun {
        entries,
        errors,
        files_seen,
        progress: reporter.into_events(),
        traversal_error,
    })
}

/// Archive every regular file below `root` into a new ZIP file at `output`.
///
/// # Arguments
/// * `root` - The directory to archive
/// * `output` - Path of the archive to create (truncated if it exists)
/// * `opts` - Archive options
///
/// # Returns
/// A summary of archived entries and per-file failures. Per-file failures do
/// not make this return an error; inspect [`ArchiveSummary::status`].
pub fn archive_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    root: P,
    output: Q,
    opts: &ArchiveOptions,
) -> Result<ArchiveSummary> {
    let root = root.as_ref();
    let output = output.as_ref();
    let root_display = root.to_string_lossy().to_string();

    if !root.exists() {
        return Err(Error::InvalidInput(format!(
            "Path does not exist: {root_display}"
        )));
    }

    if !root.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Path is not a directory: {root_display}"
        )));
    }

    let started_at = SystemTime::now();
    let canonical_root = fs::canonicalize(root)?;

    let file = File::create(output)?;
    let canonical_output = fs::canonicalize(output)?;
    log::debug!("Created archive: {}", canonical_output.display());

    let writer = SerializedArchiveWriter::with_comment(
        BufWriter::new(file),
        opts.format(),
        opts.comment.clone(),
    );

    let walker = FileWalker::new(&canonical_root, opts.naming)
        .follow_symlinks(opts.follow_symlinks)
        .exclude(canonical_output);

    let run = archive_sources(walker, &writer, opts)?;

    let (sink, entry_count) = writer.finalize()?;
    debug_assert_eq!(entry_count, run.entries.len() as u64);

    let file = sink.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    let archive_bytes = file.metadata()?.len();
    drop(file);

    let summary = ArchiveSummary {
        root: root_display,
        output: output.to_string_lossy().to_string(),
        bytes_in: run.entries.iter().map(|e| e.size_bytes).sum(),
        entries: run.entries,
        errors: run.errors,
        files_seen: run.files_seen,
        archive_bytes,
        started_at,
        finished_at: SystemTime::now(),
        progress: run.progress,
    };

    match run.traversal_error {
        Some(WalkError { path, source }) => Err(Error::Traversal {
            path,
            source,
            partial: Box::new(summary),
        }),
        None => Ok(summary),
    }
}
