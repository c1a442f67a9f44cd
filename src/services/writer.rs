//! Serialized archive writer shared by all ingest tasks.
//!
//! A ZIP stream is inherently sequential: the bytes of one entry must be
//! written contiguously, followed by the next entry's header. The writer owns
//! the encoder behind a single mutex and only hands out appends through an
//! [`AppendGuard`], so at most one entry is being written at any instant.
//!
//! State machine: `Open -> (append)* -> Finalized`. `finalize` consumes the
//! writer, which makes an append after (or during) finalization impossible.

use crate::models::{ErrorItem, FailureStage};
use crate::{Compression, Error};
use std::collections::HashSet;
use std::io::{self, Read, Seek, Write};
use std::sync::{Mutex, MutexGuard};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entries at or above this size need ZIP64 extra fields.
const LARGE_FILE_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Encoding settings applied to every entry of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveFormat {
    pub compression: Compression,
    pub level: Option<i64>,
}

impl Default for ArchiveFormat {
    fn default() -> Self {
        Self {
            compression: Compression::Deflate,
            level: None,
        }
    }
}

impl ArchiveFormat {
    fn file_options(&self, attrs: EntryAttributes) -> SimpleFileOptions {
        let mut options =
            SimpleFileOptions::default().large_file(attrs.size_hint >= LARGE_FILE_THRESHOLD);

        // Deflate accepts levels 1..=9; level 0 stores the entry uncompressed
        options = match (self.compression, self.level) {
            (Compression::Stored, _) | (Compression::Deflate, Some(0)) => {
                options.compression_method(CompressionMethod::Stored)
            }
            (Compression::Deflate, _) => options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(self.level),
        };

        if let Some(mode) = attrs.unix_mode {
            options = options.unix_permissions(mode);
        }
        options
    }
}

/// Per-entry attributes taken from the source file's metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryAttributes {
    pub size_hint: u64,
    pub unix_mode: Option<u32>,
}

impl EntryAttributes {
    #[must_use]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        #[cfg(unix)]
        let unix_mode = {
            use std::os::unix::fs::PermissionsExt;
            Some(metadata.permissions().mode() & 0o7777)
        };
        #[cfg(not(unix))]
        let unix_mode = None;

        Self {
            size_hint: metadata.len(),
            unix_mode,
        }
    }
}

/// Reason an append was rejected or failed
#[derive(Debug)]
pub enum AppendErrorKind {
    /// An entry with the same name is already in the archive
    Duplicate,
    /// A previous append panicked while holding the writer
    Poisoned,
    Zip(ZipError),
    Io(io::Error),
}

/// Failure of a single append; never fatal to the archive run
#[derive(Debug)]
pub struct AppendError {
    pub stage: FailureStage,
    pub kind: AppendErrorKind,
}

impl AppendError {
    fn entry(kind: AppendErrorKind) -> Self {
        Self {
            stage: FailureStage::Entry,
            kind,
        }
    }

    fn copy(err: io::Error) -> Self {
        Self {
            stage: FailureStage::Copy,
            kind: AppendErrorKind::Io(err),
        }
    }

    /// Convert into the error item recorded for `path`.
    #[must_use]
    pub fn into_error_item(self, path: &str) -> ErrorItem {
        let (code, message) = match self.kind {
            AppendErrorKind::Io(err) | AppendErrorKind::Zip(ZipError::Io(err)) => {
                return ErrorItem::from_io(path, self.stage, &err);
            }
            AppendErrorKind::Duplicate => (
                "DUPLICATE",
                "entry name already present in archive".to_string(),
            ),
            AppendErrorKind::Poisoned => ("POISONED", "archive writer is poisoned".to_string()),
            AppendErrorKind::Zip(err) => ("ZIP", err.to_string()),
        };

        ErrorItem {
            path: path.to_string(),
            stage: self.stage,
            code: code.to_string(),
            message,
        }
    }
}

impl std::fmt::Display for AppendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            AppendErrorKind::Duplicate => write!(f, "{} failed: duplicate entry name", self.stage),
            AppendErrorKind::Poisoned => {
                write!(f, "{} failed: archive writer is poisoned", self.stage)
            }
            AppendErrorKind::Zip(err) => write!(f, "{} failed: {err}", self.stage),
            AppendErrorKind::Io(err) => write!(f, "{} failed: {err}", self.stage),
        }
    }
}

impl std::error::Error for AppendError {}

struct WriterState<W: Write + Seek> {
    zip: ZipWriter<W>,
    names: HashSet<String>,
    entries: u64,
}

/// Single shared archive writer; appends are mutually exclusive
pub struct SerializedArchiveWriter<W: Write + Seek> {
    state: Mutex<WriterState<W>>,
    format: ArchiveFormat,
}

impl<W: Write + Seek> SerializedArchiveWriter<W> {
    /// Bind a new ZIP encoder to `sink`.
    pub fn new(sink: W, format: ArchiveFormat) -> Self {
        Self::with_comment(sink, format, None)
    }

    /// Bind a new ZIP encoder to `sink`, storing `comment` as the archive comment.
    pub fn with_comment(sink: W, format: ArchiveFormat, comment: Option<String>) -> Self {
        let mut zip = ZipWriter::new(sink);
        if let Some(comment) = comment {
            zip.set_comment(comment);
        }

        Self {
            state: Mutex::new(WriterState {
                zip,
                names: HashSet::new(),
                entries: 0,
            }),
            format,
        }
    }

    /// Acquire exclusive access, blocking until no other append is running.
    pub fn lock(&self) -> AppendGuard<'_, W> {
        match self.state.lock() {
            Ok(state) => AppendGuard {
                state,
                format: self.format,
                poisoned: false,
            },
            Err(poisoned) => AppendGuard {
                state: poisoned.into_inner(),
                format: self.format,
                poisoned: true,
            },
        }
    }

    /// Write the central directory and flush, returning the sink and entry count.
    ///
    /// Taking `self` by value means every borrower (every ingest task) must be
    /// gone before the archive can be sealed.
    pub fn finalize(self) -> crate::Result<(W, u64)> {
        let state = self.state.into_inner().map_err(|_| {
            Error::Archive("archive writer poisoned by a panicking task".to_string())
        })?;

        let entries = state.entries;
        let mut sink = state
            .zip
            .finish()
            .map_err(|e| Error::Archive(format!("failed to finalize archive: {e}")))?;
        sink.flush()?;

        log::debug!("Archive finalized with {entries} entries");
        Ok((sink, entries))
    }
}

/// Exclusive-access guard; the only way to append an entry
pub struct AppendGuard<'a, W: Write + Seek> {
    state: MutexGuard<'a, WriterState<W>>,
    format: ArchiveFormat,
    poisoned: bool,
}

impl<W: Write + Seek> AppendGuard<'_, W> {
    /// Append a named entry, streaming its contents from `reader`.
    ///
    /// Returns the number of uncompressed bytes written. If the copy fails the
    /// partial entry is removed again, so the archive never holds a truncated
    /// entry.
    pub fn append(
        &mut self,
        name: &str,
        reader: &mut dyn Read,
        attrs: EntryAttributes,
    ) -> Result<u64, AppendError> {
        if self.poisoned {
            return Err(AppendError::entry(AppendErrorKind::Poisoned));
        }

        let state = &mut *self.state;
        if !state.names.insert(name.to_string()) {
            return Err(AppendError::entry(AppendErrorKind::Duplicate));
        }

        let options = self.format.file_options(attrs);
        if let Err(err) = state.zip.start_file(name, options) {
            state.names.remove(name);
            return Err(AppendError::entry(AppendErrorKind::Zip(err)));
        }

        let copied = io::copy(reader, &mut state.zip).and_then(|n| {
            state.zip.flush()?;
            Ok(n)
        });

        match copied {
            Ok(n) => {
                state.entries += 1;
                Ok(n)
            }
            Err(err) => {
                if let Err(abort_err) = state.zip.abort_file() {
                    log::warn!("Failed to discard partial entry {name}: {abort_err}");
                }
                state.names.remove(name);
                Err(AppendError::copy(err))
            }
        }
    }
}
