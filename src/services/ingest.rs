//! Per-file ingest task: open, read, append under the writer lock.

use crate::models::{EntryRecord, ErrorItem, FailureStage, IngestOutcome, ReadStrategy, SourceFile};
use crate::services::writer::{EntryAttributes, SerializedArchiveWriter};
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};

/// Settings shared by every ingest task of a run
#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    /// Files up to this size are read fully before the writer lock is taken.
    pub prefetch_limit: u64,
}

/// Archive one file into `writer`.
///
/// Failures are logged and returned as `IngestOutcome::Failed`; they never
/// abort the run. The file handle is closed before this returns on every path.
pub fn ingest_file<W: Write + Seek>(
    source: &SourceFile,
    writer: &SerializedArchiveWriter<W>,
    settings: IngestSettings,
) -> IngestOutcome {
    let path_str = source.path.to_string_lossy().to_string();

    let outcome = match open_source(source, settings) {
        Ok((payload, attrs)) => append_payload(source, &path_str, payload, attrs, writer),
        Err(item) => IngestOutcome::Failed(item),
    };

    match &outcome {
        IngestOutcome::Added(record) => {
            log::info!("Added {} ({} bytes)", record.name, record.size_bytes);
        }
        IngestOutcome::Failed(item) => {
            log::warn!(
                "Failed to archive {} ({} stage): {} [{}]",
                item.path,
                item.stage,
                item.message,
                item.code
            );
        }
    }

    outcome
}

/// Archive bytes from an arbitrary reader as entry `name`.
///
/// This is the lock-and-append half of [`ingest_file`]; `label` names the
/// source in the recorded outcome. The lock is released before returning.
pub fn ingest_reader<W: Write + Seek>(
    name: &str,
    label: &str,
    reader: &mut dyn Read,
    attrs: EntryAttributes,
    strategy: ReadStrategy,
    writer: &SerializedArchiveWriter<W>,
) -> IngestOutcome {
    log::trace!("Waiting for archive writer: {name}");
    let result = writer.lock().append(name, reader, attrs);

    match result {
        Ok(size_bytes) => IngestOutcome::Added(EntryRecord {
            name: name.to_string(),
            source_path: label.to_string(),
            size_bytes,
            strategy,
        }),
        Err(err) => IngestOutcome::Failed(err.into_error_item(label)),
    }
}

enum Payload {
    Buffered(Vec<u8>),
    Streamed(BufReader<File>),
}

fn open_source(
    source: &SourceFile,
    settings: IngestSettings,
) -> Result<(Payload, EntryAttributes), ErrorItem> {
    let path_str = || source.path.to_string_lossy().to_string();

    let mut file = File::open(&source.path)
        .map_err(|e| ErrorItem::from_io(&path_str(), FailureStage::Open, &e))?;
    let metadata = file
        .metadata()
        .map_err(|e| ErrorItem::from_io(&path_str(), FailureStage::Open, &e))?;
    let attrs = EntryAttributes::from_metadata(&metadata);

    if attrs.size_hint <= settings.prefetch_limit {
        let capacity = usize::try_from(attrs.size_hint).unwrap_or(0);
        let mut buf = Vec::with_capacity(capacity);
        file.read_to_end(&mut buf)
            .map_err(|e| ErrorItem::from_io(&path_str(), FailureStage::Read, &e))?;
        log::trace!("Prefetched {} ({} bytes)", source.path.display(), buf.len());
        Ok((Payload::Buffered(buf), attrs))
    } else {
        Ok((Payload::Streamed(BufReader::new(file)), attrs))
    }
}

fn append_payload<W: Write + Seek>(
    source: &SourceFile,
    path_str: &str,
    payload: Payload,
    attrs: EntryAttributes,
    writer: &SerializedArchiveWriter<W>,
) -> IngestOutcome {
    let (strategy, mut reader): (ReadStrategy, Box<dyn Read>) = match payload {
        Payload::Buffered(buf) => (ReadStrategy::Buffered, Box::new(std::io::Cursor::new(buf))),
        Payload::Streamed(file) => (ReadStrategy::Streamed, Box::new(file)),
    };

    ingest_reader(
        &source.entry_name,
        path_str,
        &mut *reader,
        attrs,
        strategy,
        writer,
    )
}
