//! Resilience tests: per-file failures and traversal failures midway

use crate::fixtures::{patterned_bytes, read_archive, write_file_sync};
use parzip::models::FailureStage;
use parzip::services::walk::WalkError;
use parzip::services::writer::{ArchiveFormat, SerializedArchiveWriter};
use parzip::{ArchiveOptions, RunStatus, SourceFile};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

fn five_files(root: &Path) -> Vec<SourceFile> {
    (0..5)
        .map(|i| {
            let name = format!("file{i}.dat");
            write_file_sync(root.join(&name), &patterned_bytes(i, 1_000 + i)).unwrap();
            SourceFile::new(root.join(&name), name)
        })
        .collect()
}

#[test]
fn test_missing_file_does_not_block_others() {
    let temp_dir = TempDir::new().unwrap();
    let mut sources = five_files(temp_dir.path());
    fs::remove_file(&sources[2].path).unwrap();
    sources.swap(0, 2);

    let writer = SerializedArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::default());
    let run = parzip::archive_sources(
        sources.into_iter().map(Ok),
        &writer,
        &ArchiveOptions::default(),
    )
    .unwrap();

    assert_eq!(run.files_seen, 5);
    assert_eq!(run.entries.len(), 4);
    assert_eq!(run.errors.len(), 1);
    assert_eq!(run.errors[0].stage, FailureStage::Open);
    assert_eq!(run.errors[0].code, "ENOENT");
    assert!(run.errors[0].path.ends_with("file2.dat"));
    assert_eq!(run.status(), RunStatus::PartialSuccess);

    let (sink, count) = writer.finalize().unwrap();
    assert_eq!(count, 4);
    let archive = zip::ZipArchive::new(Cursor::new(sink.into_inner())).unwrap();
    assert_eq!(archive.len(), 4);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_among_five() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("perm");
    fs::create_dir_all(&root).unwrap();
    let sources = five_files(&root);
    let locked = &sources[3].path;
    fs::set_permissions(locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::File::open(locked).is_ok() {
        // Privileged users bypass file permissions; nothing to observe here
        return;
    }

    let output = temp_dir.path().join("perm.zip");
    let result = parzip::archive_directory(&root, &output, &ArchiveOptions::default());
    fs::set_permissions(locked, fs::Permissions::from_mode(0o644)).unwrap();
    let summary = result.unwrap();

    assert_eq!(summary.entries.len(), 4);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].code, "EACCES");
    assert_eq!(summary.status(), RunStatus::PartialSuccess);
    assert_eq!(read_archive(&output).len(), 4);
}

#[test]
fn test_all_files_failing_reports_failure() {
    let temp_dir = TempDir::new().unwrap();
    let sources: Vec<_> = (0..3)
        .map(|i| {
            let name = format!("ghost{i}");
            Ok(SourceFile::new(temp_dir.path().join(&name), name))
        })
        .collect();

    let writer = SerializedArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::default());
    let run = parzip::archive_sources(sources, &writer, &ArchiveOptions::default()).unwrap();

    assert!(run.entries.is_empty());
    assert_eq!(run.errors.len(), 3);
    assert_eq!(run.status(), RunStatus::Failure);
    assert_eq!(writer.finalize().unwrap().1, 0);
}

#[test]
fn test_traversal_error_midway_keeps_launched_tasks() {
    let temp_dir = TempDir::new().unwrap();
    let files = five_files(temp_dir.path());

    let mut sources: Vec<Result<SourceFile, WalkError>> =
        files[..3].iter().cloned().map(Ok).collect();
    sources.push(Err(WalkError {
        path: temp_dir.path().join("vanished"),
        source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    }));
    sources.extend(files[3..].iter().cloned().map(Ok));

    let writer = SerializedArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::default());
    let run = parzip::archive_sources(sources, &writer, &ArchiveOptions::default()).unwrap();

    assert_eq!(run.files_seen, 3, "enumeration stops at the first traversal error");
    assert_eq!(run.entries.len(), 3);
    let err = run.traversal_error.expect("traversal error surfaced");
    assert!(err.path.ends_with("vanished"));

    let (sink, count) = writer.finalize().unwrap();
    assert_eq!(count, 3);
    let archive = zip::ZipArchive::new(Cursor::new(sink.into_inner())).unwrap();
    assert_eq!(archive.len(), 3);
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_is_fatal_but_archive_is_valid() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("walk");
    write_file_sync(root.join("ok.txt"), b"ok").unwrap();
    write_file_sync(root.join("locked/inner.txt"), b"inner").unwrap();
    let locked = root.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let output = temp_dir.path().join("walk.zip");
    let result = parzip::archive_directory(&root, &output, &ArchiveOptions::default());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    match result {
        Err(parzip::Error::Traversal { path, partial, .. }) => {
            assert!(path.ends_with("locked"));
            // The archive is sealed and readable with whatever was added first
            let entries = read_archive(&output);
            assert_eq!(entries.len(), partial.entries.len());
        }
        other => panic!("expected traversal error, got {other:?}"),
    }
}
