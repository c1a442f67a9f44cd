//! Integration test for fatal error handling

use crate::fixtures::write_file_sync;
use parzip::ArchiveOptions;
use tempfile::TempDir;

#[test]
fn test_invalid_path_error() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("never.zip");
    let opts = ArchiveOptions::default();
    let result = parzip::archive_directory("/definitely/does/not/exist/xyz123", &output, &opts);

    assert!(matches!(result, Err(parzip::Error::InvalidInput(_))));
    if let Err(e) = result {
        assert!(e.to_string().contains("does not exist"));
    }
    assert!(!output.exists(), "no archive is created for an invalid root");
}

#[test]
fn test_file_instead_of_directory() {
    use tempfile::NamedTempFile;

    let temp_file = NamedTempFile::new().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let opts = ArchiveOptions::default();
    let result = parzip::archive_directory(temp_file.path(), temp_dir.path().join("x.zip"), &opts);

    assert!(result.is_err());
    if let Err(e) = result {
        let error_msg = e.to_string();
        assert!(error_msg.contains("not a directory") || error_msg.contains("Invalid input"));
    }
}

#[test]
fn test_uncreatable_output_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    write_file_sync(root.join("a.txt"), b"a").unwrap();
    let output = temp_dir.path().join("missing-dir").join("out.zip");

    let result = parzip::archive_directory(&root, &output, &ArchiveOptions::default());

    assert!(matches!(result, Err(parzip::Error::Io(_))));
    assert!(!output.exists());
}

#[test]
fn test_output_path_is_a_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    write_file_sync(root.join("a.txt"), b"a").unwrap();

    let result = parzip::archive_directory(&root, temp_dir.path(), &ArchiveOptions::default());
    assert!(matches!(result, Err(parzip::Error::Io(_))));
}
