//! Test fixtures for deterministic testing

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Write a file, creating parent directories as needed
pub fn write_file_sync(path: impl AsRef<Path>, contents: &[u8]) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Deterministic content for file `seed`
pub fn patterned_bytes(seed: usize, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 31 + seed * 17) % 251) as u8)
        .collect()
}

/// `images/` with `a.png` (10 KB), `b.png` (empty) and an empty `sub/` directory
pub fn create_image_fixture(base: &Path) -> std::io::Result<PathBuf> {
    let dir = base.join("images");
    fs::create_dir_all(dir.join("sub"))?;
    write_file_sync(dir.join("a.png"), &patterned_bytes(1, 10 * 1024))?;
    write_file_sync(dir.join("b.png"), b"")?;
    Ok(dir)
}

/// Read every entry of a ZIP archive into memory, keyed by entry name
pub fn read_archive(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let file = fs::File::open(path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("valid zip archive");
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).expect("archive entry");
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("entry contents");
        let name = entry.name().to_string();
        assert!(entries.insert(name.clone(), data).is_none(), "duplicate entry {name}");
    }
    entries
}
