//! Directory walker yielding the regular files to archive.
//!
//! The walker is an iterator so the driver can launch ingest tasks while the
//! tree is still being enumerated. Directories are descended, regular files are
//! yielded, everything else (sockets, fifos, devices) is skipped. Symlinks are
//! skipped unless `follow_symlinks` is set.
//!
//! The first error while reading a directory ends the walk: the iterator yields
//! a `WalkError` and then stops.

use crate::EntryNaming;
use crate::models::SourceFile;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Error raised when a directory under the root cannot be traversed
#[derive(Debug)]
pub struct WalkError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl std::fmt::Display for WalkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot traverse {}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for WalkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Recursive, depth-first listing of regular files under a root directory
pub struct FileWalker {
    root: PathBuf,
    naming: EntryNaming,
    follow_symlinks: bool,
    excluded: HashSet<PathBuf>,
    visited_dirs: HashSet<PathBuf>,
    pending_dirs: Vec<PathBuf>,
    current: Option<(PathBuf, fs::ReadDir)>,
    finished: bool,
}

impl FileWalker {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, naming: EntryNaming) -> Self {
        let root = root.into();
        Self {
            pending_dirs: vec![root.clone()],
            root,
            naming,
            follow_symlinks: false,
            excluded: HashSet::new(),
            visited_dirs: HashSet::new(),
            current: None,
            finished: false,
        }
    }

    /// Descend into symlinked directories and archive symlinked files.
    #[must_use]
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Never yield the given path (used to keep the output archive out of itself).
    #[must_use]
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.insert(path.into());
        self
    }

    fn fail(
        &mut self,
        path: PathBuf,
        source: std::io::Error,
    ) -> Option<Result<SourceFile, WalkError>> {
        self.finished = true;
        self.current = None;
        self.pending_dirs.clear();
        Some(Err(WalkError { path, source }))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded.contains(path) {
            return true;
        }
        // Through a followed symlink the same file shows up under another path
        self.follow_symlinks
            && fs::canonicalize(path).is_ok_and(|real| self.excluded.contains(&real))
    }

    fn open_next_dir(&mut self) -> Option<Result<(), WalkError>> {
        let dir = self.pending_dirs.pop()?;

        if self.follow_symlinks {
            // Symlinked directories can form cycles; only enter each real directory once
            let canonical = fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !self.visited_dirs.insert(canonical) {
                log::debug!("Skipping already visited directory: {}", dir.display());
                return Some(Ok(()));
            }
        }

        match fs::read_dir(&dir) {
            Ok(entries) => {
                log::trace!("Entering directory: {}", dir.display());
                self.current = Some((dir, entries));
                Some(Ok(()))
            }
            Err(source) => Some(Err(WalkError { path: dir, source })),
        }
    }

    fn classify(&mut self, entry: &fs::DirEntry) -> Result<Option<SourceFile>, std::io::Error> {
        let path = entry.path();
        let mut file_type = entry.file_type()?;

        if file_type.is_symlink() {
            if !self.follow_symlinks {
                log::debug!("Skipping symlink: {}", path.display());
                return Ok(None);
            }
            match fs::metadata(&path) {
                Ok(target) => file_type = target.file_type(),
                Err(err) => {
                    log::debug!("Skipping dangling symlink {}: {err}", path.display());
                    return Ok(None);
                }
            }
        }

        if file_type.is_dir() {
            self.pending_dirs.push(path);
            return Ok(None);
        }

        if !file_type.is_file() {
            log::debug!("Skipping non-regular file: {}", path.display());
            return Ok(None);
        }

        if self.is_excluded(&path) {
            log::debug!("Skipping excluded path: {}", path.display());
            return Ok(None);
        }

        let entry_name = self.naming.entry_name(&self.root, &path);
        Ok(Some(SourceFile { path, entry_name }))
    }
}

impl Iterator for FileWalker {
    type Item = Result<SourceFile, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            let Some((dir, entries)) = self.current.as_mut() else {
                match self.open_next_dir() {
                    None => {
                        self.finished = true;
                        return None;
                    }
                    Some(Ok(())) => continue,
                    Some(Err(err)) => return self.fail(err.path, err.source),
                }
            };

            let entry = match entries.next() {
                None => {
                    self.current = None;
                    continue;
                }
                Some(Err(err)) => {
                    let dir = dir.clone();
                    return self.fail(dir, err);
                }
                Some(Ok(entry)) => entry,
            };

            match self.classify(&entry) {
                Ok(Some(source)) => return Some(Ok(source)),
                Ok(None) => {}
                Err(err) => return self.fail(entry.path(), err),
            }
        }
    }
}

impl EntryNaming {
    /// Derive the archive entry name for `path`, a file below `root`.
    #[must_use]
    pub fn entry_name(&self, root: &Path, path: &Path) -> String {
        match self {
            EntryNaming::BaseName => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            EntryNaming::RelativePath => {
                let relative = path.strip_prefix(root).unwrap_or(path);
                relative
                    .components()
                    .filter_map(|component| match component {
                        Component::Normal(part) => Some(part.to_string_lossy()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("/")
            }
        }
    }
}
