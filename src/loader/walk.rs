use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LoaderError;

/// How a directory entry takes part in loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Name starts with `.` or `_`; never loaded or descended into.
    Ignored,
    Directory,
    RouteFile,
}

/// Classify an entry by name and type.
#[must_use]
pub fn classify(name: &str, is_dir: bool) -> EntryKind {
    if name.starts_with('.') || name.starts_with('_') {
        EntryKind::Ignored
    } else if is_dir {
        EntryKind::Directory
    } else {
        EntryKind::RouteFile
    }
}

/// Non-ignored entries of one directory, each group sorted by file name.
#[derive(Debug, Default)]
pub struct Listing {
    pub directories: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// List and classify the entries of `dir`.
///
/// Entry types follow symlinks, so a link to a directory is descended into.
///
/// # Errors
///
/// [`LoaderError::ReadDir`] when `dir` cannot be listed and
/// [`LoaderError::Stat`] when an entry cannot be inspected.
pub fn list(dir: &Path) -> Result<Listing, LoaderError> {
    let read_dir = |source| LoaderError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir)? {
        let entry = entry.map_err(read_dir)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut listing = Listing::default();
    for (name, path) in entries {
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        let meta = fs::metadata(&path).map_err(|source| LoaderError::Stat {
            path: path.clone(),
            source,
        })?;
        match classify(&name, meta.is_dir()) {
            EntryKind::Ignored => {}
            EntryKind::Directory => listing.directories.push(path),
            EntryKind::RouteFile => listing.files.push(path),
        }
    }
    Ok(listing)
}
