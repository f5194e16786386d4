pub mod resize;
pub mod watcher;

use crate::error::Result;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// URL prefix the media directory is served under.
pub const MEDIA_ROUTE: &str = "gifs";

/// Everything except RFC 3986 unreserved characters gets escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Case-insensitive file extension predicate.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: HashSet<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
    }
}

/// An immutable, ordered set of media files.
///
/// A new set is built on every rescan; sets are never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSet {
    paths: Arc<[PathBuf]>,
}

impl MediaSet {
    /// Build a set from paths, sorted by file name. Returns `None` if empty.
    pub fn new(mut paths: Vec<PathBuf>) -> Option<Self> {
        if paths.is_empty() {
            return None;
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Some(Self {
            paths: paths.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn to_vec(&self) -> Vec<PathBuf> {
        self.paths.to_vec()
    }

    /// URL paths under `prefix`, e.g. `gifs/cat.gif`, one per file and in
    /// set order. File names are percent-encoded.
    pub fn relative_urls(&self, prefix: &str) -> Vec<String> {
        self.iter()
            .filter_map(|p| p.file_name().and_then(OsStr::to_str))
            .map(|name| format!("{prefix}/{}", utf8_percent_encode(name, PATH_SEGMENT)))
            .collect()
    }
}

/// Result of scanning the media directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Loaded(MediaSet),
    Empty,
}

impl ScanOutcome {
    pub fn media(&self) -> Option<&MediaSet> {
        match self {
            Self::Loaded(set) => Some(set),
            Self::Empty => None,
        }
    }
}

/// List the regular files directly inside `dir` that pass `filter`.
///
/// The directory is created if it doesn't exist yet.
///
/// # Errors
/// Returns `KioskError::Io` if the directory can't be created or read.
pub fn scan(dir: &Path, filter: &ExtensionFilter) -> Result<ScanOutcome> {
    std::fs::create_dir_all(dir)?;

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !filter.matches(&path) {
            continue;
        }
        // Names must round-trip through a URL.
        if entry.file_name().to_str().is_none() {
            warn!("skipping {}: file name is not UTF-8", path.display());
            continue;
        }
        // Follows symlinks, so a linked GIF still counts.
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => debug!("skipping {}: {e}", path.display()),
        }
    }

    debug!("scanned {}: {} media files", dir.display(), paths.len());
    Ok(MediaSet::new(paths).map_or(ScanOutcome::Empty, ScanOutcome::Loaded))
}
