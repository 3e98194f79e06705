use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lumen_model::FileSystemEntry;
use tracing::debug;

use crate::error::Result;

/// Extension marking a portable shortcut file: the file content is the
/// absolute target path.
pub const SHORTCUT_EXTENSION: &str = "mblink";

pub fn is_shortcut(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(SHORTCUT_EXTENSION))
}

/// Filesystem boundary consumed by the resolution engine and validators.
///
/// Kept as a port so traversal logic is testable against fixture trees and
/// so network-mount quirks stay behind one seam.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Enumerate the direct children of a directory.
    async fn list_entries(&self, path: &Path) -> Result<Vec<FileSystemEntry>>;

    /// Metadata for a single path; `None` when it does not exist.
    async fn entry(&self, path: &Path) -> Result<Option<FileSystemEntry>>;

    /// Resolve a shortcut file to its target path, or `None` when the path
    /// is not a shortcut.
    async fn read_shortcut(&self, path: &Path) -> Result<Option<PathBuf>>;

    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    async fn remove_file(&self, path: &Path) -> Result<()>;

    async fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// Production implementation over `tokio::fs`.
#[derive(Debug, Default, Clone)]
pub struct StdFileSystem;

impl StdFileSystem {
    pub fn new() -> Self {
        Self
    }

    fn to_entry(path: PathBuf, metadata: &std::fs::Metadata) -> FileSystemEntry {
        let mut entry = FileSystemEntry::new(path, metadata.is_dir());
        entry.size = metadata.len();
        entry.created = metadata
            .created()
            .ok()
            .map(DateTime::<Utc>::from);
        entry.modified = metadata
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);
        entry
    }
}

#[async_trait]
impl FileSystem for StdFileSystem {
    async fn list_entries(&self, path: &Path) -> Result<Vec<FileSystemEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(dirent) = dir.next_entry().await? {
            match dirent.metadata().await {
                Ok(metadata) => {
                    entries.push(Self::to_entry(dirent.path(), &metadata));
                }
                Err(err) => {
                    // A file disappearing mid-enumeration is not worth
                    // failing the directory over.
                    debug!(
                        path = %dirent.path().display(),
                        error = %err,
                        "skipping entry with unreadable metadata"
                    );
                }
            }
        }
        Ok(entries)
    }

    async fn entry(&self, path: &Path) -> Result<Option<FileSystemEntry>> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(Some(Self::to_entry(path.to_path_buf(), &metadata))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_shortcut(&self, path: &Path) -> Result<Option<PathBuf>> {
        if !is_shortcut(path) {
            return Ok(None);
        }
        let target = tokio::fs::read_to_string(path).await?;
        let target = target.trim();
        if target.is_empty() {
            return Ok(None);
        }
        Ok(Some(PathBuf::from(target)))
    }

    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        Ok(tokio::fs::remove_file(path).await?)
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        Ok(tokio::fs::remove_dir_all(path).await?)
    }
}
