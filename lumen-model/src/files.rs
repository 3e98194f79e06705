use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ephemeral mirror of one on-disk file or directory.
///
/// Produced by directory enumeration and consumed once per resolution pass;
/// never persisted or shared across traversals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSystemEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl FileSystemEntry {
    pub fn new(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            path,
            is_directory,
            size: 0,
            created: None,
            modified: None,
        }
    }

    /// Lower-cased extension, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// File name without the final extension. Directories keep their full
    /// name.
    pub fn stem(&self) -> &str {
        if self.is_directory {
            return &self.name;
        }
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}
