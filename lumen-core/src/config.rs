use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity-affecting configuration.
///
/// Changing either flag changes every derived item id. That is a deliberately
/// accepted migration hazard: ids are a pure function of (normalized key,
/// kind) under a fixed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Fold keys to lower case before hashing. On by default so path case
    /// changes on case-insensitive filesystems do not re-key the library.
    pub case_insensitive_ids: bool,
    /// Also fold synthetic by-name keys.
    pub normalize_by_name_ids: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            case_insensitive_ids: true,
            normalize_by_name_ids: false,
        }
    }
}

/// Well-known server paths consulted by identity and by-name factories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPaths {
    /// Program-data root. Keys under it are stored relative with canonical
    /// separators so ids survive data-root relocation.
    pub program_data_path: PathBuf,
}

impl ServerPaths {
    pub fn new(program_data_path: impl Into<PathBuf>) -> Self {
        Self {
            program_data_path: program_data_path.into(),
        }
    }

    /// Synthetic root for a by-name aggregate kind, e.g. `<data>/artists`.
    pub fn by_name_path(&self, bucket: &str, name: &str) -> PathBuf {
        self.program_data_path.join(bucket).join(name)
    }
}

/// Top-level scan behaviour knobs that are not per-library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    pub identity: IdentityConfig,
    /// Extra ignore patterns appended to the stock rule set.
    pub ignore_name_patterns: Vec<String>,
}
