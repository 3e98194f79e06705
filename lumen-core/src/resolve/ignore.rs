use std::sync::Arc;

use lumen_model::{FileSystemEntry, LibraryItem};

use crate::config::ScanSettings;
use crate::resolve::{is_audio_file, is_video_file};

/// A single traversal-skip predicate.
///
/// Rules must be side-effect-free and cheap; every entry is checked against
/// every rule once per traversal level.
pub trait IgnoreRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn should_ignore(
        &self,
        entry: &FileSystemEntry,
        parent: Option<&LibraryItem>,
    ) -> bool;
}

/// Dot-files and dot-directories.
#[derive(Debug, Default)]
pub struct HiddenEntryRule;

impl IgnoreRule for HiddenEntryRule {
    fn name(&self) -> &'static str {
        "hidden-entry"
    }

    fn should_ignore(
        &self,
        entry: &FileSystemEntry,
        _parent: Option<&LibraryItem>,
    ) -> bool {
        entry.name.starts_with('.')
    }
}

/// Well-known junk directories dropped by every NAS/OS combination.
#[derive(Debug, Default)]
pub struct SystemDirectoryRule;

const SYSTEM_DIRECTORY_NAMES: &[&str] = &[
    "#recycle",
    "@eaDir",
    "lost+found",
    "$RECYCLE.BIN",
    "System Volume Information",
    "extrafanart",
    "metadata",
];

impl IgnoreRule for SystemDirectoryRule {
    fn name(&self) -> &'static str {
        "system-directory"
    }

    fn should_ignore(
        &self,
        entry: &FileSystemEntry,
        _parent: Option<&LibraryItem>,
    ) -> bool {
        entry.is_directory
            && SYSTEM_DIRECTORY_NAMES
                .iter()
                .any(|name| entry.name.eq_ignore_ascii_case(name))
    }
}

/// In-flight downloads and editor temp files.
#[derive(Debug, Default)]
pub struct TempFileRule;

const TEMP_EXTENSIONS: &[&str] = &["part", "tmp", "!qb", "crdownload"];

impl IgnoreRule for TempFileRule {
    fn name(&self) -> &'static str {
        "temp-file"
    }

    fn should_ignore(
        &self,
        entry: &FileSystemEntry,
        _parent: Option<&LibraryItem>,
    ) -> bool {
        if entry.is_directory {
            return false;
        }
        entry
            .extension()
            .is_some_and(|ext| TEMP_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Zero-length media files are placeholders, not content.
#[derive(Debug, Default)]
pub struct EmptyMediaFileRule;

impl IgnoreRule for EmptyMediaFileRule {
    fn name(&self) -> &'static str {
        "empty-media-file"
    }

    fn should_ignore(
        &self,
        entry: &FileSystemEntry,
        _parent: Option<&LibraryItem>,
    ) -> bool {
        !entry.is_directory
            && entry.size == 0
            && (is_video_file(entry) || is_audio_file(entry))
    }
}

/// Operator-supplied name substrings from scan settings.
#[derive(Debug)]
pub struct NamePatternRule {
    patterns: Vec<String>,
}

impl NamePatternRule {
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }
}

impl IgnoreRule for NamePatternRule {
    fn name(&self) -> &'static str {
        "name-pattern"
    }

    fn should_ignore(
        &self,
        entry: &FileSystemEntry,
        _parent: Option<&LibraryItem>,
    ) -> bool {
        let name = entry.name.to_lowercase();
        self.patterns.iter().any(|p| name.contains(p.as_str()))
    }
}

/// Ordered rule set; an entry is ignored if any rule matches.
#[derive(Clone)]
pub struct IgnoreRuleSet {
    rules: Vec<Arc<dyn IgnoreRule>>,
}

impl std::fmt::Debug for IgnoreRuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.rules.iter().map(|r| r.name()).collect();
        f.debug_struct("IgnoreRuleSet").field("rules", &names).finish()
    }
}

impl IgnoreRuleSet {
    /// The stock server rule set.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Arc::new(HiddenEntryRule),
                Arc::new(SystemDirectoryRule),
                Arc::new(TempFileRule),
                Arc::new(EmptyMediaFileRule),
            ],
        }
    }

    /// Standard rules plus any operator-supplied name patterns.
    pub fn from_settings(settings: &ScanSettings) -> Self {
        let mut rules = Self::standard();
        if !settings.ignore_name_patterns.is_empty() {
            rules.register(Arc::new(NamePatternRule::new(
                settings.ignore_name_patterns.clone(),
            )));
        }
        rules
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn register(&mut self, rule: Arc<dyn IgnoreRule>) {
        self.rules.push(rule);
    }

    pub fn is_ignored(
        &self,
        entry: &FileSystemEntry,
        parent: Option<&LibraryItem>,
    ) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.should_ignore(entry, parent))
    }
}

impl Default for IgnoreRuleSet {
    fn default() -> Self {
        Self::standard()
    }
}
