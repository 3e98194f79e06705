use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use lumen_model::{
    CollectionKind, FileSystemEntry, LibraryItem, LibraryOptions,
};
use tracing::{debug, warn};

use crate::error::Result;
use crate::fs::{is_shortcut, FileSystem};
use crate::identity::IdGenerator;
use crate::resolve::{IgnoreRuleSet, ResolveContext, ResolverChain};

/// Marker in a path that locks the item (and, by inheritance, its subtree)
/// against metadata fetching.
const LOCK_MARKER: &str = "[dontfetchmeta]";

/// File name that vetoes resolution of an entire directory subtree.
const IGNORE_FILE_NAME: &str = ".ignore";

/// Orchestrates directory enumeration, ignore rules, shortcut flattening,
/// and the resolver chain, then applies the uniform finalization rules
/// (identity, parent linkage, lock and date defaulting) to whatever the
/// chain produced.
///
/// The physical root is the call with no parent item: only there do
/// two-level flattening, shortcut resolution, and duplicate-mount collapsing
/// apply, and only there does an enumeration failure degrade to an empty
/// child list instead of failing the scan.
pub struct PathResolver {
    fs: Arc<dyn FileSystem>,
    chain: Arc<ResolverChain>,
    ignore_rules: Arc<IgnoreRuleSet>,
    identity: Arc<IdGenerator>,
    /// Collection-kind overrides keyed by path prefix; consulted only when a
    /// parent item is present.
    content_types: HashMap<PathBuf, CollectionKind>,
}

impl std::fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver")
            .field("chain", &self.chain)
            .field("ignore_rules", &self.ignore_rules)
            .field("content_types", &self.content_types)
            .finish()
    }
}

impl PathResolver {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        chain: Arc<ResolverChain>,
        ignore_rules: Arc<IgnoreRuleSet>,
        identity: Arc<IdGenerator>,
    ) -> Self {
        Self {
            fs,
            chain,
            ignore_rules,
            identity,
            content_types: HashMap::new(),
        }
    }

    pub fn set_content_type(
        &mut self,
        path: impl Into<PathBuf>,
        kind: CollectionKind,
    ) {
        self.content_types.insert(path.into(), kind);
    }

    /// Resolve a single filesystem entry into a typed item.
    pub async fn resolve_path(
        &self,
        entry: &FileSystemEntry,
        parent: Option<&LibraryItem>,
        options: &LibraryOptions,
    ) -> Result<Option<LibraryItem>> {
        let collection_kind = self.effective_collection_kind(entry, parent, options);

        if self.ignore_rules.is_ignored(entry, parent) {
            return Ok(None);
        }

        let children = if entry.is_directory {
            if parent.is_none() {
                match self.enumerate_root(&entry.path).await {
                    Ok(children) => children,
                    Err(err) => {
                        warn!(
                            path = %entry.path.display(),
                            error = %err,
                            "root enumeration failed; continuing with empty child list"
                        );
                        Vec::new()
                    }
                }
            } else {
                self.fs.list_entries(&entry.path).await?
            }
        } else {
            Vec::new()
        };

        // Manual opt-out: a literal `.ignore` file vetoes the whole subtree.
        // Checked after enumeration (children resolvers may need sibling
        // data) but before the chain runs.
        if has_ignore_veto(&children) {
            debug!(path = %entry.path.display(), "directory vetoed by .ignore file");
            return Ok(None);
        }

        let ctx = ResolveContext {
            entry,
            parent,
            children: &children,
            collection_kind,
            options,
        };

        match self.chain.resolve(&ctx) {
            Some(item) => {
                let item = self.finalize(item, Some(entry), parent, options).await?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Batch variant: ignored files are filtered first, then each registered
    /// multi-item resolver sees the whole remaining set before anything
    /// falls back to per-file resolution.
    pub async fn resolve_paths(
        &self,
        files: Vec<FileSystemEntry>,
        parent: Option<&LibraryItem>,
        options: &LibraryOptions,
    ) -> Result<Vec<LibraryItem>> {
        let remaining: Vec<FileSystemEntry> = files
            .into_iter()
            .filter(|f| !self.ignore_rules.is_ignored(f, parent))
            .collect();

        let collection_kind = parent
            .and_then(|p| {
                remaining
                    .first()
                    .and_then(|f| self.effective_collection_kind(f, Some(p), options))
            })
            .or(options.collection_kind);

        let mut resolved = Vec::new();
        let leftover = match self.chain.resolve_many(
            &remaining,
            parent,
            collection_kind,
            options,
        ) {
            Some(resolution) => {
                for item in resolution.items {
                    resolved.push(
                        self.finalize(item, None, parent, options).await?,
                    );
                }
                resolution.extras
            }
            None => remaining,
        };

        for entry in &leftover {
            if let Some(item) =
                self.resolve_path(entry, parent, options).await?
            {
                resolved.push(item);
            }
        }
        Ok(resolved)
    }

    /// Enumerate and resolve the children of an already-resolved folder
    /// item. Returns an empty list when the folder carries an `.ignore`
    /// veto.
    pub async fn resolve_children(
        &self,
        parent: &LibraryItem,
        options: &LibraryOptions,
    ) -> Result<Vec<LibraryItem>> {
        let Some(path) = parent.path.as_deref() else {
            return Ok(Vec::new());
        };
        let entries = self.fs.list_entries(path).await?;
        if has_ignore_veto(&entries) {
            debug!(path = %path.display(), "child enumeration vetoed by .ignore file");
            return Ok(Vec::new());
        }
        self.resolve_paths(entries, Some(parent), options).await
    }

    /// Collapse duplicate and nested root directory paths (case-insensitive),
    /// leaving non-directory entries untouched. Every collapsed duplicate is
    /// logged.
    pub fn normalize_root_path_list(
        &self,
        entries: Vec<FileSystemEntry>,
    ) -> Vec<FileSystemEntry> {
        let mut seen: Vec<String> = Vec::new();
        let mut distinct = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.is_directory {
                distinct.push(entry);
                continue;
            }
            let key = normalized_path_key(&entry.path);
            if seen.iter().any(|s| *s == key) {
                warn!(path = %entry.path.display(), "dropping duplicate root path");
                continue;
            }
            seen.push(key);
            distinct.push(entry);
        }
        collapse_contained_directories(distinct)
    }

    fn effective_collection_kind(
        &self,
        entry: &FileSystemEntry,
        parent: Option<&LibraryItem>,
        options: &LibraryOptions,
    ) -> Option<CollectionKind> {
        if let Some(kind) = options.collection_kind {
            return Some(kind);
        }
        // Content-type overrides only apply below the root.
        parent?;
        self.content_types
            .iter()
            .filter(|(prefix, _)| entry.path.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.as_os_str().len())
            .map(|(_, kind)| *kind)
    }

    /// Root enumeration: one pass that sees through the
    /// root -> library -> grandchildren structure, resolves shortcut files,
    /// and collapses duplicate mounts.
    async fn enumerate_root(&self, path: &Path) -> Result<Vec<FileSystemEntry>> {
        let top = self.fs.list_entries(path).await?;
        let top = self.resolve_shortcuts(top).await;

        let mut flattened = Vec::with_capacity(top.len());
        for entry in top {
            if entry.is_directory {
                let children = self.fs.list_entries(&entry.path).await?;
                let children = self.resolve_shortcuts(children).await;
                flattened.push(entry);
                flattened.extend(children);
            } else {
                flattened.push(entry);
            }
        }
        Ok(collapse_contained_directories(flattened))
    }

    /// Replace shortcut files by the entries of their targets; broken
    /// shortcuts are logged and dropped.
    async fn resolve_shortcuts(
        &self,
        entries: Vec<FileSystemEntry>,
    ) -> Vec<FileSystemEntry> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.is_directory || !is_shortcut(&entry.path) {
                out.push(entry);
                continue;
            }
            match self.fs.read_shortcut(&entry.path).await {
                Ok(Some(target)) => match self.fs.entry(&target).await {
                    Ok(Some(resolved)) => out.push(resolved),
                    Ok(None) => {
                        warn!(
                            shortcut = %entry.path.display(),
                            target = %target.display(),
                            "shortcut target does not exist; dropping"
                        );
                    }
                    Err(err) => {
                        warn!(
                            shortcut = %entry.path.display(),
                            error = %err,
                            "failed to stat shortcut target; dropping"
                        );
                    }
                },
                Ok(None) => out.push(entry),
                Err(err) => {
                    warn!(
                        shortcut = %entry.path.display(),
                        error = %err,
                        "failed to read shortcut; dropping"
                    );
                }
            }
        }
        out
    }

    /// Uniform post-resolution bookkeeping: path default, parent linkage,
    /// identity assignment, name/lock/date defaulting.
    async fn finalize(
        &self,
        mut item: LibraryItem,
        candidate: Option<&FileSystemEntry>,
        parent: Option<&LibraryItem>,
        options: &LibraryOptions,
    ) -> Result<LibraryItem> {
        if item.path.is_none() {
            if let Some(candidate) = candidate {
                item.path = Some(candidate.path.clone());
            }
        }

        if let Some(parent) = parent {
            item.parent_id = Some(parent.id);
        }

        let path_key = item
            .path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| item.name.clone());
        item.id = self.identity.generate(&path_key, item.kind)?;

        if item.name.is_empty() {
            if let Some(path) = item.path.as_deref() {
                item.name = default_name_for_path(path, item.kind.is_folder());
            }
        }

        item.is_locked = path_key.to_lowercase().contains(LOCK_MARKER)
            || parent.is_some_and(|p| p.is_locked);

        // Date stamping must reflect the resolved path, which may differ
        // from the originally scanned candidate (stacks, shortcuts).
        let dates = match (candidate, item.path.as_deref()) {
            (Some(candidate), Some(path)) if candidate.path == path => {
                Some((candidate.created, candidate.modified))
            }
            (_, Some(path)) => match self.fs.entry(path).await {
                Ok(Some(entry)) => Some((entry.created, entry.modified)),
                Ok(None) => None,
                Err(err) => {
                    debug!(
                        path = %path.display(),
                        error = %err,
                        "could not stat resolved path for date stamping"
                    );
                    None
                }
            },
            _ => None,
        };

        let now = Utc::now();
        item.date_created = if options.use_file_creation_time_for_date_added {
            dates
                .and_then(|(created, _)| created)
                .filter(|ts| ts.timestamp() > 0)
                .unwrap_or(now)
        } else {
            now
        };
        item.date_modified = dates.and_then(|(_, modified)| modified).unwrap_or(now);

        Ok(item)
    }
}

fn has_ignore_veto(children: &[FileSystemEntry]) -> bool {
    children
        .iter()
        .any(|c| !c.is_directory && c.name == IGNORE_FILE_NAME)
}

fn default_name_for_path(path: &Path, is_folder: bool) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if is_folder {
        return file_name;
    }
    Path::new(&file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(file_name)
}

fn normalized_path_key(path: &Path) -> String {
    let mut key = path.to_string_lossy().replace('\\', "/").to_lowercase();
    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }
    key
}

/// Drive-style roots are never treated as containers of other roots.
fn is_drive_root(path: &Path) -> bool {
    let raw = path.to_string_lossy();
    raw == "/"
        || (raw.len() <= 3
            && raw.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && raw[1..].starts_with(':'))
}

/// Drop directory entries whose path is contained in a sibling directory,
/// keeping the shortest containing path. Non-directory entries pass through
/// untouched; each dropped duplicate is logged.
pub(crate) fn collapse_contained_directories(
    entries: Vec<FileSystemEntry>,
) -> Vec<FileSystemEntry> {
    let dir_keys: Vec<String> = entries
        .iter()
        .filter(|e| e.is_directory && !is_drive_root(&e.path))
        .map(|e| normalized_path_key(&e.path))
        .collect();

    entries
        .into_iter()
        .filter(|entry| {
            if !entry.is_directory {
                return true;
            }
            let key = normalized_path_key(&entry.path);
            let contained = dir_keys.iter().any(|other| {
                key.len() > other.len()
                    && key.starts_with(other.as_str())
                    && key.as_bytes()[other.len()] == b'/'
            });
            if contained {
                warn!(
                    path = %entry.path.display(),
                    "dropping duplicate path contained in a sibling root"
                );
            }
            !contained
        })
        .collect()
}
