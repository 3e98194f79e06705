//! Pluggable item resolution: ignore rules, the resolver chain, and the
//! type-specific resolvers that turn filesystem entries into typed items.

pub mod audio;
pub mod engine;
pub mod folder;
pub mod ignore;
pub mod movies;
pub mod tv;

use std::sync::Arc;

use lumen_model::{
    CollectionKind, FileSystemEntry, LibraryItem, LibraryOptions,
};
use tracing::warn;

use crate::error::Result;

pub use engine::PathResolver;
pub use ignore::{IgnoreRule, IgnoreRuleSet};

/// Video container extensions the resolvers recognize.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "mpg", "mpeg",
    "ts", "mts", "m2ts", "ogv",
];

/// Audio container extensions the resolvers recognize.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "opus", "m4a", "aac", "wav", "wma", "ape", "alac",
];

pub fn is_video_file(entry: &FileSystemEntry) -> bool {
    !entry.is_directory
        && entry
            .extension()
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_audio_file(entry: &FileSystemEntry) -> bool {
    !entry.is_directory
        && entry
            .extension()
            .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Per-candidate resolution bundle, scoped to one resolver-chain invocation.
#[derive(Debug)]
pub struct ResolveContext<'a> {
    pub entry: &'a FileSystemEntry,
    pub parent: Option<&'a LibraryItem>,
    /// Enumerated contents when the candidate is a directory; empty for
    /// files.
    pub children: &'a [FileSystemEntry],
    pub collection_kind: Option<CollectionKind>,
    pub options: &'a LibraryOptions,
}

impl ResolveContext<'_> {
    pub fn is_directory(&self) -> bool {
        self.entry.is_directory
    }

    /// True when the candidate sits directly under a top-level library
    /// folder.
    pub fn is_under_collection_folder(&self) -> bool {
        self.parent
            .is_some_and(|p| p.kind == lumen_model::ItemKind::CollectionFolder)
    }
}

/// A type-specific resolver: examines one candidate and either declines or
/// produces a typed item.
///
/// Implementations carry a static descriptor so logging never needs runtime
/// type names.
pub trait ItemResolver: Send + Sync {
    fn descriptor(&self) -> &'static str;

    fn try_resolve(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<LibraryItem>>;
}

/// Result of a multi-item resolver claiming a subset of a file list.
#[derive(Debug, Default)]
pub struct MultiItemResolution {
    pub items: Vec<LibraryItem>,
    /// Files the resolver examined but did not claim; they go through the
    /// normal per-file pipeline afterwards.
    pub extras: Vec<FileSystemEntry>,
}

/// A resolver offered the whole sibling list of a directory at once, e.g. to
/// fold stacked movie parts into a single item.
pub trait MultiItemResolver: Send + Sync {
    fn descriptor(&self) -> &'static str;

    fn try_resolve_many(
        &self,
        files: &[FileSystemEntry],
        parent: Option<&LibraryItem>,
        collection_kind: Option<CollectionKind>,
        options: &LibraryOptions,
    ) -> Result<Option<MultiItemResolution>>;
}

/// Ordered resolver registry. Registration order is invocation order; there
/// is no priority field.
#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ItemResolver>>,
    multi_resolvers: Vec<Arc<dyn MultiItemResolver>>,
}

impl std::fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let single: Vec<&str> =
            self.resolvers.iter().map(|r| r.descriptor()).collect();
        let multi: Vec<&str> =
            self.multi_resolvers.iter().map(|r| r.descriptor()).collect();
        f.debug_struct("ResolverChain")
            .field("resolvers", &single)
            .field("multi_resolvers", &multi)
            .finish()
    }
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock chain a server ships with. Order matters: specific
    /// resolvers come before the generic folder fallback.
    pub fn standard() -> Self {
        let mut chain = Self::new();
        chain.register(Arc::new(tv::SeriesResolver));
        chain.register(Arc::new(tv::SeasonResolver));
        chain.register(Arc::new(tv::EpisodeResolver));
        chain.register(Arc::new(audio::MusicArtistResolver));
        chain.register(Arc::new(audio::MusicAlbumResolver));
        chain.register(Arc::new(audio::AudioTrackResolver));
        chain.register(Arc::new(movies::MovieResolver));
        chain.register(Arc::new(folder::FolderResolver));
        chain.register_multi(Arc::new(movies::StackedMovieResolver));
        chain
    }

    pub fn register(&mut self, resolver: Arc<dyn ItemResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn register_multi(&mut self, resolver: Arc<dyn MultiItemResolver>) {
        self.multi_resolvers.push(resolver);
    }

    /// Try each resolver in registration order until one answers.
    ///
    /// A resolver returning an error is logged and treated as "no match";
    /// one broken plugin must not abort the scan.
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Option<LibraryItem> {
        for resolver in &self.resolvers {
            match resolver.try_resolve(ctx) {
                Ok(Some(item)) => return Some(item),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        resolver = resolver.descriptor(),
                        path = %ctx.entry.path.display(),
                        error = %err,
                        "resolver failed; continuing with next"
                    );
                }
            }
        }
        None
    }

    /// Offer the full file list to each multi-item resolver in order; the
    /// first non-empty claim wins.
    pub fn resolve_many(
        &self,
        files: &[FileSystemEntry],
        parent: Option<&LibraryItem>,
        collection_kind: Option<CollectionKind>,
        options: &LibraryOptions,
    ) -> Option<MultiItemResolution> {
        for resolver in &self.multi_resolvers {
            match resolver.try_resolve_many(files, parent, collection_kind, options)
            {
                Ok(Some(resolution)) if !resolution.items.is_empty() => {
                    return Some(resolution);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        resolver = resolver.descriptor(),
                        error = %err,
                        "multi-item resolver failed; continuing with next"
                    );
                }
            }
        }
        None
    }
}
