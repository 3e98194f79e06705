use std::collections::BTreeMap;

use lumen_model::{
    CollectionKind, FileSystemEntry, ItemKind, LibraryItem, LibraryOptions,
};
use tracing::debug;

use crate::error::Result;
use crate::naming;
use crate::resolve::{
    is_video_file, ItemResolver, MultiItemResolution, MultiItemResolver,
    ResolveContext,
};

/// Resolves standalone video files into movies.
///
/// Declines inside TV contexts; the episode resolver runs earlier in the
/// chain and owns those.
#[derive(Debug, Default)]
pub struct MovieResolver;

impl ItemResolver for MovieResolver {
    fn descriptor(&self) -> &'static str {
        "movie"
    }

    fn try_resolve(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<LibraryItem>> {
        if ctx.is_directory() || !is_video_file(ctx.entry) {
            return Ok(None);
        }
        match ctx.collection_kind {
            Some(CollectionKind::Movies) | Some(CollectionKind::Mixed) | None => {}
            _ => return Ok(None),
        }
        if ctx
            .parent
            .is_some_and(|p| matches!(p.kind, ItemKind::Series | ItemKind::Season))
        {
            return Ok(None);
        }

        Ok(Some(
            LibraryItem::new(ItemKind::Movie, ctx.entry.stem())
                .with_path(ctx.entry.path.clone()),
        ))
    }
}

/// Folds stacked multi-part files (`part1`/`cd1`/`disc1` suffixes) into a
/// single movie per stack. Unstacked files are left for per-file resolution.
#[derive(Debug, Default)]
pub struct StackedMovieResolver;

impl MultiItemResolver for StackedMovieResolver {
    fn descriptor(&self) -> &'static str {
        "stacked-movie"
    }

    fn try_resolve_many(
        &self,
        files: &[FileSystemEntry],
        parent: Option<&LibraryItem>,
        collection_kind: Option<CollectionKind>,
        _options: &LibraryOptions,
    ) -> Result<Option<MultiItemResolution>> {
        match collection_kind {
            Some(CollectionKind::Movies) | Some(CollectionKind::Mixed) | None => {}
            _ => return Ok(None),
        }
        if parent
            .is_some_and(|p| matches!(p.kind, ItemKind::Series | ItemKind::Season))
        {
            return Ok(None);
        }

        // base name -> part number -> entry
        let mut stacks: BTreeMap<String, BTreeMap<u32, &FileSystemEntry>> =
            BTreeMap::new();
        for file in files.iter().filter(|f| is_video_file(f)) {
            if let Some((base, part)) = naming::parse_stack_part(file.stem()) {
                stacks.entry(base).or_default().insert(part, file);
            }
        }
        stacks.retain(|_, parts| parts.len() > 1);
        if stacks.is_empty() {
            return Ok(None);
        }

        let mut claimed: Vec<&FileSystemEntry> = Vec::new();
        let mut items = Vec::new();
        for (base, parts) in &stacks {
            // The stack resolves to one movie anchored at its first part.
            let Some(first) = parts.values().next().copied() else {
                continue;
            };
            debug!(
                name = base.as_str(),
                parts = parts.len(),
                "resolved stacked movie"
            );
            items.push(
                LibraryItem::new(ItemKind::Movie, base.clone())
                    .with_path(first.path.clone()),
            );
            claimed.extend(parts.values());
        }

        let extras = files
            .iter()
            .filter(|f| !claimed.iter().any(|c| c.path == f.path))
            .cloned()
            .collect();

        Ok(Some(MultiItemResolution { items, extras }))
    }
}
