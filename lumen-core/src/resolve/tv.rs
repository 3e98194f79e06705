use lumen_model::{CollectionKind, ItemKind, LibraryItem};

use crate::error::Result;
use crate::naming;
use crate::resolve::{is_video_file, ItemResolver, ResolveContext};

/// Resolves top-level directories of a TV library into series.
#[derive(Debug, Default)]
pub struct SeriesResolver;

impl ItemResolver for SeriesResolver {
    fn descriptor(&self) -> &'static str {
        "series"
    }

    fn try_resolve(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<LibraryItem>> {
        if !ctx.is_directory()
            || ctx.collection_kind != Some(CollectionKind::TvShows)
        {
            return Ok(None);
        }
        // A series directory sits directly under the library folder; season
        // folders underneath are handled by the season resolver.
        if !ctx.is_under_collection_folder() {
            return Ok(None);
        }
        if naming::parse_season_folder(&ctx.entry.name).is_some() {
            return Ok(None);
        }

        Ok(Some(
            LibraryItem::new(ItemKind::Series, ctx.entry.name.clone())
                .with_path(ctx.entry.path.clone()),
        ))
    }
}

/// Resolves season folders under a series.
#[derive(Debug, Default)]
pub struct SeasonResolver;

impl ItemResolver for SeasonResolver {
    fn descriptor(&self) -> &'static str {
        "season"
    }

    fn try_resolve(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<LibraryItem>> {
        if !ctx.is_directory() {
            return Ok(None);
        }
        if !ctx.parent.is_some_and(|p| p.kind == ItemKind::Series) {
            return Ok(None);
        }
        let Some(season_number) = naming::parse_season_folder(&ctx.entry.name)
        else {
            return Ok(None);
        };

        let mut item = LibraryItem::new(ItemKind::Season, ctx.entry.name.clone())
            .with_path(ctx.entry.path.clone());
        item.index_number = Some(season_number as i32);
        Ok(Some(item))
    }
}

/// Resolves video files inside a TV context into episodes.
///
/// Episode/season numbers are left unset here; the post-resolution inference
/// pass fills them from the path so forced refreshes can re-derive them.
#[derive(Debug, Default)]
pub struct EpisodeResolver;

impl ItemResolver for EpisodeResolver {
    fn descriptor(&self) -> &'static str {
        "episode"
    }

    fn try_resolve(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<LibraryItem>> {
        if ctx.is_directory() || !is_video_file(ctx.entry) {
            return Ok(None);
        }
        let in_tv_folder = ctx
            .parent
            .is_some_and(|p| matches!(p.kind, ItemKind::Series | ItemKind::Season));
        if !in_tv_folder && ctx.collection_kind != Some(CollectionKind::TvShows) {
            return Ok(None);
        }

        Ok(Some(
            LibraryItem::new(ItemKind::Episode, ctx.entry.stem())
                .with_path(ctx.entry.path.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_model::{FileSystemEntry, LibraryOptions};

    fn ctx_parts(
        path: &str,
        is_dir: bool,
    ) -> (FileSystemEntry, LibraryOptions) {
        let mut entry = FileSystemEntry::new(path, is_dir);
        entry.size = if is_dir { 0 } else { 1024 };
        (entry, LibraryOptions::default())
    }

    #[test]
    fn season_folder_under_series() {
        let (entry, options) = ctx_parts("/tv/The Wire/Season 02", true);
        let series = LibraryItem::new(ItemKind::Series, "The Wire")
            .with_path("/tv/The Wire");
        let ctx = ResolveContext {
            entry: &entry,
            parent: Some(&series),
            children: &[],
            collection_kind: Some(CollectionKind::TvShows),
            options: &options,
        };
        let item = SeasonResolver.try_resolve(&ctx).unwrap().unwrap();
        assert_eq!(item.kind, ItemKind::Season);
        assert_eq!(item.index_number, Some(2));
    }

    #[test]
    fn season_folder_is_not_a_series() {
        let (entry, options) = ctx_parts("/tv/Season 02", true);
        let root = LibraryItem::new(ItemKind::CollectionFolder, "TV");
        let ctx = ResolveContext {
            entry: &entry,
            parent: Some(&root),
            children: &[],
            collection_kind: Some(CollectionKind::TvShows),
            options: &options,
        };
        assert!(SeriesResolver.try_resolve(&ctx).unwrap().is_none());
    }

    #[test]
    fn episode_requires_tv_context() {
        let (entry, options) = ctx_parts("/movies/Heat (1995).mkv", false);
        let ctx = ResolveContext {
            entry: &entry,
            parent: None,
            children: &[],
            collection_kind: Some(CollectionKind::Movies),
            options: &options,
        };
        assert!(EpisodeResolver.try_resolve(&ctx).unwrap().is_none());
    }
}
