use lumen_model::{CollectionKind, ItemKind, LibraryItem};

use crate::error::Result;
use crate::resolve::{is_audio_file, ItemResolver, ResolveContext};

/// Resolves audio files in a music library into tracks.
///
/// Artist/album names are seeded from the conventional
/// `Artist/Album/track` folder layout so the post-scan artist validator has
/// something to aggregate before the first metadata refresh lands.
#[derive(Debug, Default)]
pub struct AudioTrackResolver;

impl ItemResolver for AudioTrackResolver {
    fn descriptor(&self) -> &'static str {
        "audio-track"
    }

    fn try_resolve(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<LibraryItem>> {
        if ctx.is_directory() || !is_audio_file(ctx.entry) {
            return Ok(None);
        }
        if ctx.collection_kind != Some(CollectionKind::Music) {
            return Ok(None);
        }

        let mut item = LibraryItem::new(ItemKind::AudioTrack, ctx.entry.stem())
            .with_path(ctx.entry.path.clone());

        if let Some(parent) = ctx.parent {
            match parent.kind {
                ItemKind::MusicAlbum => {
                    item.artists = parent.artists.clone();
                }
                ItemKind::MusicArtist => {
                    item.artists = vec![parent.name.clone()];
                }
                _ => {}
            }
        }
        Ok(Some(item))
    }
}

/// Resolves directories that directly contain audio files into albums.
#[derive(Debug, Default)]
pub struct MusicAlbumResolver;

impl ItemResolver for MusicAlbumResolver {
    fn descriptor(&self) -> &'static str {
        "music-album"
    }

    fn try_resolve(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<LibraryItem>> {
        if !ctx.is_directory()
            || ctx.collection_kind != Some(CollectionKind::Music)
        {
            return Ok(None);
        }
        if !ctx.children.iter().any(is_audio_file) {
            return Ok(None);
        }

        let mut item = LibraryItem::new(ItemKind::MusicAlbum, ctx.entry.name.clone())
            .with_path(ctx.entry.path.clone());
        if let Some(parent) = ctx.parent {
            if parent.kind == ItemKind::MusicArtist {
                item.artists = vec![parent.name.clone()];
            }
        }
        Ok(Some(item))
    }
}

/// Resolves artist directories: top-level music folders holding album
/// subdirectories rather than audio files.
#[derive(Debug, Default)]
pub struct MusicArtistResolver;

impl ItemResolver for MusicArtistResolver {
    fn descriptor(&self) -> &'static str {
        "music-artist"
    }

    fn try_resolve(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<LibraryItem>> {
        if !ctx.is_directory()
            || ctx.collection_kind != Some(CollectionKind::Music)
        {
            return Ok(None);
        }
        if !ctx.is_under_collection_folder() {
            return Ok(None);
        }
        let has_subdirectories =
            ctx.children.iter().any(|child| child.is_directory);
        let has_direct_audio = ctx.children.iter().any(is_audio_file);
        if !has_subdirectories || has_direct_audio {
            return Ok(None);
        }

        Ok(Some(
            LibraryItem::new(ItemKind::MusicArtist, ctx.entry.name.clone())
                .with_path(ctx.entry.path.clone()),
        ))
    }
}
