use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::library::{ItemSourceType, ViewType};

/// The concrete kind of a library item.
///
/// Every kind carries a stable string descriptor used when deriving item
/// identity, so renaming a Rust variant never silently changes ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Movie,
    Series,
    Season,
    Episode,
    AudioTrack,
    MusicAlbum,
    MusicArtist,
    Person,
    Genre,
    Studio,
    Year,
    Folder,
    CollectionFolder,
    UserView,
    BoxSet,
    LiveTvChannel,
}

impl ItemKind {
    /// Stable descriptor mixed into the identity hash.
    pub const fn descriptor(self) -> &'static str {
        match self {
            Self::Movie => "Movie",
            Self::Series => "Series",
            Self::Season => "Season",
            Self::Episode => "Episode",
            Self::AudioTrack => "AudioTrack",
            Self::MusicAlbum => "MusicAlbum",
            Self::MusicArtist => "MusicArtist",
            Self::Person => "Person",
            Self::Genre => "Genre",
            Self::Studio => "Studio",
            Self::Year => "Year",
            Self::Folder => "Folder",
            Self::CollectionFolder => "CollectionFolder",
            Self::UserView => "UserView",
            Self::BoxSet => "BoxSet",
            Self::LiveTvChannel => "LiveTvChannel",
        }
    }

    /// Whether items of this kind contain children.
    pub const fn is_folder(self) -> bool {
        matches!(
            self,
            Self::Series
                | Self::Season
                | Self::MusicAlbum
                | Self::MusicArtist
                | Self::Folder
                | Self::CollectionFolder
                | Self::UserView
                | Self::BoxSet
        )
    }

    /// By-name aggregates are addressed by a synthetic key rather than a
    /// real filesystem path.
    pub const fn is_by_name(self) -> bool {
        matches!(
            self,
            Self::MusicArtist
                | Self::Person
                | Self::Genre
                | Self::Studio
                | Self::Year
        )
    }

    pub const fn is_video(self) -> bool {
        matches!(self, Self::Movie | Self::Episode)
    }

    /// Virtual groupings whose membership is computed, not stored.
    pub const fn is_view_aggregate(self) -> bool {
        matches!(self, Self::CollectionFolder | Self::UserView)
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.descriptor())
    }
}

/// Image slot on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Primary,
    Backdrop,
    Logo,
    Thumb,
}

/// A single image attached to an item.
///
/// `remote_url` set and `path` unset means the image has not been fetched to
/// local storage yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemImage {
    pub kind: ImageKind,
    pub path: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub content_hash: Option<String>,
    pub date_modified: Option<DateTime<Utc>>,
}

impl ItemImage {
    pub fn local(kind: ImageKind, path: PathBuf) -> Self {
        Self {
            kind,
            path: Some(path),
            remote_url: None,
            width: None,
            height: None,
            content_hash: None,
            date_modified: None,
        }
    }

    pub fn remote(kind: ImageKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            path: None,
            remote_url: Some(url.into()),
            width: None,
            height: None,
            content_hash: None,
            date_modified: None,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.path.is_none() && self.remote_url.is_some()
    }
}

/// The typed unit of the library: one record in the item arena.
///
/// Items never hold references to each other; relationships are expressed
/// through `parent_id` and resolved against the repository, so ancestor walks
/// are explicit lookups rather than pointer chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub name: String,
    /// None for virtual/by-name items that have no on-disk location.
    pub path: Option<PathBuf>,
    pub parent_id: Option<ItemId>,
    pub source: ItemSourceType,
    /// Locked items are excluded from metadata refresh; inherited downward.
    pub is_locked: bool,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub index_number: Option<i32>,
    pub index_number_end: Option<i32>,
    pub parent_index_number: Option<i32>,
    pub premiere_date: Option<NaiveDate>,
    pub production_year: Option<i32>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub artists: Vec<String>,
    /// Set on by-name aggregates that were created through name lookup
    /// rather than resolved from disk.
    pub accessed_by_name: bool,
    /// Semantic type for `UserView` items; `None` for everything else.
    pub view_type: Option<ViewType>,
    pub images: Vec<ItemImage>,
}

impl LibraryItem {
    pub fn new(kind: ItemKind, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId(uuid::Uuid::nil()),
            kind,
            name: name.into(),
            path: None,
            parent_id: None,
            source: ItemSourceType::Library,
            is_locked: false,
            date_created: now,
            date_modified: now,
            index_number: None,
            index_number_end: None,
            parent_index_number: None,
            premiere_date: None,
            production_year: None,
            genres: Vec::new(),
            studios: Vec::new(),
            artists: Vec::new(),
            accessed_by_name: false,
            view_type: None,
            images: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    /// Items with no filesystem presence (by-name aggregates, views).
    pub fn is_virtual(&self) -> bool {
        self.path.is_none()
    }

    pub fn image(&self, kind: ImageKind) -> Option<&ItemImage> {
        self.images.iter().find(|i| i.kind == kind)
    }

    pub fn image_mut(&mut self, kind: ImageKind) -> Option<&mut ItemImage> {
        self.images.iter_mut().find(|i| i.kind == kind)
    }
}
