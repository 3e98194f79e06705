use serde::{Deserialize, Serialize};

/// The type of content a library folder is expected to contain.
///
/// Used as the collection-type hint during resolution: resolvers gate
/// themselves on it so a music library never produces movie items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Movies,
    TvShows,
    Music,
    Mixed,
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionKind::Movies => write!(f, "Movies"),
            CollectionKind::TvShows => write!(f, "TV Shows"),
            CollectionKind::Music => write!(f, "Music"),
            CollectionKind::Mixed => write!(f, "Mixed"),
        }
    }
}

/// Semantic type of a user view.
///
/// The live-TV root view resolves queries to itself rather than through its
/// parent chain, so views carry their type explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    Movies,
    TvShows,
    Music,
    LiveTv,
    Folders,
}

/// Where an item originates.
///
/// Change events are only published for `Library` items; synthetic sources
/// such as live-TV guide data would otherwise flood listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSourceType {
    Library,
    LiveTv,
    External,
}

/// Per-library policy knobs consulted during resolution and refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryOptions {
    pub collection_kind: Option<CollectionKind>,
    /// Stamp new items with the filesystem creation time instead of "now".
    pub use_file_creation_time_for_date_added: bool,
    /// Let embedded container metadata override filename-derived episode
    /// numbers.
    pub enable_embedded_episode_infos: bool,
    pub automatically_add_to_collection: bool,
    pub watch_for_changes: bool,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            collection_kind: None,
            use_file_creation_time_for_date_added: false,
            enable_embedded_episode_infos: false,
            automatically_add_to_collection: false,
            watch_for_changes: true,
        }
    }
}
