use serde::{Deserialize, Serialize};

/// Queue priority for pending item refreshes.
///
/// Derived `Ord` follows declaration order, so `High > Normal > Low` and the
/// scheduler's max-heap pops high-priority work first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPriority {
    Low,
    Normal,
    High,
}

/// How much existing metadata a refresh is allowed to touch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetadataRefreshMode {
    /// Only verify the item still matches its on-disk state.
    ValidationOnly,
    #[default]
    Default,
    FullRefresh,
}

/// Options attached to one queued refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOptions {
    pub metadata_refresh_mode: MetadataRefreshMode,
    pub replace_all_metadata: bool,
    pub replace_all_images: bool,
    pub force_save: bool,
}

impl RefreshOptions {
    pub fn full() -> Self {
        Self {
            metadata_refresh_mode: MetadataRefreshMode::FullRefresh,
            replace_all_metadata: true,
            replace_all_images: false,
            force_save: true,
        }
    }
}

/// Transient description of how far a delete should reach.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct DeleteOptions {
    /// Remove the on-disk file/directory alongside the database record.
    pub delete_file_location: bool,
}
