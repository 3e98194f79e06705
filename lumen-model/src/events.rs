use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::item::LibraryItem;
use crate::refresh::DeleteOptions;

/// Why an item-updated event fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemUpdateReason {
    LibraryScan,
    MetadataRefresh,
    ImageRefresh,
    InheritedDataRecompute,
}

/// Change notification published by the item service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemChange {
    Added {
        item: LibraryItem,
    },
    Updated {
        item: LibraryItem,
        reason: ItemUpdateReason,
    },
    /// Always fires, even for non-library sources; carries the options and
    /// resolved parent so listeners can run on-disk cleanup.
    Removed {
        item: LibraryItem,
        parent: Option<LibraryItem>,
        options: DeleteOptions,
    },
}

impl ItemChange {
    pub fn item_id(&self) -> ItemId {
        match self {
            ItemChange::Added { item }
            | ItemChange::Updated { item, .. }
            | ItemChange::Removed { item, .. } => item.id,
        }
    }

    pub const fn event_name(&self) -> &'static str {
        match self {
            ItemChange::Added { .. } => "item.added",
            ItemChange::Updated { .. } => "item.updated",
            ItemChange::Removed { .. } => "item.removed",
        }
    }
}
