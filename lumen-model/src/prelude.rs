//! Convenience re-exports for downstream crates.

pub use crate::events::{ItemChange, ItemUpdateReason};
pub use crate::files::FileSystemEntry;
pub use crate::ids::{ItemId, UserId};
pub use crate::item::{ImageKind, ItemImage, ItemKind, LibraryItem};
pub use crate::library::{CollectionKind, ItemSourceType, LibraryOptions, ViewType};
pub use crate::refresh::{
    DeleteOptions, MetadataRefreshMode, RefreshOptions, RefreshPriority,
};
