//! Core data model definitions shared across Lumen crates.
#![allow(missing_docs)]

pub mod events;
pub mod files;
pub mod ids;
pub mod item;
pub mod library;
pub mod prelude;
pub mod refresh;

// Intentionally curated re-exports for downstream consumers.
pub use events::{ItemChange, ItemUpdateReason};
pub use files::FileSystemEntry;
pub use ids::{ItemId, UserId};
pub use item::{ImageKind, ItemImage, ItemKind, LibraryItem};
pub use library::{CollectionKind, ItemSourceType, LibraryOptions, ViewType};
pub use refresh::{
    DeleteOptions, MetadataRefreshMode, RefreshOptions, RefreshPriority,
};
