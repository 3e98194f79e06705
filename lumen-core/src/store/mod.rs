//! Repository boundary: the persistence backend is a black box that accepts
//! a structured filter and returns items, ids, or counts.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use lumen_model::{ItemId, ItemKind, ItemSourceType, LibraryItem};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use memory::InMemoryItemRepository;

/// Grouped-count dimension for aggregate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameCountField {
    Artists,
    Studios,
    Genres,
}

/// Structured filter handed to the repository. All set conditions are
/// conjunctive.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub kinds: Vec<ItemKind>,
    pub parent_id: Option<ItemId>,
    /// Scope to items whose top parent is one of these ids. Empty means "no
    /// restriction" — callers that resolved a scope to nothing must pass a
    /// sentinel id instead of an empty list.
    pub top_parent_ids: Vec<ItemId>,
    /// Scope to items with one of these ids in their ancestor chain. Same
    /// empty-list caveat as `top_parent_ids`.
    pub ancestor_ids: Vec<ItemId>,
    pub name: Option<String>,
    pub source: Option<ItemSourceType>,
    pub is_locked: Option<bool>,
    /// Items referencing this artist name.
    pub artist: Option<String>,
    /// Items referencing this studio name.
    pub studio: Option<String>,
    /// Items referencing this genre name.
    pub genre: Option<String>,
    pub limit: Option<usize>,
}

impl ItemFilter {
    pub fn by_kind(kind: ItemKind) -> Self {
        Self {
            kinds: vec![kind],
            ..Default::default()
        }
    }

    pub fn by_parent(parent_id: ItemId) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }
}

/// Persistence backend consumed by the item service and query engine.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Fetch one item straight from the backing store, bypassing caches.
    async fn retrieve_item(&self, id: ItemId) -> Result<Option<LibraryItem>>;

    async fn save_items(
        &self,
        items: &[LibraryItem],
        token: &CancellationToken,
    ) -> Result<()>;

    /// Remove one record. Returns `false` when the record was not present,
    /// making delete idempotent at this layer.
    async fn delete_item(&self, id: ItemId) -> Result<bool>;

    async fn get_item_list(&self, filter: &ItemFilter) -> Result<Vec<LibraryItem>>;

    async fn get_item_id_list(&self, filter: &ItemFilter) -> Result<Vec<ItemId>>;

    async fn get_count(&self, filter: &ItemFilter) -> Result<usize>;

    /// Distinct referenced names with reference counts for an aggregate
    /// dimension (artists/studios/genres).
    async fn get_name_counts(
        &self,
        field: NameCountField,
    ) -> Result<HashMap<String, usize>>;
}
