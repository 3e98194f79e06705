use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use lumen_model::{ItemId, ItemKind, LibraryItem};
use tokio_util::sync::CancellationToken;

use crate::error::{LibraryError, Result};
use crate::store::{ItemFilter, ItemRepository, NameCountField};

/// In-memory repository over a concurrent map.
///
/// Implements the full filter surface the query engine emits so the scan
/// pipeline can run end-to-end without a database. Ancestor and top-parent
/// scoping are computed by explicit parent-chain walks against the arena,
/// exactly as a SQL backend would precompute them into ancestor tables.
#[derive(Debug, Default)]
pub struct InMemoryItemRepository {
    items: DashMap<ItemId, LibraryItem>,
}

impl InMemoryItemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Walk the parent chain of an item, root-most last. Cycles (which would
    /// indicate corrupted parent links) terminate the walk.
    fn ancestor_ids(&self, item: &LibraryItem) -> Vec<ItemId> {
        let mut ancestors = Vec::new();
        let mut cursor = item.parent_id;
        while let Some(id) = cursor {
            if ancestors.contains(&id) {
                break;
            }
            ancestors.push(id);
            cursor = self.items.get(&id).and_then(|i| i.parent_id);
        }
        ancestors
    }

    /// The highest-level library-folder ancestor, used as the coarse query
    /// scoping key. Falls back to the topmost ancestor when no collection
    /// folder is in the chain.
    fn top_parent_id(&self, item: &LibraryItem) -> Option<ItemId> {
        let ancestors = self.ancestor_ids(item);
        ancestors
            .iter()
            .find(|id| {
                self.items
                    .get(id)
                    .is_some_and(|i| i.kind == ItemKind::CollectionFolder)
            })
            .copied()
            .or_else(|| ancestors.last().copied())
    }

    fn matches(&self, filter: &ItemFilter, item: &LibraryItem) -> bool {
        if !filter.kinds.is_empty() && !filter.kinds.contains(&item.kind) {
            return false;
        }
        if let Some(parent_id) = filter.parent_id {
            if item.parent_id != Some(parent_id) {
                return false;
            }
        }
        if !filter.top_parent_ids.is_empty() {
            let top = self.top_parent_id(item);
            if !top.is_some_and(|id| filter.top_parent_ids.contains(&id)) {
                return false;
            }
        }
        if !filter.ancestor_ids.is_empty() {
            let ancestors = self.ancestor_ids(item);
            if !filter
                .ancestor_ids
                .iter()
                .any(|id| ancestors.contains(id))
            {
                return false;
            }
        }
        if let Some(name) = &filter.name {
            if !item.name.eq_ignore_ascii_case(name) {
                return false;
            }
        }
        if let Some(source) = filter.source {
            if item.source != source {
                return false;
            }
        }
        if let Some(locked) = filter.is_locked {
            if item.is_locked != locked {
                return false;
            }
        }
        if let Some(artist) = &filter.artist {
            if !item.artists.iter().any(|a| a.eq_ignore_ascii_case(artist)) {
                return false;
            }
        }
        if let Some(studio) = &filter.studio {
            if !item.studios.iter().any(|s| s.eq_ignore_ascii_case(studio)) {
                return false;
            }
        }
        if let Some(genre) = &filter.genre {
            if !item.genres.iter().any(|g| g.eq_ignore_ascii_case(genre)) {
                return false;
            }
        }
        true
    }

    fn filtered(&self, filter: &ItemFilter) -> Vec<LibraryItem> {
        let mut out: Vec<LibraryItem> = self
            .items
            .iter()
            .filter(|entry| self.matches(filter, entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        // Deterministic output order for a hash-keyed store.
        out.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        out
    }
}

#[async_trait]
impl ItemRepository for InMemoryItemRepository {
    async fn retrieve_item(&self, id: ItemId) -> Result<Option<LibraryItem>> {
        Ok(self.items.get(&id).map(|entry| entry.value().clone()))
    }

    async fn save_items(
        &self,
        items: &[LibraryItem],
        token: &CancellationToken,
    ) -> Result<()> {
        for item in items {
            if token.is_cancelled() {
                return Err(LibraryError::Cancelled(
                    "save_items cancelled".to_string(),
                ));
            }
            self.items.insert(item.id, item.clone());
        }
        Ok(())
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool> {
        Ok(self.items.remove(&id).is_some())
    }

    async fn get_item_list(&self, filter: &ItemFilter) -> Result<Vec<LibraryItem>> {
        Ok(self.filtered(filter))
    }

    async fn get_item_id_list(&self, filter: &ItemFilter) -> Result<Vec<ItemId>> {
        Ok(self.filtered(filter).into_iter().map(|i| i.id).collect())
    }

    async fn get_count(&self, filter: &ItemFilter) -> Result<usize> {
        Ok(self.filtered(filter).len())
    }

    async fn get_name_counts(
        &self,
        field: NameCountField,
    ) -> Result<HashMap<String, usize>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for entry in self.items.iter() {
            let names = match field {
                NameCountField::Artists => &entry.value().artists,
                NameCountField::Studios => &entry.value().studios,
                NameCountField::Genres => &entry.value().genres,
            };
            for name in names {
                *counts.entry(name.clone()).or_default() += 1;
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_model::ItemKind;

    fn item(kind: ItemKind, name: &str, parent: Option<ItemId>) -> LibraryItem {
        let mut item = LibraryItem::new(kind, name);
        item.id = ItemId::random();
        item.parent_id = parent;
        item
    }

    #[tokio::test]
    async fn top_parent_scoping_resolves_through_the_chain() {
        let repo = InMemoryItemRepository::new();
        let token = CancellationToken::new();

        let root = item(ItemKind::Folder, "root", None);
        let library = item(ItemKind::CollectionFolder, "Movies", Some(root.id));
        let movie = item(ItemKind::Movie, "Heat", Some(library.id));
        repo.save_items(
            &[root.clone(), library.clone(), movie.clone()],
            &token,
        )
        .await
        .unwrap();

        let filter = ItemFilter {
            top_parent_ids: vec![library.id],
            ..Default::default()
        };
        let ids = repo.get_item_id_list(&filter).await.unwrap();
        assert_eq!(ids, vec![movie.id]);
    }

    #[tokio::test]
    async fn name_counts_group_across_items() {
        let repo = InMemoryItemRepository::new();
        let token = CancellationToken::new();

        let mut a = item(ItemKind::AudioTrack, "t1", None);
        a.artists = vec!["Nina Simone".to_string()];
        let mut b = item(ItemKind::AudioTrack, "t2", None);
        b.artists = vec!["Nina Simone".to_string(), "Miles Davis".to_string()];
        repo.save_items(&[a, b], &token).await.unwrap();

        let counts = repo.get_name_counts(NameCountField::Artists).await.unwrap();
        assert_eq!(counts.get("Nina Simone"), Some(&2));
        assert_eq!(counts.get("Miles Davis"), Some(&1));
    }
}
