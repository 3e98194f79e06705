use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use lumen_model::{
    DeleteOptions, ItemChange, ItemId, ItemKind, ItemSourceType,
    ItemUpdateReason, LibraryItem,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ServerPaths;
use crate::error::{LibraryError, Result};
use crate::identity::IdGenerator;
use crate::store::{ItemFilter, ItemRepository};

/// Subscriber for item change notifications.
///
/// Listener failures are logged and never propagated; a broken consumer
/// must not abort the mutation that triggered the event.
pub trait ItemChangeListener: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_change(&self, change: &ItemChange) -> Result<()>;
}

/// Only a restricted subset of kinds is cache-eligible, bounding cache
/// growth by excluding the bulk of leaf metadata items.
fn is_cache_eligible(kind: ItemKind) -> bool {
    kind.is_folder()
        || kind.is_video()
        || kind == ItemKind::LiveTvChannel
        || kind == ItemKind::MusicArtist
}

/// In-memory cache plus persistence boundary for library items.
///
/// Owns create/update/delete semantics and publishes change events. There is
/// no transactional guarantee across (repository write, cache update, event
/// dispatch); listeners observing the cache mid-update is an accepted race,
/// documented here as a known limitation.
pub struct ItemService {
    repository: Arc<dyn ItemRepository>,
    identity: Arc<IdGenerator>,
    paths: ServerPaths,
    cache: DashMap<ItemId, LibraryItem>,
    listeners: RwLock<Vec<Arc<dyn ItemChangeListener>>>,
}

impl std::fmt::Debug for ItemService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemService")
            .field("cached_items", &self.cache.len())
            .finish()
    }
}

impl ItemService {
    pub fn new(
        repository: Arc<dyn ItemRepository>,
        identity: Arc<IdGenerator>,
        paths: ServerPaths,
    ) -> Self {
        Self {
            repository,
            identity,
            paths,
            cache: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn ItemRepository> {
        &self.repository
    }

    pub fn subscribe(&self, listener: Arc<dyn ItemChangeListener>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push(listener);
    }

    /// Cached lookup; falls through to the repository and caches the result
    /// when the kind is cache-eligible.
    pub async fn get_item_by_id(&self, id: ItemId) -> Result<Option<LibraryItem>> {
        if let Some(cached) = self.cache.get(&id) {
            return Ok(Some(cached.value().clone()));
        }
        let item = self.repository.retrieve_item(id).await?;
        if let Some(item) = &item {
            if is_cache_eligible(item.kind) {
                self.cache.insert(item.id, item.clone());
            }
        }
        Ok(item)
    }

    /// Uncached repository passthrough.
    pub async fn retrieve_item(&self, id: ItemId) -> Result<Option<LibraryItem>> {
        self.repository.retrieve_item(id).await
    }

    pub async fn create_item(
        &self,
        item: LibraryItem,
        token: &CancellationToken,
    ) -> Result<()> {
        self.create_items(std::slice::from_ref(&item), token).await
    }

    pub async fn create_items(
        &self,
        items: &[LibraryItem],
        token: &CancellationToken,
    ) -> Result<()> {
        self.repository.save_items(items, token).await?;
        for item in items {
            if is_cache_eligible(item.kind) {
                self.cache.insert(item.id, item.clone());
            }
            if item.source == ItemSourceType::Library {
                self.publish(&ItemChange::Added { item: item.clone() });
            }
        }
        Ok(())
    }

    pub async fn update_items(
        &self,
        items: &[LibraryItem],
        reason: ItemUpdateReason,
        token: &CancellationToken,
    ) -> Result<()> {
        self.repository.save_items(items, token).await?;
        for item in items {
            if is_cache_eligible(item.kind) || self.cache.contains_key(&item.id) {
                self.cache.insert(item.id, item.clone());
            }
            if item.source == ItemSourceType::Library {
                self.publish(&ItemChange::Updated {
                    item: item.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Delete with default options and the item's current parent.
    pub async fn delete_item(&self, id: ItemId) -> Result<bool> {
        self.delete_item_full(id, DeleteOptions::default(), None).await
    }

    pub async fn delete_item_with_options(
        &self,
        id: ItemId,
        options: DeleteOptions,
    ) -> Result<bool> {
        self.delete_item_full(id, options, None).await
    }

    /// Full delete shape: explicit options and an explicit parent carried on
    /// the removal event. Deleting an absent item is a silent no-op and
    /// raises no event. The record is removed before the event fires;
    /// listeners must not assume it is still queryable.
    pub async fn delete_item_full(
        &self,
        id: ItemId,
        options: DeleteOptions,
        parent: Option<LibraryItem>,
    ) -> Result<bool> {
        let Some(item) = self.repository.retrieve_item(id).await? else {
            debug!(item_id = %id, "delete of absent item is a no-op");
            return Ok(false);
        };

        let removed = self.repository.delete_item(id).await?;
        self.cache.remove(&id);
        if !removed {
            return Ok(false);
        }

        let parent = match parent {
            Some(parent) => Some(parent),
            None => match item.parent_id {
                Some(parent_id) => self.get_item_by_id(parent_id).await?,
                None => None,
            },
        };

        // Removal always fires, whatever the item's source; it is the sole
        // channel for cascading on-disk cleanup in collaborators.
        self.publish(&ItemChange::Removed {
            item,
            parent,
            options,
        });
        Ok(true)
    }

    /// Create-or-fetch a by-name aggregate (genre, studio, year, person).
    ///
    /// The item's path is a deterministic synthetic location under the
    /// program-data root, so its id is stable across calls.
    pub async fn create_item_by_name(
        &self,
        kind: ItemKind,
        name: &str,
        token: &CancellationToken,
    ) -> Result<LibraryItem> {
        if name.is_empty() {
            return Err(LibraryError::InvalidArgument(
                "by-name item name must not be empty".to_string(),
            ));
        }
        if !kind.is_by_name() {
            return Err(LibraryError::InvalidArgument(format!(
                "{kind} is not a by-name kind"
            )));
        }

        let path = self.paths.by_name_path(by_name_bucket(kind), name);
        let id = self
            .identity
            .generate(&path.to_string_lossy(), kind)?;
        if let Some(existing) = self.get_item_by_id(id).await? {
            return Ok(existing);
        }

        let mut item = LibraryItem::new(kind, name).with_path(path);
        item.id = id;
        item.accessed_by_name = true;
        self.create_items(std::slice::from_ref(&item), token).await?;
        Ok(item)
    }

    /// Artist factory: prefer an existing artist resolved from disk over one
    /// previously created by name, then fall back to by-name creation.
    pub async fn get_or_create_artist(
        &self,
        name: &str,
        token: &CancellationToken,
    ) -> Result<LibraryItem> {
        let filter = ItemFilter {
            kinds: vec![ItemKind::MusicArtist],
            name: Some(name.to_string()),
            ..Default::default()
        };
        let candidates = self.repository.get_item_list(&filter).await?;
        if let Some(existing) = candidates
            .iter()
            .find(|a| !a.accessed_by_name)
            .or_else(|| candidates.first())
        {
            return Ok(existing.clone());
        }
        self.create_item_by_name(ItemKind::MusicArtist, name, token)
            .await
    }

    /// Whether an id is currently cached. Exposed for eligibility tests.
    pub fn is_cached(&self, id: ItemId) -> bool {
        self.cache.contains_key(&id)
    }

    fn publish(&self, change: &ItemChange) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in listeners {
            if let Err(err) = listener.on_change(change) {
                warn!(
                    listener = listener.name(),
                    event = change.event_name(),
                    error = %err,
                    "item change listener failed"
                );
            }
        }
    }
}

fn by_name_bucket(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::MusicArtist => "artists",
        ItemKind::Genre => "genres",
        ItemKind::Studio => "studios",
        ItemKind::Year => "years",
        ItemKind::Person => "people",
        _ => "items",
    }
}
