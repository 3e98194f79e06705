use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use lumen_model::{ItemId, ItemKind, LibraryItem, UserId, ViewType};
use tracing::{debug, warn};

use crate::error::Result;
use crate::query::ItemQuery;
use crate::service::ItemService;
use crate::store::{ItemFilter, ItemRepository};

/// Per-user view visibility policy, supplied by the (out-of-scope) user
/// management layer.
#[async_trait]
pub trait UserViewPolicy: Send + Sync {
    /// The view/collection-folder items at the top of this user's library.
    async fn views_for_user(&self, user_id: UserId) -> Result<Vec<LibraryItem>>;

    /// Whether the user may see the given item at all.
    async fn can_see(&self, user_id: UserId, item: &LibraryItem) -> bool;

    /// Whether the user has opted into grouping this collection folder into
    /// merged views.
    async fn groups_into_view(&self, user_id: UserId, folder_id: ItemId) -> bool;
}

/// Translates semantic queries into repository filters and executes them,
/// handling the view -> top-parent/ancestor-id scope resolution.
pub struct ItemQueryService {
    items: Arc<ItemService>,
    views: Arc<dyn UserViewPolicy>,
}

impl std::fmt::Debug for ItemQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemQueryService").finish()
    }
}

impl ItemQueryService {
    pub fn new(items: Arc<ItemService>, views: Arc<dyn UserViewPolicy>) -> Self {
        Self { items, views }
    }

    /// Execute a query: resolve scope, delegate the filter to the
    /// repository, and post-filter by per-user visibility when a user is
    /// set.
    pub async fn get_items(&self, mut query: ItemQuery) -> Result<Vec<LibraryItem>> {
        self.add_user_scope(&mut query).await?;
        self.set_top_parent_or_ancestor_ids(&mut query).await?;

        let filter = to_filter(&query);
        let mut results = self
            .items
            .repository()
            .get_item_list(&filter)
            .await?;

        if let Some(user_id) = query.user_id {
            let mut visible = Vec::with_capacity(results.len());
            for item in results {
                if self.views.can_see(user_id, &item).await {
                    visible.push(item);
                }
            }
            results = visible;
        }
        Ok(results)
    }

    pub async fn get_item_ids(&self, query: ItemQuery) -> Result<Vec<ItemId>> {
        Ok(self.get_items(query).await?.into_iter().map(|i| i.id).collect())
    }

    /// Inject the requesting user's visible library scope into a query that
    /// lacks explicit scoping filters.
    ///
    /// A scope that resolves to zero ids is replaced by a freshly generated
    /// random id: an empty scope filter would be read by the repository as
    /// "no restriction" and leak the entire library.
    pub async fn add_user_scope(&self, query: &mut ItemQuery) -> Result<()> {
        let Some(user_id) = query.user_id else {
            return Ok(());
        };
        if query.has_scope() {
            return Ok(());
        }

        let mut top_parents: BTreeSet<ItemId> = BTreeSet::new();
        for view in self.views.views_for_user(user_id).await? {
            top_parents
                .extend(self.top_parent_ids_for(&view, Some(user_id)).await?);
        }

        if top_parents.is_empty() {
            debug!(user = %user_id, "user scope resolved to nothing; using sentinel");
            query.top_parent_ids = vec![ItemId::random()];
        } else {
            query.top_parent_ids = top_parents.into_iter().collect();
        }
        Ok(())
    }

    /// Optimization pass: when every ancestor id refers to a
    /// collection-folder-or-view aggregate, rewrite the ancestor filter into
    /// the cheaper top-parent filter. Otherwise the ancestor filter stays
    /// untouched.
    pub async fn set_top_parent_or_ancestor_ids(
        &self,
        query: &mut ItemQuery,
    ) -> Result<()> {
        if query.ancestor_ids.is_empty() {
            return Ok(());
        }

        let mut aggregates = Vec::with_capacity(query.ancestor_ids.len());
        for id in &query.ancestor_ids {
            match self.items.get_item_by_id(*id).await? {
                Some(item) if item.kind.is_view_aggregate() => {
                    aggregates.push(item)
                }
                _ => return Ok(()),
            }
        }

        let mut top_parents: BTreeSet<ItemId> = BTreeSet::new();
        for aggregate in &aggregates {
            top_parents
                .extend(self.top_parent_ids_for(aggregate, query.user_id).await?);
        }

        query.ancestor_ids.clear();
        if top_parents.is_empty() {
            query.top_parent_ids = vec![ItemId::random()];
        } else {
            query.top_parent_ids = top_parents.into_iter().collect();
        }
        Ok(())
    }

    /// Resolve an item to the set of top-parent ids that scope queries
    /// against it.
    ///
    /// Views resolve recursively: the live-TV root view is its own scope; a
    /// view with a parent chain resolves through it; an eligible grouped
    /// view unions the scopes of every grouped child collection folder the
    /// user enabled. Collection folders resolve to themselves; anything else
    /// resolves to its top-level ancestor.
    pub async fn top_parent_ids_for(
        &self,
        item: &LibraryItem,
        user_id: Option<UserId>,
    ) -> Result<Vec<ItemId>> {
        match item.kind {
            ItemKind::UserView => {
                if item.view_type == Some(ViewType::LiveTv) {
                    return Ok(vec![item.id]);
                }
                if let Some(parent_id) = item.parent_id {
                    if let Some(parent) =
                        self.items.get_item_by_id(parent_id).await?
                    {
                        return Box::pin(
                            self.top_parent_ids_for(&parent, user_id),
                        )
                        .await;
                    }
                }
                let Some(user_id) = user_id else {
                    return Ok(Vec::new());
                };
                let mut ids = BTreeSet::new();
                for folder in self.grouped_folders_for(user_id).await? {
                    ids.extend(
                        Box::pin(self.top_parent_ids_for(&folder, Some(user_id)))
                            .await?,
                    );
                }
                Ok(ids.into_iter().collect())
            }
            ItemKind::CollectionFolder => Ok(vec![item.id]),
            _ => {
                let top = self.top_ancestor_id(item).await?;
                Ok(top.into_iter().collect())
            }
        }
    }

    async fn grouped_folders_for(
        &self,
        user_id: UserId,
    ) -> Result<Vec<LibraryItem>> {
        let filter = ItemFilter::by_kind(ItemKind::CollectionFolder);
        let folders = self.items.repository().get_item_list(&filter).await?;
        let mut grouped = Vec::new();
        for folder in folders {
            if self.views.groups_into_view(user_id, folder.id).await {
                grouped.push(folder);
            }
        }
        Ok(grouped)
    }

    /// Iterative ancestor walk against the arena; no pointer chains.
    async fn top_ancestor_id(&self, item: &LibraryItem) -> Result<Option<ItemId>> {
        let mut seen = vec![item.id];
        let mut best: Option<ItemId> = None;
        let mut cursor = item.parent_id;
        while let Some(id) = cursor {
            if seen.contains(&id) {
                warn!(item = %item.id, "cycle detected in parent chain");
                break;
            }
            seen.push(id);
            let Some(parent) = self.items.get_item_by_id(id).await? else {
                break;
            };
            if parent.kind == ItemKind::CollectionFolder {
                best = Some(parent.id);
            }
            if best.is_none() && parent.parent_id.is_none() {
                best = Some(parent.id);
            }
            cursor = parent.parent_id;
        }
        Ok(best)
    }
}

fn to_filter(query: &ItemQuery) -> ItemFilter {
    ItemFilter {
        kinds: query.kinds.clone(),
        parent_id: query.parent_id,
        top_parent_ids: query.top_parent_ids.clone(),
        ancestor_ids: query.ancestor_ids.clone(),
        name: query.name.clone(),
        limit: query.limit,
        ..Default::default()
    }
}
