//! Query engine: semantic item queries and their translation into
//! repository-level filters, including the view -> top-parent/ancestor
//! scoping optimization.

pub mod service;

use lumen_model::{ItemId, ItemKind, UserId};

pub use service::{ItemQueryService, UserViewPolicy};

/// A semantic item query, prior to scope resolution.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub kinds: Vec<ItemKind>,
    pub user_id: Option<UserId>,
    pub parent_id: Option<ItemId>,
    pub top_parent_ids: Vec<ItemId>,
    pub ancestor_ids: Vec<ItemId>,
    pub name: Option<String>,
    pub recursive: bool,
    pub limit: Option<usize>,
}

impl ItemQuery {
    pub fn builder() -> ItemQueryBuilder {
        ItemQueryBuilder::new()
    }

    /// Whether the query already carries an explicit scope and needs no
    /// user-view injection.
    pub fn has_scope(&self) -> bool {
        self.parent_id.is_some()
            || !self.top_parent_ids.is_empty()
            || !self.ancestor_ids.is_empty()
    }
}

/// Fluent API for building item queries.
#[derive(Debug, Clone, Default)]
pub struct ItemQueryBuilder {
    query: ItemQuery,
}

impl ItemQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set user context; execution will scope to and post-filter by this
    /// user's visible libraries.
    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.query.user_id = Some(user_id);
        self
    }

    pub fn kind(mut self, kind: ItemKind) -> Self {
        self.query.kinds.push(kind);
        self
    }

    pub fn kinds(mut self, kinds: Vec<ItemKind>) -> Self {
        self.query.kinds = kinds;
        self
    }

    pub fn under_parent(mut self, parent_id: ItemId) -> Self {
        self.query.parent_id = Some(parent_id);
        self
    }

    pub fn with_ancestor(mut self, ancestor_id: ItemId) -> Self {
        self.query.ancestor_ids.push(ancestor_id);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.query.name = Some(name.into());
        self
    }

    pub fn recursive(mut self) -> Self {
        self.query.recursive = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn build(self) -> ItemQuery {
        self.query
    }
}
