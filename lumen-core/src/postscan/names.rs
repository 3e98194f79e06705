use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lumen_model::{ItemKind, LibraryItem};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{LibraryError, Result};
use crate::postscan::{PostScanTask, Progress};
use crate::service::ItemService;
use crate::store::{ItemFilter, ItemRepository, NameCountField};

/// Shared shape of the by-name aggregate validators: make sure an aggregate
/// item exists for every referenced name, then sweep dead aggregates that
/// nothing references anymore (unless manually locked).
async fn validate_name_aggregates(
    items: &Arc<ItemService>,
    kind: ItemKind,
    field: NameCountField,
    progress: &Progress,
    token: &CancellationToken,
) -> Result<()> {
    let counts: HashMap<String, usize> =
        items.repository().get_name_counts(field).await?;

    let total = counts.len().max(1);
    for (index, name) in counts.keys().enumerate() {
        if token.is_cancelled() {
            return Err(LibraryError::Cancelled(format!(
                "{kind} validation cancelled"
            )));
        }
        if kind == ItemKind::MusicArtist {
            items.get_or_create_artist(name, token).await?;
        } else {
            items.create_item_by_name(kind, name, token).await?;
        }
        progress.report(index as f64 / total as f64 * 50.0);
    }

    // Dead sweep: aggregates with zero remaining references.
    let existing = items
        .repository()
        .get_item_list(&ItemFilter::by_kind(kind))
        .await?;
    let total = existing.len().max(1);
    let mut removed = 0usize;
    for (index, aggregate) in existing.iter().enumerate() {
        if token.is_cancelled() {
            return Err(LibraryError::Cancelled(format!(
                "{kind} dead sweep cancelled"
            )));
        }
        if is_dead(aggregate, &counts) {
            debug!(name = aggregate.name.as_str(), %kind, "removing dead aggregate");
            items.delete_item(aggregate.id).await?;
            removed += 1;
        }
        progress.report(50.0 + index as f64 / total as f64 * 50.0);
    }

    if removed > 0 {
        info!(%kind, removed, "dead aggregate sweep complete");
    }
    progress.report(100.0);
    Ok(())
}

fn is_dead(aggregate: &LibraryItem, counts: &HashMap<String, usize>) -> bool {
    if aggregate.is_locked {
        return false;
    }
    !counts
        .keys()
        .any(|name| name.eq_ignore_ascii_case(&aggregate.name))
}

/// Keeps the artist aggregates consistent with the audio items referencing
/// them.
pub struct ArtistsValidator {
    items: Arc<ItemService>,
}

impl ArtistsValidator {
    pub fn new(items: Arc<ItemService>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl PostScanTask for ArtistsValidator {
    fn name(&self) -> &'static str {
        "artists-validator"
    }

    async fn run(
        &self,
        progress: &Progress,
        token: &CancellationToken,
    ) -> Result<()> {
        validate_name_aggregates(
            &self.items,
            ItemKind::MusicArtist,
            NameCountField::Artists,
            progress,
            token,
        )
        .await
    }
}

/// Keeps the studio aggregates consistent with the items referencing them.
pub struct StudiosValidator {
    items: Arc<ItemService>,
}

impl StudiosValidator {
    pub fn new(items: Arc<ItemService>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl PostScanTask for StudiosValidator {
    fn name(&self) -> &'static str {
        "studios-validator"
    }

    async fn run(
        &self,
        progress: &Progress,
        token: &CancellationToken,
    ) -> Result<()> {
        validate_name_aggregates(
            &self.items,
            ItemKind::Studio,
            NameCountField::Studios,
            progress,
            token,
        )
        .await
    }
}

/// Keeps the genre aggregates consistent with the items referencing them.
pub struct GenresValidator {
    items: Arc<ItemService>,
}

impl GenresValidator {
    pub fn new(items: Arc<ItemService>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl PostScanTask for GenresValidator {
    fn name(&self) -> &'static str {
        "genres-validator"
    }

    async fn run(
        &self,
        progress: &Progress,
        token: &CancellationToken,
    ) -> Result<()> {
        validate_name_aggregates(
            &self.items,
            ItemKind::Genre,
            NameCountField::Genres,
            progress,
            token,
        )
        .await
    }
}
