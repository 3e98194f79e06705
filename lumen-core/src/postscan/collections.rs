use std::sync::Arc;

use async_trait::async_trait;
use lumen_model::ItemKind;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{LibraryError, Result};
use crate::postscan::{PostScanTask, Progress};
use crate::service::ItemService;
use crate::store::{ItemFilter, ItemRepository};

/// Sweeps collection (box set) aggregates whose membership has emptied out.
pub struct CollectionsValidator {
    items: Arc<ItemService>,
}

impl CollectionsValidator {
    pub fn new(items: Arc<ItemService>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl PostScanTask for CollectionsValidator {
    fn name(&self) -> &'static str {
        "collections-validator"
    }

    async fn run(
        &self,
        progress: &Progress,
        token: &CancellationToken,
    ) -> Result<()> {
        let repository: &Arc<dyn ItemRepository> = self.items.repository();
        let collections = repository
            .get_item_list(&ItemFilter::by_kind(ItemKind::BoxSet))
            .await?;

        let total = collections.len().max(1);
        for (index, collection) in collections.iter().enumerate() {
            if token.is_cancelled() {
                return Err(LibraryError::Cancelled(
                    "collections validation cancelled".to_string(),
                ));
            }
            let members = repository
                .get_count(&ItemFilter::by_parent(collection.id))
                .await?;
            if members == 0 && !collection.is_locked {
                debug!(
                    name = collection.name.as_str(),
                    "removing empty collection"
                );
                self.items.delete_item(collection.id).await?;
            }
            progress.report(index as f64 / total as f64 * 100.0);
        }
        progress.report(100.0);
        Ok(())
    }
}
