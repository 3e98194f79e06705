use std::sync::Arc;

use async_trait::async_trait;
use lumen_model::DeleteOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{LibraryError, Result};
use crate::fs::FileSystem;
use crate::postscan::{PostScanTask, Progress};
use crate::service::ItemService;
use crate::store::{ItemFilter, ItemRepository};

/// Deletes items whose backing path no longer exists on disk.
///
/// Complements per-folder reconciliation: it also catches items whose whole
/// parent chain vanished between scans. Virtual and by-name items carry no
/// path and are never touched.
pub struct DeadItemsValidator {
    items: Arc<ItemService>,
    fs: Arc<dyn FileSystem>,
}

impl DeadItemsValidator {
    pub fn new(items: Arc<ItemService>, fs: Arc<dyn FileSystem>) -> Self {
        Self { items, fs }
    }
}

#[async_trait]
impl PostScanTask for DeadItemsValidator {
    fn name(&self) -> &'static str {
        "dead-items-validator"
    }

    async fn run(
        &self,
        progress: &Progress,
        token: &CancellationToken,
    ) -> Result<()> {
        let all = self
            .items
            .repository()
            .get_item_list(&ItemFilter::default())
            .await?;

        let total = all.len().max(1);
        let mut removed = 0usize;
        for (index, item) in all.iter().enumerate() {
            if token.is_cancelled() {
                return Err(LibraryError::Cancelled(
                    "dead item sweep cancelled".to_string(),
                ));
            }
            // By-name aggregates live at synthetic paths; their lifecycle
            // belongs to the name validators.
            if item.kind.is_by_name() {
                continue;
            }
            if let Some(path) = item.path.as_deref() {
                if self.fs.entry(path).await?.is_none() {
                    self.items
                        .delete_item_with_options(
                            item.id,
                            DeleteOptions {
                                delete_file_location: false,
                            },
                        )
                        .await?;
                    removed += 1;
                }
            }
            progress.report(index as f64 / total as f64 * 100.0);
        }

        if removed > 0 {
            info!(removed, "dead item sweep removed orphaned records");
        }
        progress.report(100.0);
        Ok(())
    }
}
