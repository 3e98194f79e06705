//! Top-level library orchestration: full validation passes, post-scan task
//! sequencing, and episode-number inference.

pub mod monitor;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Datelike;
use lumen_model::{
    DeleteOptions, ItemId, ItemKind, ItemUpdateReason, LibraryItem,
    LibraryOptions, RefreshOptions, RefreshPriority,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{LibraryError, Result};
use crate::fs::FileSystem;
use crate::naming::{self, EpisodePathInfo};
use crate::postscan::{PostScanTask, Progress};
use crate::refresh::RefreshScheduler;
use crate::resolve::PathResolver;
use crate::service::ItemService;
use crate::store::{ItemFilter, ItemRepository};

pub use monitor::{LibraryMonitor, MonitorSuspendGuard};

/// Season assigned to episodes with no season context at all: no number in
/// the name, no season folder, no parent season item. A convention, not a
/// guess.
const DEFAULT_SEASON_NUMBER: i32 = 1;

/// Top-level façade coordinating validation passes, post-scan consistency
/// tasks, and episode-number inference.
///
/// Cascade behaviour is explicit orchestration: this manager calls delete
/// and then runs cleanup itself rather than subscribing to the item
/// service's own events.
pub struct LibraryManager {
    resolver: Arc<PathResolver>,
    items: Arc<ItemService>,
    scheduler: Arc<RefreshScheduler>,
    monitor: Arc<LibraryMonitor>,
    fs: Arc<dyn FileSystem>,
    post_scan_tasks: Vec<Arc<dyn PostScanTask>>,
    /// The physical root folder item, resolved and persisted at startup.
    root: LibraryItem,
}

impl std::fmt::Debug for LibraryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryManager")
            .field("root", &self.root.id)
            .field("post_scan_tasks", &self.post_scan_tasks.len())
            .finish()
    }
}

impl LibraryManager {
    pub fn new(
        resolver: Arc<PathResolver>,
        items: Arc<ItemService>,
        scheduler: Arc<RefreshScheduler>,
        monitor: Arc<LibraryMonitor>,
        fs: Arc<dyn FileSystem>,
        root: LibraryItem,
    ) -> Self {
        Self {
            resolver,
            items,
            scheduler,
            monitor,
            fs,
            post_scan_tasks: Vec::new(),
            root,
        }
    }

    /// Explicit cascading delete: child records first, then the on-disk
    /// location when the options ask for it, then the record itself.
    /// Orchestrated here rather than through event subscription so causality
    /// stays linear.
    ///
    /// A failure removing the primary on-disk path propagates; descendant
    /// records never touch the disk themselves (they live under the primary
    /// path).
    pub async fn delete_item(
        &self,
        id: ItemId,
        options: DeleteOptions,
    ) -> Result<bool> {
        let Some(item) = self.items.retrieve_item(id).await? else {
            return Ok(false);
        };

        let children = self
            .items
            .repository()
            .get_item_list(&ItemFilter::by_parent(id))
            .await?;
        for child in children {
            Box::pin(self.delete_item(
                child.id,
                DeleteOptions {
                    delete_file_location: false,
                },
            ))
            .await?;
        }

        if options.delete_file_location {
            if let Some(path) = item.path.as_deref() {
                match self.fs.entry(path).await? {
                    Some(entry) if entry.is_directory => {
                        self.fs.remove_dir_all(path).await?;
                    }
                    Some(_) => self.fs.remove_file(path).await?,
                    None => {}
                }
            }
        }

        self.items.delete_item_full(id, options, None).await
    }

    /// Post-scan tasks run sequentially in registration order.
    pub fn add_post_scan_task(&mut self, task: Arc<dyn PostScanTask>) {
        self.post_scan_tasks.push(task);
    }

    pub fn root(&self) -> &LibraryItem {
        &self.root
    }

    /// Full library validation pass.
    ///
    /// The real-time monitor is suspended for the duration and resumed by
    /// guard drop, so even a failing pass cannot leave the system
    /// unmonitored.
    pub async fn validate_library(
        &self,
        options: &LibraryOptions,
        progress: &Progress,
        token: &CancellationToken,
    ) -> Result<()> {
        let _guard = self.monitor.suspend_guard();
        info!(root = %self.root.id, "starting library validation");
        progress.report(0.0);

        // Top-level folders first, non-recursive, so the library structure
        // exists before the deep pass.
        self.validate_children_of(&self.root, options, false, token)
            .await?;
        progress.report(10.0);

        self.validate_children_of(&self.root, options, true, token)
            .await?;
        progress.report(60.0);

        self.run_post_scan_tasks(&progress.rescaled(60.0, 95.0), token)
            .await?;

        self.recompute_inherited_data(token).await?;
        progress.report(100.0);
        info!(root = %self.root.id, "library validation complete");
        Ok(())
    }

    /// Reconcile one folder's children against the repository: create new
    /// items, update carried ones, delete records whose entries vanished,
    /// and recurse into child folders when asked to.
    async fn validate_children_of(
        &self,
        parent: &LibraryItem,
        options: &LibraryOptions,
        recursive: bool,
        token: &CancellationToken,
    ) -> Result<()> {
        if token.is_cancelled() {
            return Err(LibraryError::Cancelled(
                "library validation cancelled".to_string(),
            ));
        }

        let resolved = self.resolver.resolve_children(parent, options).await?;
        let existing = self
            .items
            .repository()
            .get_item_list(&ItemFilter::by_parent(parent.id))
            .await?;
        let existing_ids: HashSet<ItemId> =
            existing.iter().map(|i| i.id).collect();
        let resolved_ids: HashSet<ItemId> =
            resolved.iter().map(|i| i.id).collect();

        let mut new_items: Vec<LibraryItem> = resolved
            .iter()
            .filter(|i| !existing_ids.contains(&i.id))
            .cloned()
            .collect();
        for item in &mut new_items {
            if item.kind == ItemKind::Episode {
                self.fill_missing_episode_numbers(item, options, None, false)
                    .await?;
            }
        }
        let carried: Vec<LibraryItem> = resolved
            .iter()
            .filter(|i| existing_ids.contains(&i.id))
            .cloned()
            .collect();

        if !new_items.is_empty() {
            self.items.create_items(&new_items, token).await?;
            for item in &new_items {
                // Metadata refresh drains independently of the scan.
                self.scheduler.queue_refresh(
                    item.id,
                    RefreshOptions::default(),
                    RefreshPriority::Normal,
                );
            }
        }
        if !carried.is_empty() {
            self.items
                .update_items(&carried, ItemUpdateReason::LibraryScan, token)
                .await?;
        }

        for stale in existing.iter().filter(|i| !resolved_ids.contains(&i.id)) {
            debug!(item = %stale.id, name = stale.name.as_str(), "removing item gone from disk");
            self.items
                .delete_item_full(
                    stale.id,
                    DeleteOptions::default(),
                    Some(parent.clone()),
                )
                .await?;
        }

        if recursive {
            for child in resolved.iter().filter(|i| i.is_folder()) {
                let result = Box::pin(
                    self.validate_children_of(child, options, true, token),
                )
                .await;
                match result {
                    Ok(()) => {}
                    Err(err) if err.is_cancellation() => return Err(err),
                    Err(err) => {
                        // One broken subtree must not halt unrelated items.
                        error!(
                            folder = %child.id,
                            path = ?child.path,
                            error = %err,
                            "child validation failed; continuing"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Run the registered post-scan tasks sequentially, rescaling each
    /// task's progress into its slot of the overall range. Cancellation
    /// aborts the sequence; any other failure is logged and the sequence
    /// continues.
    pub async fn run_post_scan_tasks(
        &self,
        progress: &Progress,
        token: &CancellationToken,
    ) -> Result<()> {
        let count = self.post_scan_tasks.len();
        if count == 0 {
            progress.report(100.0);
            return Ok(());
        }

        let slot = 100.0 / count as f64;
        for (index, task) in self.post_scan_tasks.iter().enumerate() {
            let start = slot * index as f64;
            let task_progress = progress.rescaled(start, start + slot);
            match task.run(&task_progress, token).await {
                Ok(()) => debug!(task = task.name(), "post-scan task complete"),
                Err(err) if err.is_cancellation() => {
                    return Err(err);
                }
                Err(err) => {
                    error!(task = task.name(), error = %err, "post-scan task failed");
                }
            }
        }
        progress.report(100.0);
        Ok(())
    }

    /// Re-derive inherited lock flags from the parent chain. Runs
    /// unconditionally after the post-scan sequence.
    pub async fn recompute_inherited_data(
        &self,
        token: &CancellationToken,
    ) -> Result<()> {
        let all = self
            .items
            .repository()
            .get_item_list(&ItemFilter::default())
            .await?;
        let by_id: HashMap<ItemId, &LibraryItem> =
            all.iter().map(|i| (i.id, i)).collect();

        let mut changed = Vec::new();
        for item in &all {
            if item.is_locked {
                continue;
            }
            let mut cursor = item.parent_id;
            let mut seen = vec![item.id];
            while let Some(id) = cursor {
                if seen.contains(&id) {
                    break;
                }
                seen.push(id);
                let Some(parent) = by_id.get(&id) else { break };
                if parent.is_locked {
                    let mut updated = item.clone();
                    updated.is_locked = true;
                    changed.push(updated);
                    break;
                }
                cursor = parent.parent_id;
            }
        }

        if !changed.is_empty() {
            info!(count = changed.len(), "propagating inherited lock flags");
            self.items
                .update_items(
                    &changed,
                    ItemUpdateReason::InheritedDataRecompute,
                    token,
                )
                .await?;
        }
        Ok(())
    }

    /// Derive missing season/episode numbers from the file path (or parent
    /// folder), optionally overridden by embedded container metadata when
    /// the library enables it and the container supports it.
    ///
    /// Date-based numbering clears the ordinal fields and fills premiere
    /// date and production year instead; ordinal numbering fills
    /// index/end/season only when absent or when a forced refresh asked for
    /// a re-derive. Returns whether the item changed.
    pub async fn fill_missing_episode_numbers(
        &self,
        item: &mut LibraryItem,
        options: &LibraryOptions,
        embedded: Option<&EpisodePathInfo>,
        force: bool,
    ) -> Result<bool> {
        if item.kind != ItemKind::Episode {
            return Ok(false);
        }
        let Some(path) = item.path.clone() else {
            return Ok(false);
        };

        let container_supports_embedded = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mp4"));
        let parsed = if options.enable_embedded_episode_infos
            && container_supports_embedded
            && embedded.is_some()
        {
            embedded.cloned()
        } else {
            naming::parse_episode(&path)
        };

        let mut changed = false;
        if let Some(info) = parsed {
            if info.is_date_based() {
                if item.premiere_date.is_none() || force {
                    item.index_number = None;
                    item.index_number_end = None;
                    item.premiere_date = info.air_date;
                    item.production_year =
                        info.air_date.map(|date| date.year());
                    changed = true;
                }
            } else {
                if item.index_number.is_none() || force {
                    item.index_number = info.episode.map(|e| e as i32);
                    changed = true;
                }
                if item.index_number_end.is_none() || force {
                    item.index_number_end =
                        info.end_episode.map(|e| e as i32);
                    changed = true;
                }
                if item.parent_index_number.is_none() || force {
                    item.parent_index_number =
                        info.season.map(|s| s as i32);
                    changed = true;
                }
            }
        }

        if item.parent_index_number.is_none() && item.premiere_date.is_none() {
            item.parent_index_number =
                Some(self.season_number_from_parent(item).await?);
            changed = true;
        }
        Ok(changed)
    }

    /// Season fallback chain: the parent season item's index, then the
    /// default season.
    async fn season_number_from_parent(&self, item: &LibraryItem) -> Result<i32> {
        if let Some(parent_id) = item.parent_id {
            if let Some(parent) = self.items.get_item_by_id(parent_id).await? {
                if parent.kind == ItemKind::Season {
                    if let Some(index) = parent.index_number {
                        return Ok(index);
                    }
                }
            }
        }
        warn!(
            item = %item.id,
            "no season context; defaulting to season {DEFAULT_SEASON_NUMBER}"
        );
        Ok(DEFAULT_SEASON_NUMBER)
    }
}
