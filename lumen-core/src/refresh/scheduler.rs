use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use lumen_model::{ItemId, ItemKind, LibraryItem, RefreshOptions, RefreshPriority};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{LibraryError, Result};
use crate::service::ItemService;

/// Executor for a single item refresh, supplied by the metadata-provider
/// boundary.
#[async_trait]
pub trait ItemRefresher: Send + Sync {
    async fn refresh_item(
        &self,
        item: &LibraryItem,
        options: &RefreshOptions,
        token: &CancellationToken,
    ) -> Result<()>;

    /// Artist aggregates refresh through a dedicated path that also touches
    /// the albums referencing them.
    async fn refresh_artist(
        &self,
        item: &LibraryItem,
        options: &RefreshOptions,
        token: &CancellationToken,
    ) -> Result<()>;
}

/// Subscriber for refresh lifecycle events. Failures are logged, never
/// propagated.
pub trait RefreshListener: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_started(&self, item_id: ItemId) -> Result<()>;

    fn on_progress(&self, item_id: ItemId, progress: f64) -> Result<()>;

    fn on_completed(&self, item_id: ItemId) -> Result<()>;
}

struct QueuedRefresh {
    priority: RefreshPriority,
    seq: u64,
    item_id: ItemId,
    options: RefreshOptions,
}

impl PartialEq for QueuedRefresh {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedRefresh {}

impl PartialOrd for QueuedRefresh {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRefresh {
    /// Max-heap: higher priority first, FIFO within a priority band.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct SchedulerState {
    queue: BinaryHeap<QueuedRefresh>,
    running: bool,
    disposed: bool,
    next_seq: u64,
}

/// Priority queue of pending item refreshes with a single drain loop.
///
/// At most one drain loop runs at a time regardless of how many enqueue
/// calls race; the running flag is checked and set under the same lock as
/// the queue, so an enqueue arriving just after exhaustion starts a fresh
/// loop rather than being dropped.
pub struct RefreshScheduler {
    state: Mutex<SchedulerState>,
    progress: DashMap<ItemId, f64>,
    items: Arc<ItemService>,
    refresher: Arc<dyn ItemRefresher>,
    listeners: RwLock<Vec<Arc<dyn RefreshListener>>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("active_items", &self.progress.len())
            .finish()
    }
}

impl RefreshScheduler {
    pub fn new(items: Arc<ItemService>, refresher: Arc<dyn ItemRefresher>) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                queue: BinaryHeap::new(),
                running: false,
                disposed: false,
                next_seq: 0,
            }),
            progress: DashMap::new(),
            items,
            refresher,
            listeners: RwLock::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn RefreshListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    /// Queue a refresh and start the drain loop if none is running.
    pub fn queue_refresh(
        self: &Arc<Self>,
        item_id: ItemId,
        options: RefreshOptions,
        priority: RefreshPriority,
    ) {
        let start_drain = {
            let mut state = self.lock_state();
            if state.disposed {
                debug!(item = %item_id, "scheduler disposed; dropping refresh request");
                return;
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.queue.push(QueuedRefresh {
                priority,
                seq,
                item_id,
                options,
            });
            if state.running {
                false
            } else {
                state.running = true;
                true
            }
        };

        if start_drain {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.drain().await;
            });
        }
    }

    /// Number of queued (not yet started) refreshes.
    pub fn pending(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Progress of an in-flight refresh, if any.
    pub fn progress_of(&self, item_id: ItemId) -> Option<f64> {
        self.progress.get(&item_id).map(|p| *p)
    }

    /// Seed progress tracking for an item whose refresh just started.
    pub fn on_refresh_start(&self, item_id: ItemId) {
        self.progress.insert(item_id, 0.0);
        self.each_listener(|l| l.on_started(item_id));
    }

    /// Update progress for an active refresh.
    ///
    /// Reporting progress for an id with no active entry is a programming
    /// error and fails loudly instead of being silently ignored.
    pub fn on_refresh_progress(&self, item_id: ItemId, progress: f64) -> Result<()> {
        let Some(mut entry) = self.progress.get_mut(&item_id) else {
            error!(
                item = %item_id,
                "progress reported for an item with no active refresh"
            );
            return Err(LibraryError::InvalidArgument(format!(
                "no active refresh for item {item_id}"
            )));
        };
        *entry = progress.clamp(0.0, 100.0);
        drop(entry);
        self.each_listener(|l| l.on_progress(item_id, progress));
        Ok(())
    }

    /// Drop progress tracking after completion, failure, or cancellation.
    pub fn on_refresh_complete(&self, item_id: ItemId) {
        self.progress.remove(&item_id);
        self.each_listener(|l| l.on_completed(item_id));
    }

    /// Signal cancellation to the drain loop and refuse further enqueues.
    /// Queued items are left queued, not marked failed.
    pub fn shutdown(&self) {
        self.lock_state().disposed = true;
        self.cancel.cancel();
    }

    async fn drain(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                self.lock_state().running = false;
                return;
            }

            let next = {
                let mut state = self.lock_state();
                match state.queue.pop() {
                    Some(task) => task,
                    None => {
                        // Clearing the flag under the queue lock closes the
                        // race with an enqueue arriving right at exhaustion.
                        state.running = false;
                        return;
                    }
                }
            };

            let item = match self.items.get_item_by_id(next.item_id).await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    // Deleted after queuing; skip silently.
                    debug!(item = %next.item_id, "queued item no longer exists");
                    continue;
                }
                Err(err) => {
                    warn!(item = %next.item_id, error = %err, "failed to load queued item");
                    continue;
                }
            };

            self.on_refresh_start(item.id);
            let result = if item.kind == ItemKind::MusicArtist {
                self.refresher
                    .refresh_artist(&item, &next.options, &self.cancel)
                    .await
            } else {
                self.refresher
                    .refresh_item(&item, &next.options, &self.cancel)
                    .await
            };
            self.on_refresh_complete(item.id);

            match result {
                Ok(()) => {}
                Err(err) if err.is_cancellation() => {
                    debug!(item = %item.id, "refresh cancelled; stopping drain");
                    self.lock_state().running = false;
                    return;
                }
                Err(err) => {
                    error!(item = %item.id, error = %err, "item refresh failed");
                }
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn each_listener(&self, f: impl Fn(&Arc<dyn RefreshListener>) -> Result<()>) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in listeners {
            if let Err(err) = f(&listener) {
                warn!(
                    listener = listener.name(),
                    error = %err,
                    "refresh listener failed"
                );
            }
        }
    }
}
