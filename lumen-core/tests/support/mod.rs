//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use lumen_core::config::{IdentityConfig, ServerPaths};
use lumen_core::error::Result;
use lumen_core::identity::IdGenerator;
use lumen_core::refresh::ItemRefresher;
use lumen_core::query::UserViewPolicy;
use lumen_core::service::ItemService;
use lumen_core::store::InMemoryItemRepository;
use lumen_model::{
    ItemId, LibraryItem, RefreshOptions, UserId,
};

pub const DATA_ROOT: &str = "/var/lib/lumen";

/// Route library tracing through the test harness; `RUST_LOG` controls
/// verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn identity() -> Arc<IdGenerator> {
    Arc::new(IdGenerator::new(
        ServerPaths::new(DATA_ROOT),
        IdentityConfig::default(),
    ))
}

/// Item service over a fresh in-memory repository.
pub fn item_service() -> (Arc<ItemService>, Arc<InMemoryItemRepository>) {
    init_tracing();
    let repository = Arc::new(InMemoryItemRepository::new());
    let service = Arc::new(ItemService::new(
        repository.clone(),
        identity(),
        ServerPaths::new(DATA_ROOT),
    ));
    (service, repository)
}

/// Refresher that records processing order and tracks concurrency. Each
/// item waits for a gate permit, so tests can hold the drain loop open
/// while enqueuing.
pub struct GatedRefresher {
    pub order: Mutex<Vec<ItemId>>,
    pub artist_refreshes: Mutex<Vec<ItemId>>,
    pub gate: Arc<Semaphore>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl GatedRefresher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            order: Mutex::new(Vec::new()),
            artist_refreshes: Mutex::new(Vec::new()),
            gate: Arc::new(Semaphore::new(0)),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    pub fn open(&self, permits: usize) {
        self.gate.add_permits(permits);
    }

    pub fn processed(&self) -> Vec<ItemId> {
        self.order.lock().unwrap().clone()
    }

    async fn record(&self, item: &LibraryItem) -> Result<()> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .expect("gate semaphore closed");
        self.order.lock().unwrap().push(item.id);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ItemRefresher for GatedRefresher {
    async fn refresh_item(
        &self,
        item: &LibraryItem,
        _options: &RefreshOptions,
        _token: &CancellationToken,
    ) -> Result<()> {
        self.record(item).await
    }

    async fn refresh_artist(
        &self,
        item: &LibraryItem,
        _options: &RefreshOptions,
        _token: &CancellationToken,
    ) -> Result<()> {
        self.artist_refreshes.lock().unwrap().push(item.id);
        self.record(item).await
    }
}

/// Refresher that completes immediately.
pub struct NoopRefresher;

#[async_trait]
impl ItemRefresher for NoopRefresher {
    async fn refresh_item(
        &self,
        _item: &LibraryItem,
        _options: &RefreshOptions,
        _token: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    async fn refresh_artist(
        &self,
        _item: &LibraryItem,
        _options: &RefreshOptions,
        _token: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }
}

/// Fixed view policy: every user sees the configured views and everything
/// is visible.
pub struct StaticViewPolicy {
    pub views: Vec<LibraryItem>,
}

impl StaticViewPolicy {
    pub fn with_views(views: Vec<LibraryItem>) -> Arc<Self> {
        Arc::new(Self { views })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self { views: Vec::new() })
    }
}

#[async_trait]
impl UserViewPolicy for StaticViewPolicy {
    async fn views_for_user(&self, _user_id: UserId) -> Result<Vec<LibraryItem>> {
        Ok(self.views.clone())
    }

    async fn can_see(&self, _user_id: UserId, _item: &LibraryItem) -> bool {
        true
    }

    async fn groups_into_view(&self, _user_id: UserId, _folder_id: ItemId) -> bool {
        true
    }
}
