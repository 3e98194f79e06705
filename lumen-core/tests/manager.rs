mod support;

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use lumen_core::config::{IdentityConfig, ServerPaths};
use lumen_core::error::{LibraryError, Result};
use lumen_core::fs::StdFileSystem;
use lumen_core::identity::IdGenerator;
use lumen_core::images::ImageRefresher;
use lumen_core::manager::{LibraryManager, LibraryMonitor};
use lumen_core::naming::EpisodePathInfo;
use lumen_core::postscan::{PostScanTask, Progress};
use lumen_core::providers::ImageFetcher;
use lumen_core::refresh::RefreshScheduler;
use lumen_core::resolve::{IgnoreRuleSet, PathResolver, ResolverChain};
use lumen_core::service::ItemService;
use lumen_model::{
    ImageKind, ItemId, ItemImage, ItemKind, LibraryItem, LibraryOptions,
};
use support::{item_service, NoopRefresher, DATA_ROOT};

fn manager_over(items: Arc<ItemService>) -> LibraryManager {
    let identity = Arc::new(IdGenerator::new(
        ServerPaths::new(DATA_ROOT),
        IdentityConfig::default(),
    ));
    let resolver = Arc::new(PathResolver::new(
        Arc::new(StdFileSystem::new()),
        Arc::new(ResolverChain::standard()),
        Arc::new(IgnoreRuleSet::standard()),
        identity,
    ));
    let scheduler = Arc::new(RefreshScheduler::new(
        items.clone(),
        Arc::new(NoopRefresher),
    ));
    let mut root = LibraryItem::new(ItemKind::Folder, "root").with_path("/media");
    root.id = ItemId::random();
    LibraryManager::new(
        resolver,
        items,
        scheduler,
        Arc::new(LibraryMonitor::new()),
        Arc::new(StdFileSystem::new()),
        root,
    )
}

fn episode(path: &str) -> LibraryItem {
    let mut item = LibraryItem::new(ItemKind::Episode, "").with_path(path);
    item.id = ItemId::random();
    item
}

#[tokio::test]
async fn ordinal_numbers_are_derived_from_the_filename() {
    let (items, _repo) = item_service();
    let manager = manager_over(items);
    let options = LibraryOptions::default();

    let mut item = episode("/tv/Show/Show S02E05.mkv");
    let changed = manager
        .fill_missing_episode_numbers(&mut item, &options, None, false)
        .await
        .unwrap();
    assert!(changed);
    assert_eq!(item.index_number, Some(5));
    assert_eq!(item.parent_index_number, Some(2));
}

#[tokio::test]
async fn existing_numbers_survive_unless_forced() {
    let (items, _repo) = item_service();
    let manager = manager_over(items);
    let options = LibraryOptions::default();

    let mut item = episode("/tv/Show/Show S02E05.mkv");
    item.index_number = Some(42);
    item.parent_index_number = Some(9);
    manager
        .fill_missing_episode_numbers(&mut item, &options, None, false)
        .await
        .unwrap();
    assert_eq!(item.index_number, Some(42));
    assert_eq!(item.parent_index_number, Some(9));

    manager
        .fill_missing_episode_numbers(&mut item, &options, None, true)
        .await
        .unwrap();
    assert_eq!(item.index_number, Some(5), "forced refresh re-derives");
    assert_eq!(item.parent_index_number, Some(2));
}

#[tokio::test]
async fn date_based_names_fill_premiere_date_instead_of_ordinals() {
    let (items, _repo) = item_service();
    let manager = manager_over(items);
    let options = LibraryOptions::default();

    let mut item = episode("/tv/Daily/2019.03.01.mkv");
    item.index_number = Some(7);
    manager
        .fill_missing_episode_numbers(&mut item, &options, None, true)
        .await
        .unwrap();
    assert_eq!(item.index_number, None, "ordinals cleared for date-based shows");
    assert_eq!(
        item.premiere_date,
        chrono::NaiveDate::from_ymd_opt(2019, 3, 1)
    );
    assert_eq!(item.production_year, Some(2019));
}

#[tokio::test]
async fn season_falls_back_to_parent_season_item_then_default() {
    let (items, _repo) = item_service();
    let token = CancellationToken::new();

    let mut season = LibraryItem::new(ItemKind::Season, "Season 4")
        .with_path("/tv/Show/Season 4");
    season.id = ItemId::random();
    season.index_number = Some(4);
    items.create_item(season.clone(), &token).await.unwrap();

    let manager = manager_over(items);
    let options = LibraryOptions::default();

    // No digits anywhere in the name: only the parent gives a season.
    let mut item = episode("/tv/Show/Season 4/finale.mkv");
    item.parent_id = Some(season.id);
    manager
        .fill_missing_episode_numbers(&mut item, &options, None, false)
        .await
        .unwrap();
    assert_eq!(item.parent_index_number, Some(4));

    let mut orphan = episode("/tv/Show/finale.mkv");
    manager
        .fill_missing_episode_numbers(&mut orphan, &options, None, false)
        .await
        .unwrap();
    assert_eq!(
        orphan.parent_index_number,
        Some(1),
        "no season context defaults to season 1"
    );
}

#[tokio::test]
async fn embedded_info_overrides_only_when_enabled_and_supported() {
    let (items, _repo) = item_service();
    let manager = manager_over(items);

    let embedded = EpisodePathInfo {
        season: Some(7),
        episode: Some(9),
        end_episode: None,
        air_date: None,
    };

    // Option disabled: filename wins.
    let mut item = episode("/tv/Show/Show S02E05.mp4");
    let options = LibraryOptions::default();
    manager
        .fill_missing_episode_numbers(&mut item, &options, Some(&embedded), false)
        .await
        .unwrap();
    assert_eq!(item.index_number, Some(5));

    // Option enabled and mp4 container: embedded wins.
    let mut item = episode("/tv/Show/Show S02E05.mp4");
    let mut options = LibraryOptions::default();
    options.enable_embedded_episode_infos = true;
    manager
        .fill_missing_episode_numbers(&mut item, &options, Some(&embedded), false)
        .await
        .unwrap();
    assert_eq!(item.index_number, Some(9));
    assert_eq!(item.parent_index_number, Some(7));

    // Unsupported container: filename wins even with the option on.
    let mut item = episode("/tv/Show/Show S02E05.mkv");
    manager
        .fill_missing_episode_numbers(&mut item, &options, Some(&embedded), false)
        .await
        .unwrap();
    assert_eq!(item.index_number, Some(5));
}

struct CountingTask {
    runs: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl PostScanTask for CountingTask {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn run(
        &self,
        progress: &Progress,
        _token: &CancellationToken,
    ) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        progress.report(100.0);
        if self.fail {
            return Err(LibraryError::Internal("task broke".to_string()));
        }
        Ok(())
    }
}

struct CancellingTask;

#[async_trait]
impl PostScanTask for CancellingTask {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    async fn run(
        &self,
        _progress: &Progress,
        _token: &CancellationToken,
    ) -> Result<()> {
        Err(LibraryError::Cancelled("stop everything".to_string()))
    }
}

#[tokio::test]
async fn failing_tasks_do_not_stop_the_sequence_but_cancellation_does() {
    let (items, _repo) = item_service();
    let runs = Arc::new(AtomicUsize::new(0));

    let mut manager = manager_over(items.clone());
    manager.add_post_scan_task(Arc::new(CountingTask {
        runs: runs.clone(),
        fail: true,
    }));
    manager.add_post_scan_task(Arc::new(CountingTask {
        runs: runs.clone(),
        fail: false,
    }));
    let token = CancellationToken::new();
    manager
        .run_post_scan_tasks(&Progress::noop(), &token)
        .await
        .unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2, "failure continues the sequence");

    let runs_after_cancel = Arc::new(AtomicUsize::new(0));
    let mut manager = manager_over(items);
    manager.add_post_scan_task(Arc::new(CancellingTask));
    manager.add_post_scan_task(Arc::new(CountingTask {
        runs: runs_after_cancel.clone(),
        fail: false,
    }));
    let result = manager.run_post_scan_tasks(&Progress::noop(), &token).await;
    assert!(matches!(result, Err(LibraryError::Cancelled(_))));
    assert_eq!(
        runs_after_cancel.load(Ordering::SeqCst),
        0,
        "cancellation aborts the remaining tasks"
    );
}

struct CopyFetcher;

#[async_trait]
impl ImageFetcher for CopyFetcher {
    async fn fetch_to_local(
        &self,
        item: &LibraryItem,
        image: &ItemImage,
    ) -> Result<std::path::PathBuf> {
        // "Download" = decode the remote url as a local source path.
        let source = image
            .remote_url
            .as_deref()
            .ok_or_else(|| LibraryError::InvalidArgument("no url".into()))?;
        let target = std::path::PathBuf::from(format!(
            "{}.fetched-{}.png",
            source.trim_start_matches("file://"),
            item.id
        ));
        tokio::fs::copy(source.trim_start_matches("file://"), &target).await?;
        Ok(target)
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    let buffer = image::RgbaImage::new(width, height);
    image::DynamicImage::ImageRgba8(buffer)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[tokio::test]
async fn image_refresh_fetches_probes_and_hashes() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("poster.png");
    std::fs::write(&source, png_bytes(2, 3)).unwrap();

    let refresher = ImageRefresher::new(
        Arc::new(StdFileSystem::new()),
        Arc::new(CopyFetcher),
    );

    let mut item = LibraryItem::new(ItemKind::Movie, "Heat (1995)");
    item.id = ItemId::random();
    item.images.push(ItemImage::remote(
        ImageKind::Primary,
        format!("file://{}", source.display()),
    ));

    let changed = refresher.refresh_item_images(&mut item).await.unwrap();
    assert!(changed);

    let refreshed = &item.images[0];
    assert!(refreshed.path.is_some());
    assert_eq!(refreshed.width, Some(2));
    assert_eq!(refreshed.height, Some(3));
    assert!(refreshed.content_hash.is_some());
    assert!(refreshed.date_modified.is_some());

    // A second pass sees nothing outdated.
    let changed_again = refresher.refresh_item_images(&mut item).await.unwrap();
    assert!(!changed_again);
}

#[tokio::test]
async fn broken_fetches_leave_other_images_alone() {
    struct FailingFetcher;

    #[async_trait]
    impl ImageFetcher for FailingFetcher {
        async fn fetch_to_local(
            &self,
            _item: &LibraryItem,
            _image: &ItemImage,
        ) -> Result<std::path::PathBuf> {
            Err(LibraryError::Internal("provider down".to_string()))
        }
    }

    let refresher = ImageRefresher::new(
        Arc::new(StdFileSystem::new()),
        Arc::new(FailingFetcher),
    );

    let mut item = LibraryItem::new(ItemKind::Movie, "Heat (1995)");
    item.id = ItemId::random();
    item.images.push(ItemImage::remote(
        ImageKind::Primary,
        "https://example.invalid/poster.jpg",
    ));

    let changed = refresher.refresh_item_images(&mut item).await.unwrap();
    assert!(!changed);
    assert!(item.images[0].path.is_none());
}
