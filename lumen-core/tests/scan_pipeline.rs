mod support;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use lumen_core::config::{IdentityConfig, ServerPaths};
use lumen_core::fs::StdFileSystem;
use lumen_core::identity::IdGenerator;
use lumen_core::manager::{LibraryManager, LibraryMonitor};
use lumen_core::postscan::{
    ArtistsValidator, CollectionsValidator, DeadItemsValidator,
    GenresValidator, Progress, StudiosValidator,
};
use lumen_core::refresh::RefreshScheduler;
use lumen_core::resolve::{IgnoreRuleSet, PathResolver, ResolverChain};
use lumen_core::service::ItemService;
use lumen_core::store::{InMemoryItemRepository, ItemFilter, ItemRepository};
use lumen_model::{
    CollectionKind, FileSystemEntry, ItemKind, LibraryItem, LibraryOptions,
};
use support::{NoopRefresher, DATA_ROOT};

struct Stack {
    resolver: Arc<PathResolver>,
    items: Arc<ItemService>,
    repository: Arc<InMemoryItemRepository>,
    manager: LibraryManager,
}

/// Wire the full pipeline over a real temp directory.
async fn stack_for(root: &Path) -> Stack {
    support::init_tracing();
    let fs: Arc<StdFileSystem> = Arc::new(StdFileSystem::new());
    let identity = Arc::new(IdGenerator::new(
        ServerPaths::new(DATA_ROOT),
        IdentityConfig::default(),
    ));
    let mut resolver = PathResolver::new(
        fs.clone(),
        Arc::new(ResolverChain::standard()),
        Arc::new(IgnoreRuleSet::standard()),
        identity.clone(),
    );
    resolver.set_content_type(root.join("Movies"), CollectionKind::Movies);
    resolver.set_content_type(root.join("TV"), CollectionKind::TvShows);
    resolver.set_content_type(root.join("Music"), CollectionKind::Music);
    let resolver = Arc::new(resolver);

    let repository = Arc::new(InMemoryItemRepository::new());
    let items = Arc::new(ItemService::new(
        repository.clone(),
        identity.clone(),
        ServerPaths::new(DATA_ROOT),
    ));
    let scheduler = Arc::new(RefreshScheduler::new(
        items.clone(),
        Arc::new(NoopRefresher),
    ));
    let monitor = Arc::new(LibraryMonitor::new());

    // The physical root item, resolved and persisted up front.
    let root_entry = FileSystemEntry::new(root, true);
    let root_item = resolver
        .resolve_path(&root_entry, None, &LibraryOptions::default())
        .await
        .unwrap()
        .expect("root should resolve to a folder");
    let token = CancellationToken::new();
    items.create_item(root_item.clone(), &token).await.unwrap();

    let mut manager = LibraryManager::new(
        resolver.clone(),
        items.clone(),
        scheduler,
        monitor,
        fs.clone(),
        root_item,
    );
    manager.add_post_scan_task(Arc::new(ArtistsValidator::new(items.clone())));
    manager.add_post_scan_task(Arc::new(StudiosValidator::new(items.clone())));
    manager.add_post_scan_task(Arc::new(GenresValidator::new(items.clone())));
    manager
        .add_post_scan_task(Arc::new(CollectionsValidator::new(items.clone())));
    manager.add_post_scan_task(Arc::new(DeadItemsValidator::new(
        items.clone(),
        fs.clone(),
    )));

    Stack {
        resolver,
        items,
        repository,
        manager,
    }
}

fn write_media(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"not actually a video, but nonzero").unwrap();
}

fn seed_tree(root: &Path) {
    write_media(&root.join("Movies/Heat (1995).mkv"));
    write_media(&root.join("Movies/Big Movie (1999) part1.mkv"));
    write_media(&root.join("Movies/Big Movie (1999) part2.mkv"));
    fs::write(root.join("Movies/.DS_Store"), b"junk").unwrap();
    write_media(&root.join("TV/The Wire/Season 01/The Wire S01E01.mkv"));
    write_media(&root.join("Music/Nina Simone/Pastel Blues/01 Be My Husband.flac"));
}

async fn items_of_kind(stack: &Stack, kind: ItemKind) -> Vec<LibraryItem> {
    stack
        .repository
        .get_item_list(&ItemFilter::by_kind(kind))
        .await
        .unwrap()
}

#[tokio::test]
async fn full_scan_resolves_the_tree_into_typed_items() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    seed_tree(tmp.path());
    let stack = stack_for(tmp.path()).await;
    let token = CancellationToken::new();

    stack
        .manager
        .validate_library(&LibraryOptions::default(), &Progress::noop(), &token)
        .await
        .unwrap();

    let movies = items_of_kind(&stack, ItemKind::Movie).await;
    let mut movie_names: Vec<&str> =
        movies.iter().map(|m| m.name.as_str()).collect();
    movie_names.sort();
    assert_eq!(movie_names, vec!["Big Movie (1999)", "Heat (1995)"]);

    let series = items_of_kind(&stack, ItemKind::Series).await;
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].name, "The Wire");

    let seasons = items_of_kind(&stack, ItemKind::Season).await;
    assert_eq!(seasons.len(), 1);
    assert_eq!(seasons[0].index_number, Some(1));
    assert_eq!(seasons[0].parent_id, Some(series[0].id));

    let episodes = items_of_kind(&stack, ItemKind::Episode).await;
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].index_number, Some(1));
    assert_eq!(episodes[0].parent_index_number, Some(1));

    let tracks = items_of_kind(&stack, ItemKind::AudioTrack).await;
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].artists, vec!["Nina Simone".to_string()]);

    // The artist resolved from disk survives the validator untouched.
    let artists = items_of_kind(&stack, ItemKind::MusicArtist).await;
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name, "Nina Simone");
    assert!(!artists[0].accessed_by_name);

    // Junk files resolve to nothing.
    let all = stack
        .repository
        .get_item_list(&ItemFilter::default())
        .await
        .unwrap();
    assert!(all.iter().all(|i| i.name != ".DS_Store"));
}

#[tokio::test]
async fn ignore_file_vetoes_the_whole_subtree() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    write_media(&tmp.path().join("Movies/Keep/movie.mkv"));
    write_media(&tmp.path().join("Movies/Skip/movie two.mkv"));
    fs::write(tmp.path().join("Movies/Skip/.ignore"), b"").unwrap();
    let stack = stack_for(tmp.path()).await;
    let token = CancellationToken::new();

    stack
        .manager
        .validate_library(&LibraryOptions::default(), &Progress::noop(), &token)
        .await
        .unwrap();

    let movies = items_of_kind(&stack, ItemKind::Movie).await;
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].name, "movie");

    let folders = items_of_kind(&stack, ItemKind::Folder).await;
    assert!(
        folders.iter().all(|f| f.name != "Skip"),
        "the vetoed directory itself must not resolve"
    );
}

#[tokio::test]
async fn lock_marker_in_path_locks_the_subtree() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    write_media(&tmp.path().join("Movies/Archive [dontfetchmeta]/old.mkv"));
    write_media(&tmp.path().join("Movies/Open/new.mkv"));
    let stack = stack_for(tmp.path()).await;
    let token = CancellationToken::new();

    stack
        .manager
        .validate_library(&LibraryOptions::default(), &Progress::noop(), &token)
        .await
        .unwrap();

    let movies = items_of_kind(&stack, ItemKind::Movie).await;
    let old = movies.iter().find(|m| m.name == "old").unwrap();
    let new = movies.iter().find(|m| m.name == "new").unwrap();
    assert!(old.is_locked);
    assert!(!new.is_locked);
}

#[tokio::test]
async fn lock_is_inherited_from_an_already_locked_parent() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    write_media(&tmp.path().join("Movies/Plain/file.mkv"));
    let stack = stack_for(tmp.path()).await;

    let mut parent = LibraryItem::new(ItemKind::Folder, "Plain")
        .with_path(tmp.path().join("Movies/Plain"));
    parent.id = lumen_model::ItemId::random();
    parent.is_locked = true;

    let mut entry = FileSystemEntry::new(tmp.path().join("Movies/Plain/file.mkv"), false);
    // Mirror the non-empty file written to disk above; a zero-length entry is
    // (correctly) dropped by the empty-media ignore rule before resolution.
    entry.size = 1;
    let mut options = LibraryOptions::default();
    options.collection_kind = Some(CollectionKind::Movies);
    let item = stack
        .resolver
        .resolve_path(&entry, Some(&parent), &options)
        .await
        .unwrap()
        .unwrap();
    assert!(item.is_locked, "lock must inherit downward");
}

#[tokio::test]
async fn rescan_reconciles_deleted_files() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    seed_tree(tmp.path());
    let stack = stack_for(tmp.path()).await;
    let token = CancellationToken::new();
    let options = LibraryOptions::default();

    stack
        .manager
        .validate_library(&options, &Progress::noop(), &token)
        .await
        .unwrap();
    assert_eq!(items_of_kind(&stack, ItemKind::Movie).await.len(), 2);

    fs::remove_file(tmp.path().join("Movies/Heat (1995).mkv")).unwrap();
    stack
        .manager
        .validate_library(&options, &Progress::noop(), &token)
        .await
        .unwrap();

    let movies = items_of_kind(&stack, ItemKind::Movie).await;
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].name, "Big Movie (1999)");
}

#[tokio::test]
async fn dead_by_name_aggregates_are_swept() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    seed_tree(tmp.path());
    let stack = stack_for(tmp.path()).await;
    let token = CancellationToken::new();

    // An artist nothing references anymore.
    let ghost = stack
        .items
        .get_or_create_artist("Ghost Artist", &token)
        .await
        .unwrap();

    stack
        .manager
        .validate_library(&LibraryOptions::default(), &Progress::noop(), &token)
        .await
        .unwrap();

    assert!(stack.items.retrieve_item(ghost.id).await.unwrap().is_none());
    let artists = items_of_kind(&stack, ItemKind::MusicArtist).await;
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name, "Nina Simone");
}

#[tokio::test]
async fn cascading_delete_reaches_children_and_disk() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    seed_tree(tmp.path());
    let stack = stack_for(tmp.path()).await;
    let token = CancellationToken::new();

    stack
        .manager
        .validate_library(&LibraryOptions::default(), &Progress::noop(), &token)
        .await
        .unwrap();

    let series = items_of_kind(&stack, ItemKind::Series).await;
    let removed = stack
        .manager
        .delete_item(
            series[0].id,
            lumen_model::DeleteOptions {
                delete_file_location: true,
            },
        )
        .await
        .unwrap();
    assert!(removed);

    assert!(items_of_kind(&stack, ItemKind::Series).await.is_empty());
    assert!(items_of_kind(&stack, ItemKind::Season).await.is_empty());
    assert!(items_of_kind(&stack, ItemKind::Episode).await.is_empty());
    assert!(!tmp.path().join("TV/The Wire").exists());
}

#[tokio::test]
async fn rescans_are_identity_stable() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    seed_tree(tmp.path());
    let stack = stack_for(tmp.path()).await;
    let token = CancellationToken::new();
    let options = LibraryOptions::default();

    stack
        .manager
        .validate_library(&options, &Progress::noop(), &token)
        .await
        .unwrap();
    let first: Vec<_> = items_of_kind(&stack, ItemKind::Movie)
        .await
        .into_iter()
        .map(|m| m.id)
        .collect();

    stack
        .manager
        .validate_library(&options, &Progress::noop(), &token)
        .await
        .unwrap();
    let second: Vec<_> = items_of_kind(&stack, ItemKind::Movie)
        .await
        .into_iter()
        .map(|m| m.id)
        .collect();

    assert_eq!(first, second, "re-resolving the same paths re-derives the same ids");
}

#[tokio::test]
async fn shortcut_targets_replace_their_shortcut_files() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    let target = tmp.path().join("elsewhere/Extra Movies");
    write_media(&target.join("Stashed.mkv"));
    fs::create_dir_all(tmp.path().join("root")).unwrap();
    fs::write(
        tmp.path().join("root/extra.mblink"),
        target.to_string_lossy().as_bytes(),
    )
    .unwrap();

    let stack = stack_for(&tmp.path().join("root")).await;
    let entry = FileSystemEntry::new(tmp.path().join("root"), true);
    let root = stack
        .resolver
        .resolve_path(&entry, None, &LibraryOptions::default())
        .await
        .unwrap();
    // Root resolution survives a shortcut-only tree; the shortcut itself is
    // consumed during enumeration rather than resolved as an item.
    assert!(root.is_some());
}

#[tokio::test]
async fn normalize_root_path_list_collapses_nested_mounts() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    let stack = stack_for(tmp.path()).await;

    let entries = vec![
        FileSystemEntry::new("/root/movies", true),
        FileSystemEntry::new("/root/movies/extras", true),
        FileSystemEntry::new("/ROOT/MOVIES", true),
        FileSystemEntry::new("/root/shows", true),
        FileSystemEntry::new("/root/loose.mkv", false),
    ];
    let normalized = stack.resolver.normalize_root_path_list(entries);
    let paths: Vec<&str> = normalized
        .iter()
        .map(|e| e.path.to_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["/root/movies", "/root/shows", "/root/loose.mkv"]);
}

#[tokio::test]
async fn file_creation_time_policy_stamps_from_disk() {
    let tmp = TempDir::with_prefix("lumen").unwrap();
    let movie_path = tmp.path().join("Movies/Dated.mkv");
    write_media(&movie_path);
    let stack = stack_for(tmp.path()).await;

    let on_disk = StdFileSystem::new();
    let fs_entry = lumen_core::fs::FileSystem::entry(&on_disk, &movie_path)
        .await
        .unwrap()
        .unwrap();
    let mut options = LibraryOptions::default();
    options.collection_kind = Some(CollectionKind::Movies);
    options.use_file_creation_time_for_date_added = true;

    let item = stack
        .resolver
        .resolve_path(&fs_entry, None, &options)
        .await
        .unwrap()
        .unwrap();

    if let Some(created) = fs_entry.created {
        assert_eq!(item.date_created, created);
    }
}
