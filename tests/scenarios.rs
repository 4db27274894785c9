//! Cross-module end-to-end scenarios, each matching one of the concrete
//! examples this crate's behavior is required to reproduce exactly.

use disk_index_core::config::{Config, QueryLimits};
use disk_index_core::domain::application::FavoriteRecord;
use disk_index_core::domain::file::FileData;
use disk_index_core::domain::watched_folder::Depth;
use disk_index_core::domain::Application;
use disk_index_core::search::{FilteredSearchQuery, SearchEngine, SearchFilters, SizeRange};
use disk_index_core::{IndexController, IndexStore};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

async fn open_store(dir: &tempfile::TempDir) -> Arc<IndexStore> {
    Arc::new(IndexStore::open(&dir.path().join("index.sqlite3")).await.unwrap())
}

fn app(path: &str, name: &str, is_favorite: bool, favorite_added_at: Option<i64>) -> Application {
    Application {
        path: path.to_string(),
        name: name.to_string(),
        display_name: name.to_string(),
        description: None,
        keywords: vec![],
        categories: vec![],
        icon: None,
        last_updated: 0,
        application_type: None,
        is_system: true,
        is_custom_added: false,
        is_favorite,
        favorite_added_at,
    }
}

#[tokio::test]
async fn restore_favorites_through_reindex() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir).await;

    store.upsert_application(app("/A", "A", true, Some(100))).await.unwrap();
    store.upsert_application(app("/B", "B", false, None)).await.unwrap();

    let favorites = store.get_system_app_favorites().await.unwrap();
    assert_eq!(
        favorites,
        vec![FavoriteRecord {
            path: "/A".to_string(),
            name: "A".to_string(),
            favorite_added_at: Some(100),
        }]
    );

    store.reset_system_applications().await.unwrap();
    store.upsert_application(app("/A2", "A", false, None)).await.unwrap();
    store.upsert_application(app("/B", "B", false, None)).await.unwrap();

    let restored = store.restore_system_app_favorites(favorites).await.unwrap();
    assert_eq!(restored, 1);

    let a2 = store.get_application("/A2").await.unwrap().unwrap();
    assert!(a2.is_favorite);
    assert_eq!(a2.favorite_added_at, Some(100));
    let b = store.get_application("/B").await.unwrap().unwrap();
    assert!(!b.is_favorite);
}

#[tokio::test]
async fn orphan_cleanup_removes_only_the_missing_path() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir).await;

    let present_a = dir.path().join("present_a.txt");
    let present_b = dir.path().join("present_b.txt");
    let missing = dir.path().join("missing.txt");
    std::fs::write(&present_a, b"a").unwrap();
    std::fs::write(&present_b, b"b").unwrap();
    std::fs::write(&missing, b"m").unwrap();

    for path in [&present_a, &present_b, &missing] {
        let mut data = FileData::new();
        data.insert("name".into(), json!(path.file_name().unwrap().to_string_lossy()));
        store.upsert_file(&path.to_string_lossy(), data).await.unwrap();
    }
    store
        .set_notes(&missing.to_string_lossy(), "keep me", None, 1)
        .await
        .unwrap();

    std::fs::remove_file(&missing).unwrap();

    let controller = IndexController::new(store.clone(), Config::default_with_dir(dir.path().to_path_buf()));
    let report = controller.cleanup_orphaned_database_entries().await.unwrap();

    assert_eq!(report.checked_entries, 3);
    assert_eq!(report.removed_entries, 1);
    assert!(store.get_file(&missing.to_string_lossy()).await.unwrap().is_none());
    assert!(store.get_file(&present_a.to_string_lossy()).await.unwrap().is_some());

    // Notes for the removed path are untouched by cleanup.
    let note = store
        .get_notes(
            &missing.to_string_lossy(),
            Some(disk_index_core::domain::note::TargetType::File),
        )
        .await
        .unwrap();
    assert!(note.is_some());
}

#[tokio::test]
async fn add_watch_path_rejects_a_descendant_of_an_unlimited_root() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir).await;
    let config = Config::default_with_dir(dir.path().to_path_buf());
    let controller = IndexController::new(store, config);
    controller.initialize().await.unwrap();

    let docs = dir.path().join("home/u/docs");
    let reports = docs.join("reports");
    std::fs::create_dir_all(&reports).unwrap();

    let first = controller
        .add_watch_path(docs.to_string_lossy().to_string(), Depth::Unlimited)
        .await
        .unwrap();
    assert!(first.success);

    let second = controller
        .add_watch_path(reports.to_string_lossy().to_string(), Depth::Unlimited)
        .await
        .unwrap();
    assert!(!second.success);
    assert_eq!(second.overlapping_folder, Some(docs.to_string_lossy().to_string()));

    controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn filtered_search_narrows_by_type_size_and_tags() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir).await;

    let mut small = FileData::new();
    small.insert("name".into(), json!("small.pdf"));
    small.insert("size".into(), json!(200));
    small.insert("category".into(), json!("document"));
    store.upsert_file("/reports/small.pdf", small).await.unwrap();

    let mut large = FileData::new();
    large.insert("name".into(), json!("large.pdf"));
    large.insert("size".into(), json!(2_000_000));
    large.insert("category".into(), json!("document"));
    store.upsert_file("/reports/large.pdf", large).await.unwrap();

    store.add_file_tag("/reports/small.pdf", "report").await.unwrap();
    store.add_file_tag("/reports/large.pdf", "report").await.unwrap();

    let engine = SearchEngine::new(store, QueryLimits::default());
    let results = engine
        .filtered_search(FilteredSearchQuery {
            query: None,
            filters: SearchFilters {
                types: vec!["document".to_string()],
                date_range: None,
                size: Some(SizeRange {
                    min: Some(1000),
                    max: None,
                }),
                tags: vec!["report".to_string()],
            },
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path, "/reports/large.pdf");
}

#[tokio::test]
async fn recursive_folder_counts_bubble_from_a_leaf_update() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir).await;

    let root = dir.path().join("R").to_string_lossy().to_string();
    let a = dir.path().join("R/a").to_string_lossy().to_string();
    let b = dir.path().join("R/b").to_string_lossy().to_string();
    let c = dir.path().join("R/b/c").to_string_lossy().to_string();

    store
        .upsert_watched_folder(disk_index_core::store::WatchedFolderInsert {
            path: root.clone(),
            name: "R".to_string(),
            depth: Depth::Unlimited,
        })
        .await
        .unwrap();

    for (folder_path, parent_path) in [
        (&root, None),
        (&a, Some(root.clone())),
        (&b, Some(root.clone())),
        (&c, Some(b.clone())),
    ] {
        store
            .update_folder(
                folder_path,
                disk_index_core::store::FolderUpdate {
                    name: folder_path.clone(),
                    parent_path,
                    modified_at: 0,
                    indexed_at: 0,
                    watched_folder_path: root.clone(),
                },
            )
            .await
            .unwrap();
    }

    for (folder_path, count) in [(&a, 3), (&b, 1), (&c, 2)] {
        for i in 0..count {
            let file_path = format!("{folder_path}/f{i}");
            let mut data = FileData::new();
            data.insert("name".into(), json!(format!("f{i}")));
            data.insert("folder_path".into(), json!(folder_path));
            store.upsert_file(&file_path, data).await.unwrap();
        }
    }

    store.update_folder_counts(&c).await.unwrap();

    let b_folder = store.get_folder(&b).await.unwrap().unwrap();
    assert_eq!(b_folder.total_file_count, 3);
    let root_folder = store.get_folder(&root).await.unwrap().unwrap();
    assert_eq!(root_folder.total_file_count, 6);
}
