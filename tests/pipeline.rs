//! Library-level tests: index a file into SQLite and query it back.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use treerag::config::{load_config, Config};
use treerag::index_cmd::{index_document, IndexOutcome};
use treerag::progress::ProgressMode;
use treerag::query_cmd::query_document;
use treerag::sqlite_store::SqliteTreeStore;
use treerag::{db, migrate};
use treerag_core::store::TreeStore;

fn twelve_lines() -> String {
    (0..12)
        .map(|i| format!("line {} talks about topic number {} in detail", i, i % 3))
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_config(tmp: &TempDir, tree: &str) -> Config {
    let path = tmp.path().join("treerag.toml");
    let content = format!(
        r#"[db]
path = "{}/treerag.sqlite"

[chunking]
max_tokens = 9
overlap_tokens = 0

[tree]
{}

[embedding]
provider = "hash"
dims = 256
"#,
        tmp.path().display(),
        tree
    );
    fs::write(&path, content).unwrap();
    load_config(&path).unwrap()
}

fn write_doc(tmp: &TempDir, text: &str) -> PathBuf {
    let path = tmp.path().join("doc.txt");
    fs::write(&path, text).unwrap();
    path
}

#[tokio::test]
async fn test_index_then_query() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "cluster_size = 5");
    migrate::run_migrations(&config).await.unwrap();
    let doc = write_doc(&tmp, &twelve_lines());

    let outcome = index_document(&config, &doc, "doc", false, ProgressMode::Off)
        .await
        .unwrap();
    let record = match outcome {
        IndexOutcome::Built(r) => r,
        other => panic!("expected a build, got {:?}", other),
    };
    assert_eq!(record.chunk_count, 12);
    assert!(record.node_count > 12);
    assert_eq!(record.embedding_model, "hash");

    let hit = query_document(&config, "doc", "line 7 talks about topic number 1 in detail")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.document, "doc");
    assert!(hit.depth >= 1);
    assert_eq!(hit.path.len(), hit.depth);
    assert!(hit.end_line > hit.start_line);
}

#[tokio::test]
async fn test_stored_tree_shape() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "cluster_size = 5");
    migrate::run_migrations(&config).await.unwrap();
    let doc = write_doc(&tmp, &twelve_lines());
    index_document(&config, &doc, "doc", false, ProgressMode::Off)
        .await
        .unwrap();

    let pool = db::connect(&config).await.unwrap();
    let store = SqliteTreeStore::new(pool.clone());
    let tree = store.load_tree("doc").await.unwrap().unwrap();
    assert_eq!(tree.leaf_count(), 12);
    assert!(tree.depth() >= 2);
    assert_eq!(tree.start_line, 0);
    assert_eq!(tree.end_line, 12);

    let roots = store.root_nodes().await.unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].document_name, "doc");
    pool.close().await;
}

#[tokio::test]
async fn test_unchanged_and_forced_rebuild() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "cluster_size = 3");
    migrate::run_migrations(&config).await.unwrap();
    let doc = write_doc(&tmp, &twelve_lines());

    let first = index_document(&config, &doc, "doc", false, ProgressMode::Off)
        .await
        .unwrap();
    let second = index_document(&config, &doc, "doc", false, ProgressMode::Off)
        .await
        .unwrap();
    assert!(matches!(second, IndexOutcome::Unchanged(_)));

    let forced = index_document(&config, &doc, "doc", true, ProgressMode::Off)
        .await
        .unwrap();
    match (first, forced) {
        (IndexOutcome::Built(a), IndexOutcome::Built(b)) => {
            assert_eq!(a.content_hash, b.content_hash);
            assert_eq!(a.node_count, b.node_count);
        }
        other => panic!("unexpected outcomes: {:?}", other),
    }

    let pool = db::connect(&config).await.unwrap();
    let store = SqliteTreeStore::new(pool.clone());
    assert_eq!(store.root_nodes().await.unwrap().len(), 1);
    pool.close().await;
}

#[tokio::test]
async fn test_settings_change_triggers_rebuild() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "cluster_size = 3");
    migrate::run_migrations(&config).await.unwrap();
    let doc = write_doc(&tmp, &twelve_lines());

    let first = match index_document(&config, &doc, "doc", false, ProgressMode::Off)
        .await
        .unwrap()
    {
        IndexOutcome::Built(r) => r,
        other => panic!("expected a build, got {:?}", other),
    };
    assert_eq!(first.chunk_count, 12);

    let mut wider = config.clone();
    wider.chunking.max_tokens = 40;
    let second = match index_document(&wider, &doc, "doc", false, ProgressMode::Off)
        .await
        .unwrap()
    {
        IndexOutcome::Built(r) => r,
        other => panic!("expected a rebuild, got {:?}", other),
    };
    assert_eq!(first.content_hash, second.content_hash);
    assert_ne!(first.build_fingerprint, second.build_fingerprint);
    assert!(second.chunk_count < first.chunk_count);

    let third = index_document(&wider, &doc, "doc", false, ProgressMode::Off)
        .await
        .unwrap();
    assert!(matches!(third, IndexOutcome::Unchanged(_)));

    let pool = db::connect(&wider).await.unwrap();
    let store = SqliteTreeStore::new(pool.clone());
    let tree = store.load_tree("doc").await.unwrap().unwrap();
    assert_eq!(tree.leaf_count() as i64, second.chunk_count);
    pool.close().await;
}

#[tokio::test]
async fn test_fuzzy_cmeans_strategy() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "cluster_size = 4\nalgorithm = \"cmeans\"\nseed = 7");
    migrate::run_migrations(&config).await.unwrap();
    let doc = write_doc(&tmp, &twelve_lines());

    index_document(&config, &doc, "doc", false, ProgressMode::Off)
        .await
        .unwrap();
    let hit = query_document(&config, "doc", "topic number 2")
        .await
        .unwrap();
    assert!(hit.is_some());
}

#[tokio::test]
async fn test_query_unknown_document() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, "cluster_size = 5");
    migrate::run_migrations(&config).await.unwrap();

    let hit = query_document(&config, "missing", "anything").await.unwrap();
    assert!(hit.is_none());
}

#[tokio::test]
async fn test_extractive_summaries_stored() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("treerag.toml");
    fs::write(
        &path,
        format!(
            r#"[db]
path = "{}/treerag.sqlite"

[chunking]
max_tokens = 9
overlap_tokens = 0

[tree]
cluster_size = 4
summarize = true
summary_max_words = 20

[embedding]
provider = "hash"
dims = 128

[summarizer]
provider = "extractive"
"#,
            tmp.path().display()
        ),
    )
    .unwrap();
    let config = load_config(&path).unwrap();
    migrate::run_migrations(&config).await.unwrap();
    let doc = write_doc(&tmp, &twelve_lines());
    index_document(&config, &doc, "doc", false, ProgressMode::Off)
        .await
        .unwrap();

    let pool = db::connect(&config).await.unwrap();
    let store = SqliteTreeStore::new(pool.clone());
    let tree = store.load_tree("doc").await.unwrap().unwrap();
    let summary = tree.description.as_deref().unwrap_or("");
    assert!(!summary.is_empty());
    assert!(summary.split_whitespace().count() <= 20);
    pool.close().await;
}
