//! `treerag list`, `treerag show` and `treerag delete`.

use anyhow::{bail, Result};
use std::collections::HashMap;

use treerag_core::models::SearchNode;
use treerag_core::store::TreeStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteTreeStore;

/// Longest description excerpt printed per node.
const EXCERPT_CHARS: usize = 80;

pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteTreeStore::new(pool.clone());
    let roots = store.root_nodes().await?;
    let records: HashMap<String, _> = store
        .documents()
        .await?
        .into_iter()
        .map(|r| (r.name.clone(), r))
        .collect();
    pool.close().await;

    if roots.is_empty() {
        println!("No trees stored.");
        return Ok(());
    }

    println!(
        "{:<32} {:>8} {:>8} {:>7}  {:<24} BUILT",
        "DOCUMENT", "ROOT", "NODES", "CHUNKS", "MODEL"
    );
    for root in &roots {
        let record = records.get(&root.document_name);
        println!(
            "{:<32} {:>8} {:>8} {:>7}  {:<24} {}",
            root.document_name,
            root.root_id,
            root.node_count,
            record.map(|r| r.chunk_count.to_string()).unwrap_or_else(|| "-".into()),
            record.map(|r| r.embedding_model.as_str()).unwrap_or("-"),
            record
                .map(|r| format_ts_iso(r.built_at))
                .unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}

pub async fn run_show(config: &Config, name: &str, max_depth: Option<usize>) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteTreeStore::new(pool.clone());
    let tree = store.load_tree(name).await?;
    pool.close().await;

    let tree = match tree {
        Some(t) => t,
        None => bail!("No tree stored for document '{}'.", name),
    };

    println!(
        "{}: {} nodes, {} leaves, depth {}",
        name,
        tree.node_count(),
        tree.leaf_count(),
        tree.depth()
    );
    let mut out = String::new();
    outline(&tree, 0, max_depth, &mut out);
    print!("{}", out);
    Ok(())
}

pub async fn run_delete(config: &Config, name: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteTreeStore::new(pool.clone());
    let removed = store.delete_document(name).await?;
    pool.close().await;

    if removed == 0 {
        println!("No tree stored for document '{}'.", name);
    } else {
        println!("Deleted {} ({} nodes).", name, removed);
    }
    Ok(())
}

/// Append an indented outline of `node` to `out`.
fn outline(node: &SearchNode, level: usize, max_depth: Option<usize>, out: &mut String) {
    let kind = if node.is_leaf() {
        "leaf".to_string()
    } else {
        format!("{} children", node.children().len())
    };
    out.push_str(&format!(
        "{}[{}..{}] ({}) {}\n",
        "  ".repeat(level),
        node.start_line,
        node.end_line,
        kind,
        excerpt(node.description.as_deref().unwrap_or(""))
    ));
    if max_depth.is_some_and(|d| level >= d) {
        return;
    }
    for child in node.children() {
        outline(child, level + 1, max_depth, out);
    }
}

/// First line-free `EXCERPT_CHARS` characters of `text`.
fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(EXCERPT_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
