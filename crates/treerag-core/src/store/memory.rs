//! In-memory [`TreeStore`] implementation for tests and embedding.
//!
//! Keeps rows in a `Vec` behind `std::sync::RwLock`, with the same id and
//! ordering rules as the SQLite backend.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::vector_to_json;
use crate::models::{SearchNode, TreeSummary};

use super::{assemble_tree, flatten_tree, NodeRow, TreeStore, ROOT_PARENT_ID};

#[derive(Default)]
struct Rows {
    rows: Vec<NodeRow>,
    next_id: i64,
}

/// In-memory tree store.
#[derive(Default)]
pub struct InMemoryTreeStore {
    inner: RwLock<Rows>,
}

impl InMemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row, in id order.
    pub fn rows(&self) -> Result<Vec<NodeRow>> {
        Ok(self.read()?.rows.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Rows>> {
        self.inner.read().map_err(|_| anyhow!("tree store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Rows>> {
        self.inner.write().map_err(|_| anyhow!("tree store lock poisoned"))
    }
}

#[async_trait]
impl TreeStore for InMemoryTreeStore {
    async fn save_tree(&self, root: &SearchNode, document_name: &str) -> Result<i64> {
        let pending = flatten_tree(root)?;
        let mut inner = self.write()?;
        inner.rows.retain(|r| r.document_name != document_name);

        let mut ids: Vec<i64> = Vec::with_capacity(pending.len());
        for row in pending {
            inner.next_id += 1;
            let id = inner.next_id;
            let parent_id = match row.parent {
                Some(p) => ids[p],
                None => ROOT_PARENT_ID,
            };
            inner.rows.push(NodeRow {
                id,
                document_name: document_name.to_string(),
                start_line: row.node.start_line,
                end_line: row.node.end_line,
                vector: row.vector,
                description: row.node.description.clone(),
                parent_id,
            });
            ids.push(id);
        }
        Ok(ids[0])
    }

    async fn load_tree(&self, document_name: &str) -> Result<Option<SearchNode>> {
        let inner = self.read()?;
        let rows: Vec<NodeRow> = inner
            .rows
            .iter()
            .filter(|r| r.document_name == document_name)
            .cloned()
            .collect();
        let root_id = rows
            .iter()
            .filter(|r| r.parent_id == ROOT_PARENT_ID)
            .map(|r| r.id)
            .min();
        match root_id {
            Some(id) => assemble_tree(&rows, id),
            None => Ok(None),
        }
    }

    async fn load_subtree(&self, id: i64) -> Result<Option<SearchNode>> {
        let inner = self.read()?;
        let name = match inner.rows.iter().find(|r| r.id == id) {
            Some(r) => r.document_name.clone(),
            None => return Ok(None),
        };
        let rows: Vec<NodeRow> = inner
            .rows
            .iter()
            .filter(|r| r.document_name == name)
            .cloned()
            .collect();
        assemble_tree(&rows, id)
    }

    async fn root_nodes(&self) -> Result<Vec<TreeSummary>> {
        let inner = self.read()?;
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for row in &inner.rows {
            *counts.entry(row.document_name.as_str()).or_default() += 1;
        }
        let mut out: Vec<TreeSummary> = inner
            .rows
            .iter()
            .filter(|r| r.parent_id == ROOT_PARENT_ID)
            .map(|r| TreeSummary {
                root_id: r.id,
                document_name: r.document_name.clone(),
                description: r.description.clone(),
                node_count: counts.get(r.document_name.as_str()).copied().unwrap_or(0),
            })
            .collect();
        out.sort_by(|a, b| a.document_name.cmp(&b.document_name));
        Ok(out)
    }

    async fn node_id_by_vector(&self, vector: &[f32]) -> Result<Option<i64>> {
        let needle = vector_to_json(vector)?;
        let inner = self.read()?;
        Ok(inner.rows.iter().find(|r| r.vector == needle).map(|r| r.id))
    }

    async fn delete_tree(&self, document_name: &str) -> Result<u64> {
        let mut inner = self.write()?;
        let before = inner.rows.len();
        inner.rows.retain(|r| r.document_name != document_name);
        Ok((before - inner.rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextChunk;

    fn leaf(v: Vec<f32>, start: i64, text: &str) -> SearchNode {
        SearchNode::leaf(
            v,
            &TextChunk {
                index: 0,
                start_line: start,
                end_line: start + 1,
                text: text.to_string(),
                token_count: 1,
            },
        )
    }

    /// Root with two internal children, each over one leaf.
    fn five_node_tree() -> SearchNode {
        let l = leaf(vec![1.0, 0.0], 0, "L");
        let m = leaf(vec![0.0, 1.0], 1, "M");
        let a = SearchNode::internal(vec![0.5, 0.5], Some("A".into()), vec![l]);
        let b = SearchNode::internal(vec![0.1, 0.9], Some("B".into()), vec![m]);
        SearchNode::internal(vec![0.25, 0.75], None, vec![a, b])
    }

    #[tokio::test]
    async fn test_save_writes_depth_first_rows() {
        let store = InMemoryTreeStore::new();
        let root_id = store.save_tree(&five_node_tree(), "doc").await.unwrap();
        let rows = store.rows().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].id, root_id);
        assert_eq!(rows[0].parent_id, -1);
        assert_eq!(rows[1].parent_id, rows[0].id);
        assert_eq!(rows[1].description.as_deref(), Some("A"));
        assert_eq!(rows[2].parent_id, rows[1].id);
        assert_eq!(rows[2].description.as_deref(), Some("L"));
        assert_eq!(rows[3].parent_id, rows[0].id);
        assert_eq!(rows[3].description.as_deref(), Some("B"));
        assert_eq!(rows[4].parent_id, rows[3].id);
        assert_eq!(rows[4].description.as_deref(), Some("M"));
        assert!(rows.iter().all(|r| r.document_name == "doc"));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = InMemoryTreeStore::new();
        let tree = five_node_tree();
        store.save_tree(&tree, "doc").await.unwrap();
        let loaded = store.load_tree("doc").await.unwrap().unwrap();
        assert_eq!(loaded.node_count(), 5);
        assert_eq!((loaded.start_line, loaded.end_line), (0, 2));
        assert_eq!(loaded.vector, tree.vector);
        assert_eq!(loaded.description, None);
        let a = &loaded.children()[0];
        assert_eq!(a.description.as_deref(), Some("A"));
        assert_eq!(a.children()[0].vector, vec![1.0, 0.0]);
        assert_eq!(a.children()[0].children, Some(Vec::new()));
        let b = &loaded.children()[1];
        assert_eq!(b.description.as_deref(), Some("B"));
        assert_eq!(b.children()[0].description.as_deref(), Some("M"));
    }

    #[tokio::test]
    async fn test_rebuild_replaces_rows() {
        let store = InMemoryTreeStore::new();
        store.save_tree(&five_node_tree(), "doc").await.unwrap();
        store.save_tree(&five_node_tree(), "other").await.unwrap();
        let new_root = store.save_tree(&leaf(vec![9.0, 9.0], 0, "solo"), "doc").await.unwrap();
        let roots = store.root_nodes().await.unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].document_name, "doc");
        assert_eq!(roots[0].root_id, new_root);
        assert_eq!(roots[0].node_count, 1);
        assert_eq!(roots[1].node_count, 5);
    }

    #[tokio::test]
    async fn test_subtree_and_vector_lookup() {
        let store = InMemoryTreeStore::new();
        store.save_tree(&five_node_tree(), "doc").await.unwrap();
        let id = store.node_id_by_vector(&[0.5, 0.5]).await.unwrap().unwrap();
        let sub = store.load_subtree(id).await.unwrap().unwrap();
        assert_eq!(sub.description.as_deref(), Some("A"));
        assert_eq!(sub.node_count(), 2);
        assert!(store.node_id_by_vector(&[3.0]).await.unwrap().is_none());
        assert!(store.load_subtree(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_and_delete() {
        let store = InMemoryTreeStore::new();
        assert!(store.load_tree("nope").await.unwrap().is_none());
        store.save_tree(&five_node_tree(), "doc").await.unwrap();
        assert_eq!(store.delete_tree("doc").await.unwrap(), 5);
        assert!(store.load_tree("doc").await.unwrap().is_none());
        assert_eq!(store.delete_tree("doc").await.unwrap(), 0);
    }
}
