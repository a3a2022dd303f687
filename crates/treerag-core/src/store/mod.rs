//! Relational persistence for search trees.
//!
//! A tree is stored as one row per node. Rows of a document share its
//! name; the root has `parent_id = -1` and every other row points at its
//! parent. Rows are written depth-first, so a parent's id is always known
//! before its children are inserted and ids grow in pre-order. Children are
//! read back in id order, which restores the original child order.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{vector_from_json, vector_to_json};
use crate::error::RagError;
use crate::models::{SearchNode, TreeSummary};

/// `parent_id` of a root row.
pub const ROOT_PARENT_ID: i64 = -1;

/// One persisted tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub id: i64,
    pub document_name: String,
    pub start_line: i64,
    pub end_line: i64,
    /// JSON array of numbers, see [`vector_to_json`].
    pub vector: String,
    pub description: Option<String>,
    pub parent_id: i64,
}

impl NodeRow {
    /// Decode the stored vector, reporting bad text as
    /// [`RagError::StoreCorruption`].
    pub fn decode_vector(&self) -> Result<Vec<f32>> {
        vector_from_json(&self.vector).map_err(|e| {
            RagError::StoreCorruption {
                id: self.id,
                reason: format!("invalid vector: {}", e),
            }
            .into()
        })
    }
}

/// A node ready to be inserted, in depth-first order.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRow<'a> {
    /// Position of the parent in the same list, `None` for the root.
    pub parent: Option<usize>,
    pub node: &'a SearchNode,
    /// Serialized vector.
    pub vector: String,
}

/// Flatten a tree into insertion order: each parent precedes its children.
pub fn flatten_tree(root: &SearchNode) -> Result<Vec<PendingRow<'_>>> {
    let mut out = Vec::with_capacity(root.node_count());
    let mut stack: Vec<(Option<usize>, &SearchNode)> = vec![(None, root)];
    while let Some((parent, node)) = stack.pop() {
        let position = out.len();
        out.push(PendingRow {
            parent,
            node,
            vector: vector_to_json(&node.vector)?,
        });
        for child in node.children().iter().rev() {
            stack.push((Some(position), child));
        }
    }
    Ok(out)
}

/// Rebuild the subtree rooted at `root_id` from a document's rows.
///
/// Returns `Ok(None)` when no row has id `root_id`. Reconstructed leaves
/// get `children = Some(vec![])`.
pub fn assemble_tree(rows: &[NodeRow], root_id: i64) -> Result<Option<SearchNode>> {
    let mut by_parent: HashMap<i64, Vec<&NodeRow>> = HashMap::new();
    let mut root = None;
    for row in rows {
        if row.id == root_id {
            root = Some(row);
        }
        by_parent.entry(row.parent_id).or_default().push(row);
    }
    for children in by_parent.values_mut() {
        children.sort_by_key(|r| r.id);
    }
    match root {
        Some(row) => Ok(Some(assemble_node(row, &by_parent)?)),
        None => Ok(None),
    }
}

fn assemble_node(row: &NodeRow, by_parent: &HashMap<i64, Vec<&NodeRow>>) -> Result<SearchNode> {
    let children = match by_parent.get(&row.id) {
        Some(rows) => rows
            .iter()
            .map(|child| assemble_node(child, by_parent))
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok(SearchNode {
        vector: row.decode_vector()?,
        children: Some(children),
        description: row.description.clone(),
        start_line: row.start_line,
        end_line: row.end_line,
    })
}

/// Abstract persistence backend for search trees.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save_tree`](TreeStore::save_tree) | Replace a document's tree |
/// | [`load_tree`](TreeStore::load_tree) | Load a document's tree by name |
/// | [`load_subtree`](TreeStore::load_subtree) | Load the subtree under a row id |
/// | [`root_nodes`](TreeStore::root_nodes) | List stored trees |
/// | [`node_id_by_vector`](TreeStore::node_id_by_vector) | Find a row by exact vector |
/// | [`delete_tree`](TreeStore::delete_tree) | Remove a document's rows |
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Persist `root` under `document_name` and return the root row id.
    ///
    /// Rows previously stored under the same name are removed atomically
    /// with the insert.
    async fn save_tree(&self, root: &SearchNode, document_name: &str) -> Result<i64>;

    /// Load the tree stored for `document_name`.
    async fn load_tree(&self, document_name: &str) -> Result<Option<SearchNode>>;

    /// Load the subtree rooted at row `id`.
    async fn load_subtree(&self, id: i64) -> Result<Option<SearchNode>>;

    /// One entry per stored tree, ordered by document name.
    async fn root_nodes(&self) -> Result<Vec<TreeSummary>>;

    /// Id of the first row whose serialized vector equals `vector`'s.
    async fn node_id_by_vector(&self, vector: &[f32]) -> Result<Option<i64>>;

    /// Remove every row stored for `document_name`, returning the count.
    async fn delete_tree(&self, document_name: &str) -> Result<u64>;
}
