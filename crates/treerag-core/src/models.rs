//! Core data models shared by the chunker, tree builder, search, and stores.

use serde::{Deserialize, Serialize};

/// A contiguous line range of a document, bounded by a token budget.
///
/// `end_line` is exclusive: a chunk covering the first three lines of a
/// document has `start_line = 0` and `end_line = 3`. When overlap is
/// enabled, `text` starts with the decoded tail of the previous chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of the chunk in the document, contiguous from 0.
    pub index: usize,
    /// First source line (inclusive).
    pub start_line: i64,
    /// Last source line (exclusive).
    pub end_line: i64,
    /// Chunk text, overlap prefix included.
    pub text: String,
    /// Running token count used for the budget check.
    pub token_count: usize,
}

/// A node of the hierarchical search tree.
///
/// Leaves hold one chunk each; internal nodes represent a cluster of their
/// children. Children are owned by their parent, so a tree is a plain
/// recursive value with no back references.
///
/// `children` distinguishes a leaf produced by the builder (`None`) from a
/// leaf reconstructed from a store (`Some(vec![])`). Both count as leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchNode {
    /// Representative embedding.
    pub vector: Vec<f32>,
    /// Child nodes, in cluster order.
    #[serde(default)]
    pub children: Option<Vec<SearchNode>>,
    /// Chunk text for leaves, generated summary for internal nodes.
    #[serde(default)]
    pub description: Option<String>,
    pub start_line: i64,
    pub end_line: i64,
}

impl SearchNode {
    /// Create a leaf for a chunk of text.
    pub fn leaf(vector: Vec<f32>, chunk: &TextChunk) -> Self {
        Self {
            vector,
            children: None,
            description: Some(chunk.text.clone()),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
        }
    }

    /// Create an internal node over `children`.
    ///
    /// `children` must not be empty: a childless node is stored and
    /// reloaded as a leaf. The line range spans the lowest start and
    /// highest end of the children.
    pub fn internal(
        vector: Vec<f32>,
        description: Option<String>,
        children: Vec<SearchNode>,
    ) -> Self {
        debug_assert!(!children.is_empty(), "internal node needs at least one child");
        let start_line = children.iter().map(|c| c.start_line).min().unwrap_or(-1);
        let end_line = children.iter().map(|c| c.end_line).max().unwrap_or(-1);
        Self {
            vector,
            children: Some(children),
            description,
            start_line,
            end_line,
        }
    }

    /// Child nodes, empty for leaves.
    pub fn children(&self) -> &[SearchNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(SearchNode::node_count).sum::<usize>()
    }

    /// Number of leaves in this subtree.
    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children().iter().map(SearchNode::leaf_count).sum()
        }
    }

    /// Length of the longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        self.children()
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Leaves of this subtree in depth-first order.
    pub fn leaves(&self) -> Vec<&SearchNode> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'a>(node: &'a SearchNode, out: &mut Vec<&'a SearchNode>) {
    if node.is_leaf() {
        out.push(node);
        return;
    }
    for child in node.children() {
        collect_leaves(child, out);
    }
}

/// A stored tree as listed by [`TreeStore::root_nodes`](crate::store::TreeStore::root_nodes).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeSummary {
    /// Row id of the root node.
    pub root_id: i64,
    /// Document the tree was built from.
    pub document_name: String,
    /// Root description (the top-level summary, when one was generated).
    pub description: Option<String>,
    /// Number of rows stored for the document.
    pub node_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(start: i64, end: i64, text: &str) -> TextChunk {
        TextChunk {
            index: 0,
            start_line: start,
            end_line: end,
            text: text.to_string(),
            token_count: 1,
        }
    }

    #[test]
    fn test_internal_node_spans_children() {
        let a = SearchNode::leaf(vec![1.0], &chunk(4, 9, "a"));
        let b = SearchNode::leaf(vec![2.0], &chunk(0, 5, "b"));
        let parent = SearchNode::internal(vec![1.5], Some(String::new()), vec![a, b]);
        assert_eq!(parent.start_line, 0);
        assert_eq!(parent.end_line, 9);
        assert_eq!(parent.node_count(), 3);
        assert_eq!(parent.leaf_count(), 2);
        assert_eq!(parent.depth(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "at least one child")]
    fn test_internal_node_rejects_no_children() {
        SearchNode::internal(vec![0.0], None, Vec::new());
    }

    #[test]
    fn test_loaded_leaf_is_leaf() {
        let mut leaf = SearchNode::leaf(vec![1.0], &chunk(0, 1, "x"));
        assert!(leaf.is_leaf());
        leaf.children = Some(Vec::new());
        assert!(leaf.is_leaf());
        assert_eq!(leaf.depth(), 0);
    }

    #[test]
    fn test_leaves_in_order() {
        let a = SearchNode::leaf(vec![1.0], &chunk(0, 1, "a"));
        let b = SearchNode::leaf(vec![2.0], &chunk(1, 2, "b"));
        let c = SearchNode::leaf(vec![3.0], &chunk(2, 3, "c"));
        let inner = SearchNode::internal(vec![0.0], None, vec![a, b]);
        let root = SearchNode::internal(vec![0.0], None, vec![inner, c]);
        let texts: Vec<_> = root
            .leaves()
            .iter()
            .map(|n| n.description.clone().unwrap())
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(root.depth(), 2);
    }
}
