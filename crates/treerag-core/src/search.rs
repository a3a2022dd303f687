//! Greedy descent through a search tree.
//!
//! At each internal node the child whose vector is most similar to the
//! query (cosine similarity) is followed; the first child wins a tie. The
//! descent stops at a leaf, so it visits exactly `depth + 1` nodes and
//! always terminates on a finite tree.

use crate::embedding::cosine_similarity;
use crate::models::SearchNode;

/// Result of [`search_tree`].
#[derive(Debug, Clone, PartialEq)]
pub struct TreeHit<'a> {
    /// The leaf the descent ended on.
    pub node: &'a SearchNode,
    /// Number of descent steps taken from the root.
    pub depth: usize,
    /// Similarity of `node` to the query, `None` when the root is a leaf.
    pub score: Option<f32>,
    /// Child index chosen at each step.
    pub path: Vec<usize>,
}

/// Descend from `root` towards the node most similar to `query`.
pub fn search_tree<'a>(root: &'a SearchNode, query: &[f32]) -> TreeHit<'a> {
    let mut node = root;
    let mut score = None;
    let mut path = Vec::new();

    while let Some((idx, child, sim)) = best_child(node, query) {
        node = child;
        score = Some(sim);
        path.push(idx);
    }

    TreeHit {
        node,
        depth: path.len(),
        score,
        path,
    }
}

fn best_child<'a>(node: &'a SearchNode, query: &[f32]) -> Option<(usize, &'a SearchNode, f32)> {
    let mut best: Option<(usize, &SearchNode, f32)> = None;
    for (i, child) in node.children().iter().enumerate() {
        let sim = cosine_similarity(query, &child.vector);
        match best {
            Some((_, _, best_sim)) if sim <= best_sim => {}
            _ => best = Some((i, child, sim)),
        }
    }
    best
}
