//! Recursive tree construction over embedded chunks.
//!
//! # Algorithm
//!
//! Starting from the leaf level:
//!
//! 1. Cluster the level's vectors into `k = ceil(n / cluster_size)` groups.
//! 2. If `k == 1`, wrap the whole level in a single root and stop.
//! 3. Otherwise create one parent per non-empty group and repeat with the
//!    parents as the new level.
//!
//! A parent's vector is its cluster center, or the embedding of a generated
//! summary when a [`Summarizer`] is configured. Because `cluster_size >= 2`,
//! every level has fewer nodes than the one below it and the loop ends.
//!
//! Any embedding or summarization failure aborts the whole build.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::cluster::{cluster, ClusterStrategy};
use crate::embedding::{embed_checked, Embedder};
use crate::error::RagError;
use crate::models::SearchNode;
use crate::summarize::{build_summary_prompt, Summarizer};

/// Tuning for [`TreeBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct TreeOptions {
    /// Target number of members per cluster. Must be at least 2.
    pub cluster_size: usize,
    pub strategy: ClusterStrategy,
    /// Word cap written into summary prompts.
    pub summary_max_words: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            cluster_size: 5,
            strategy: ClusterStrategy::default(),
            summary_max_words: 300,
        }
    }
}

/// Builds a [`SearchNode`] tree from a level of leaves.
pub struct TreeBuilder {
    embedder: Arc<dyn Embedder>,
    summarizer: Option<Arc<dyn Summarizer>>,
    options: TreeOptions,
}

impl TreeBuilder {
    /// Create a builder. Summaries are generated only when `summarizer`
    /// is set.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        summarizer: Option<Arc<dyn Summarizer>>,
        options: TreeOptions,
    ) -> Result<Self> {
        if options.cluster_size < 2 {
            return Err(RagError::Configuration(format!(
                "cluster_size must be >= 2, got {}",
                options.cluster_size
            ))
            .into());
        }
        Ok(Self {
            embedder,
            summarizer,
            options,
        })
    }

    /// Build the tree and return its root.
    pub async fn build(&self, leaves: Vec<SearchNode>) -> Result<SearchNode> {
        let dims = match leaves.first() {
            Some(first) => first.vector.len(),
            None => {
                let msg = "cannot build a tree from zero leaves";
                return Err(RagError::Clustering(msg.into()).into());
            }
        };
        if let Some(bad) = leaves.iter().find(|l| l.vector.len() != dims) {
            return Err(RagError::EmbeddingFailure(format!(
                "leaf vectors disagree on dimension: {} vs {}",
                dims,
                bad.vector.len()
            ))
            .into());
        }

        let mut level = leaves;
        let mut height = 0usize;
        loop {
            let vectors: Vec<Vec<f32>> = level.iter().map(|n| n.vector.clone()).collect();
            let result = cluster(&vectors, self.options.cluster_size, &self.options.strategy)?;

            if result.k() == 1 {
                debug!(height, children = level.len(), "building root");
                let (vector, description) = match self.summarize(&level).await? {
                    Some((summary, vector)) => (vector, Some(summary)),
                    None => (result.centers[0].clone(), None),
                };
                return Ok(SearchNode::internal(vector, description, level));
            }

            let groups = result.groups();
            debug!(
                height,
                nodes = level.len(),
                k = result.k(),
                groups = groups.len(),
                "clustered level"
            );

            let mut slots: Vec<Option<SearchNode>> = level.into_iter().map(Some).collect();
            let mut parents = Vec::with_capacity(groups.len());
            for (cluster_idx, members) in groups {
                let children: Vec<SearchNode> =
                    members.iter().filter_map(|&i| slots[i].take()).collect();
                let (vector, description) = match self.summarize(&children).await? {
                    Some((summary, vector)) => (vector, summary),
                    None => (result.centers[cluster_idx].clone(), String::new()),
                };
                parents.push(SearchNode::internal(vector, Some(description), children));
            }

            level = parents;
            height += 1;
        }
    }

    /// Summarize `children` and embed the summary, if summaries are on.
    async fn summarize(&self, children: &[SearchNode]) -> Result<Option<(String, Vec<f32>)>> {
        let summarizer = match &self.summarizer {
            Some(s) => s,
            None => return Ok(None),
        };
        let descriptions: Vec<Option<&str>> =
            children.iter().map(|c| c.description.as_deref()).collect();
        let prompt = build_summary_prompt(&descriptions, self.options.summary_max_words);
        let summary = summarizer
            .summarize(&prompt)
            .await
            .map_err(|e| RagError::SummarizationFailure(format!("{:#}", e)))?;
        let vector = embed_checked(self.embedder.as_ref(), &summary).await?;
        Ok(Some((summary, vector)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::TextChunk;
    use crate::summarize::ExtractiveSummarizer;
    use async_trait::async_trait;

    fn leaves(n: usize) -> Vec<SearchNode> {
        let embedder = HashEmbedder::new(16);
        (0..n)
            .map(|i| {
                let chunk = TextChunk {
                    index: i,
                    start_line: i as i64,
                    end_line: i as i64 + 1,
                    text: format!("topic{} word{}", i % 3, i),
                    token_count: 2,
                };
                SearchNode::leaf(embedder.embed_sync(&chunk.text), &chunk)
            })
            .collect()
    }

    fn builder(summarizer: Option<Arc<dyn Summarizer>>, cluster_size: usize) -> TreeBuilder {
        TreeBuilder::new(
            Arc::new(HashEmbedder::new(16)),
            summarizer,
            TreeOptions {
                cluster_size,
                ..TreeOptions::default()
            },
        )
        .unwrap()
    }

    fn assert_well_formed(node: &SearchNode, dims: usize) {
        assert_eq!(node.vector.len(), dims);
        if let Some(children) = &node.children {
            assert!(!children.is_empty());
            for child in children {
                assert_well_formed(child, dims);
            }
        }
    }

    #[tokio::test]
    async fn test_twelve_leaves_size_five() {
        let input = leaves(12);
        let vectors: Vec<Vec<f32>> = input.iter().map(|l| l.vector.clone()).collect();
        let first_pass = cluster(&vectors, 5, &ClusterStrategy::default()).unwrap();
        assert_eq!(first_pass.k(), 3);
        let groups = first_pass.groups().len();

        let root = builder(None, 5).build(input).await.unwrap();
        assert_eq!(root.children().len(), groups);
        assert_eq!(root.depth(), 2);
        assert_eq!(root.leaf_count(), 12);
        assert_eq!(root.description, None);
        for parent in root.children() {
            assert_eq!(parent.description.as_deref(), Some(""));
            assert!(parent.children().iter().all(SearchNode::is_leaf));
        }
        assert_well_formed(&root, 16);
        assert_eq!(root.start_line, 0);
        assert_eq!(root.end_line, 12);
    }

    #[tokio::test]
    async fn test_small_level_becomes_root() {
        let root = builder(None, 5).build(leaves(3)).await.unwrap();
        assert_eq!(root.children().len(), 3);
        assert_eq!(root.depth(), 1);
    }

    #[tokio::test]
    async fn test_single_leaf() {
        let root = builder(None, 5).build(leaves(1)).await.unwrap();
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.vector, root.children()[0].vector);
    }

    #[tokio::test]
    async fn test_every_leaf_reachable_once() {
        let input = leaves(40);
        let expected: Vec<_> = input.iter().map(|l| l.description.clone()).collect();
        let root = builder(None, 2).build(input).await.unwrap();
        let mut found: Vec<_> = root.leaves().iter().map(|l| l.description.clone()).collect();
        let mut expected = expected;
        found.sort();
        expected.sort();
        assert_eq!(found, expected);
        assert_well_formed(&root, 16);
    }

    #[tokio::test]
    async fn test_summaries_attached() {
        let summarizer: Arc<dyn Summarizer> = Arc::new(ExtractiveSummarizer::new(5));
        let root = builder(Some(summarizer), 5).build(leaves(12)).await.unwrap();
        assert!(root.description.as_deref().is_some_and(|d| !d.is_empty()));
        for parent in root.children() {
            let summary = parent.description.as_deref().unwrap();
            assert!(summary.split_whitespace().count() <= 5);
            assert_eq!(parent.vector, HashEmbedder::new(16).embed_sync(summary));
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        fn name(&self) -> &str {
            "failing"
        }
        async fn summarize(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("service unavailable")
        }
    }

    #[tokio::test]
    async fn test_summarizer_failure_aborts() {
        let err = builder(Some(Arc::new(FailingSummarizer)), 5)
            .build(leaves(12))
            .await
            .unwrap_err();
        assert!(matches!(
            RagError::from_anyhow(&err),
            Some(RagError::SummarizationFailure(_))
        ));
    }

    #[test]
    fn test_cluster_size_below_two_rejected() {
        let result = TreeBuilder::new(
            Arc::new(HashEmbedder::new(4)),
            None,
            TreeOptions {
                cluster_size: 1,
                ..TreeOptions::default()
            },
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_and_ragged_leaves() {
        assert!(builder(None, 5).build(Vec::new()).await.is_err());
        let mut input = leaves(3);
        input[1].vector.push(0.0);
        let err = builder(None, 5).build(input).await.unwrap_err();
        assert!(matches!(
            RagError::from_anyhow(&err),
            Some(RagError::EmbeddingFailure(_))
        ));
    }
}
