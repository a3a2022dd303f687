//! Per-document index: build a tree once, answer queries against it.
//!
//! [`TreeIndex::init`] returns an [`IndexBuild`], a pull-driven sequence of
//! [`BuildEvent`]s. Each call to [`IndexBuild::next_event`] does one unit
//! of work (embedding one chunk, or the final build and save) and reports
//! it. Dropping the build stops it; since the tree is persisted only in the
//! last step, an abandoned build leaves the stored tree untouched.
//!
//! ```rust,ignore
//! let mut build = index.init(&text);
//! while let Some(event) = build.next_event().await? {
//!     reporter.report(&event);
//! }
//! let hit = index.search("how are leases renewed?").await?;
//! ```

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::chunk::chunk_text;
use crate::embedding::{embed_checked, Embedder};
use crate::error::RagError;
use crate::models::{SearchNode, TextChunk};
use crate::search::{search_tree, TreeHit};
use crate::store::TreeStore;
use crate::summarize::Summarizer;
use crate::tokenizer::Tokenizer;
use crate::tree::{TreeBuilder, TreeOptions};

/// Chunking and tree tuning for a [`TreeIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub tree: TreeOptions,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 100,
            tree: TreeOptions::default(),
        }
    }
}

/// Progress reported while a tree is being built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuildEvent {
    /// Chunk `index` (0-based) of `total` has been embedded.
    Embedded { index: usize, total: usize },
    /// The tree was built and persisted.
    Saved {
        root_id: i64,
        chunks: usize,
        nodes: usize,
        depth: usize,
    },
}

/// Search tree for one named document.
pub struct TreeIndex {
    name: String,
    root: Option<SearchNode>,
    tokenizer: Arc<dyn Tokenizer>,
    embedder: Arc<dyn Embedder>,
    summarizer: Option<Arc<dyn Summarizer>>,
    store: Arc<dyn TreeStore>,
    options: IndexOptions,
}

impl TreeIndex {
    pub fn new(
        name: impl Into<String>,
        tokenizer: Arc<dyn Tokenizer>,
        embedder: Arc<dyn Embedder>,
        summarizer: Option<Arc<dyn Summarizer>>,
        store: Arc<dyn TreeStore>,
        options: IndexOptions,
    ) -> Self {
        Self {
            name: name.into(),
            root: None,
            tokenizer,
            embedder,
            summarizer,
            store,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resident tree, if built or loaded.
    pub fn root(&self) -> Option<&SearchNode> {
        self.root.as_ref()
    }

    /// Start building the tree for `text`, replacing any stored tree.
    pub fn init<'a>(&'a mut self, text: &'a str) -> IndexBuild<'a> {
        IndexBuild {
            index: self,
            text,
            stage: Stage::Start,
        }
    }

    /// Load the stored tree if none is resident. Returns whether a tree is
    /// now available.
    pub async fn load(&mut self) -> Result<bool> {
        if self.root.is_none() {
            self.root = self.store.load_tree(&self.name).await?;
            if self.root.is_some() {
                info!(document = %self.name, "loaded tree from store");
            }
        }
        Ok(self.root.is_some())
    }

    /// Find the node most relevant to `query`.
    ///
    /// Returns `Ok(None)` when no tree exists for this document.
    pub async fn search(&mut self, query: &str) -> Result<Option<TreeHit<'_>>> {
        if !self.load().await? {
            return Ok(None);
        }
        let query_vec = embed_checked(self.embedder.as_ref(), query).await?;
        let root = match &self.root {
            Some(root) => root,
            None => return Ok(None),
        };
        if root.vector.len() != query_vec.len() {
            return Err(RagError::Configuration(format!(
                "query embedding has {} dimensions but the tree for '{}' has {}",
                query_vec.len(),
                self.name,
                root.vector.len()
            ))
            .into());
        }
        Ok(Some(search_tree(root, &query_vec)))
    }
}

enum Stage {
    Start,
    Embedding {
        chunks: std::vec::IntoIter<TextChunk>,
        leaves: Vec<SearchNode>,
        total: usize,
    },
    Done,
}

/// A tree build in progress, see [`TreeIndex::init`].
pub struct IndexBuild<'a> {
    index: &'a mut TreeIndex,
    text: &'a str,
    stage: Stage,
}

impl IndexBuild<'_> {
    /// Advance the build and return the next event, or `None` once the
    /// build has finished or failed.
    pub async fn next_event(&mut self) -> Result<Option<BuildEvent>> {
        loop {
            match std::mem::replace(&mut self.stage, Stage::Done) {
                Stage::Start => {
                    let options = &self.index.options;
                    let chunks = chunk_text(
                        self.index.tokenizer.as_ref(),
                        self.text,
                        options.max_tokens,
                        options.overlap_tokens,
                    )?;
                    if chunks.is_empty() {
                        return Err(RagError::EmptyDocument(self.index.name.clone()).into());
                    }
                    info!(document = %self.index.name, chunks = chunks.len(), "chunked document");
                    self.stage = Stage::Embedding {
                        total: chunks.len(),
                        leaves: Vec::with_capacity(chunks.len()),
                        chunks: chunks.into_iter(),
                    };
                }
                Stage::Embedding {
                    mut chunks,
                    mut leaves,
                    total,
                } => match chunks.next() {
                    Some(chunk) => {
                        let vector =
                            embed_checked(self.index.embedder.as_ref(), &chunk.text).await?;
                        leaves.push(SearchNode::leaf(vector, &chunk));
                        let index = leaves.len() - 1;
                        self.stage = Stage::Embedding {
                            chunks,
                            leaves,
                            total,
                        };
                        return Ok(Some(BuildEvent::Embedded { index, total }));
                    }
                    None => return self.finish(leaves).await.map(Some),
                },
                Stage::Done => return Ok(None),
            }
        }
    }

    /// Drive the build to completion, returning the final event.
    pub async fn run(mut self) -> Result<Option<BuildEvent>> {
        let mut last = None;
        while let Some(event) = self.next_event().await? {
            last = Some(event);
        }
        Ok(last)
    }

    async fn finish(&mut self, leaves: Vec<SearchNode>) -> Result<BuildEvent> {
        let index = &mut *self.index;
        let chunks = leaves.len();
        let builder = TreeBuilder::new(
            Arc::clone(&index.embedder),
            index.summarizer.clone(),
            index.options.tree.clone(),
        )?;
        let root = builder.build(leaves).await?;
        let root_id = index.store.save_tree(&root, &index.name).await?;
        let nodes = root.node_count();
        let depth = root.depth();
        info!(document = %index.name, root_id, nodes, depth, "saved tree");
        index.root = Some(root);
        Ok(BuildEvent::Saved {
            root_id,
            chunks,
            nodes,
            depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::store::memory::InMemoryTreeStore;
    use crate::tokenizer::WordTokenizer;

    fn index_with(store: Arc<InMemoryTreeStore>, name: &str, options: IndexOptions) -> TreeIndex {
        TreeIndex::new(
            name,
            Arc::new(WordTokenizer::new()),
            Arc::new(HashEmbedder::new(256)),
            None,
            store,
            options,
        )
    }

    fn small_chunks() -> IndexOptions {
        IndexOptions {
            max_tokens: 4,
            overlap_tokens: 0,
            tree: TreeOptions::default(),
        }
    }

    fn document() -> String {
        let topics = ["rust borrow checker", "sqlite journal mode", "kmeans centroid update"];
        (0..12)
            .map(|i| format!("{} note{}", topics[i % 3], i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_events_then_search() {
        let store = Arc::new(InMemoryTreeStore::new());
        let mut index = index_with(store.clone(), "notes", small_chunks());
        let text = document();

        let mut events = Vec::new();
        {
            let mut build = index.init(&text);
            while let Some(event) = build.next_event().await.unwrap() {
                events.push(event);
            }
            assert!(build.next_event().await.unwrap().is_none());
        }

        assert_eq!(events.len(), 13);
        for (i, event) in events[..12].iter().enumerate() {
            assert_eq!(*event, BuildEvent::Embedded { index: i, total: 12 });
        }
        match &events[12] {
            BuildEvent::Saved { chunks, nodes, .. } => {
                assert_eq!(*chunks, 12);
                assert_eq!(*nodes, store.rows().unwrap().len());
            }
            other => panic!("unexpected event {:?}", other),
        }

        let hit = index.search("sqlite journal").await.unwrap().unwrap();
        assert!(hit.node.is_leaf());
        assert!(hit.node.description.as_deref().unwrap().contains("sqlite"));
    }

    #[tokio::test]
    async fn test_fresh_index_loads_from_store() {
        let store = Arc::new(InMemoryTreeStore::new());
        let text = document();
        let mut builder = index_with(store.clone(), "notes", small_chunks());
        builder.init(&text).run().await.unwrap();

        let mut fresh = index_with(store, "notes", small_chunks());
        assert!(fresh.root().is_none());
        let hit = fresh.search("kmeans centroid").await.unwrap().unwrap();
        assert!(hit.node.description.as_deref().unwrap().contains("kmeans"));
        assert_eq!(hit.node.children, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_search_without_tree() {
        let store = Arc::new(InMemoryTreeStore::new());
        let mut index = index_with(store, "missing", small_chunks());
        assert!(index.search("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_document() {
        let store = Arc::new(InMemoryTreeStore::new());
        let mut index = index_with(store.clone(), "empty", small_chunks());
        {
            let mut build = index.init("");
            let err = build.next_event().await.unwrap_err();
            assert_eq!(
                RagError::from_anyhow(&err),
                Some(&RagError::EmptyDocument("empty".into()))
            );
            assert!(build.next_event().await.unwrap().is_none());
        }
        assert!(index.root().is_none());
        assert!(store.rows().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_build_keeps_previous_tree() {
        let store = Arc::new(InMemoryTreeStore::new());
        let text = document();
        let mut index = index_with(store.clone(), "notes", small_chunks());
        index.init(&text).run().await.unwrap();
        let before = store.rows().unwrap();

        let mut again = index_with(store.clone(), "notes", small_chunks());
        {
            let mut build = again.init("replacement text\nsecond line");
            build.next_event().await.unwrap();
        }
        assert_eq!(store.rows().unwrap(), before);
    }

    #[tokio::test]
    async fn test_three_line_document_single_chunk() {
        let store = Arc::new(InMemoryTreeStore::new());
        let mut index = index_with(store.clone(), "abc", IndexOptions::default());
        let last = index.init("A\nB\nC\n").run().await.unwrap();
        assert!(matches!(last, Some(BuildEvent::Saved { chunks: 1, nodes: 2, depth: 1, .. })));
        let leaf = &index.root().unwrap().children()[0];
        assert_eq!((leaf.start_line, leaf.end_line), (0, 3));
    }
}
