//! Tokenizer selection.
//!
//! With `chunking.tokenizer` set, token budgets are counted with the
//! HuggingFace tokenizer loaded from that `tokenizer.json`; otherwise the
//! core whitespace tokenizer is used.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use treerag_core::error::RagError;
use treerag_core::tokenizer::{Tokenizer, WordTokenizer};

use crate::config::ChunkingConfig;

/// [`Tokenizer`] backed by the `tokenizers` crate.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| RagError::Tokenizer(e.to_string()))
            .with_context(|| format!("Failed to load tokenizer: {}", path.display()))?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| RagError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        Ok(self
            .inner
            .decode(ids, true)
            .map_err(|e| RagError::Tokenizer(e.to_string()))?)
    }
}

pub fn create_tokenizer(config: &ChunkingConfig) -> Result<Arc<dyn Tokenizer>> {
    match &config.tokenizer {
        Some(path) => Ok(Arc::new(HfTokenizer::from_file(path)?)),
        None => Ok(Arc::new(WordTokenizer::new())),
    }
}
