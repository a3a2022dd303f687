//! Tokenizer abstraction used for token-budget accounting.
//!
//! The chunker only needs to count tokens and turn a tail of token ids back
//! into text for overlap. The tokenizer is never used to feed the embedding
//! model, so it only has to roughly agree with the model's own tokenizer.
//!
//! [`WordTokenizer`] is a dependency-free fallback that treats each
//! whitespace-separated word as one token. The application crate provides
//! a HuggingFace `tokenizer.json` backed implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;

use crate::error::RagError;

/// Encodes text into token ids and back.
pub trait Tokenizer: Send + Sync {
    /// Encode `text` without special tokens.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    /// Decode token ids back into text.
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

#[derive(Default)]
struct Vocab {
    ids: HashMap<String, u32>,
    words: Vec<String>,
}

/// Whitespace tokenizer with a vocabulary grown on demand.
///
/// Decoding joins words with single spaces, so line breaks inside an
/// overlap tail are not preserved.
#[derive(Default)]
pub struct WordTokenizer {
    vocab: RwLock<Vocab>,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&self, word: &str) -> Result<u32> {
        if let Some(id) = self
            .vocab
            .read()
            .map_err(|_| RagError::Tokenizer("vocabulary lock poisoned".into()))?
            .ids
            .get(word)
        {
            return Ok(*id);
        }
        let mut vocab = self
            .vocab
            .write()
            .map_err(|_| RagError::Tokenizer("vocabulary lock poisoned".into()))?;
        if let Some(id) = vocab.ids.get(word) {
            return Ok(*id);
        }
        let id = vocab.words.len() as u32;
        vocab.words.push(word.to_string());
        vocab.ids.insert(word.to_string(), id);
        Ok(id)
    }
}

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        text.split_whitespace().map(|w| self.intern(w)).collect()
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let vocab = self
            .vocab
            .read()
            .map_err(|_| RagError::Tokenizer("vocabulary lock poisoned".into()))?;
        let words = ids
            .iter()
            .map(|id| {
                vocab
                    .words
                    .get(*id as usize)
                    .map(String::as_str)
                    .ok_or_else(|| RagError::Tokenizer(format!("unknown token id {}", id)))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(words.join(" "))
    }
}
