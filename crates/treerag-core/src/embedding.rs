//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements,
//! plus pure helpers for similarity and vector serialization.
//!
//! Concrete HTTP and local providers (OpenAI, Ollama, fastembed) live in
//! the `treerag` app crate. [`HashEmbedder`] is an offline provider that
//! needs no model at all.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RagError;

/// Maps text to a fixed-length vector.
///
/// Implementations must return vectors of exactly [`dims`](Embedder::dims)
/// components and be deterministic for identical input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embed `text` and check the result against the provider's dimension.
///
/// Provider errors and malformed vectors are reported as
/// [`RagError::EmbeddingFailure`].
pub async fn embed_checked(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let vector = embedder
        .embed(text)
        .await
        .map_err(|e| RagError::EmbeddingFailure(format!("{:#}", e)))?;
    if vector.len() != embedder.dims() {
        return Err(RagError::EmbeddingFailure(format!(
            "{} returned {} dimensions, expected {}",
            embedder.model_name(),
            vector.len(),
            embedder.dims()
        ))
        .into());
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(RagError::EmbeddingFailure(format!(
            "{} returned a non-finite component",
            embedder.model_name()
        ))
        .into());
    }
    Ok(vector)
}

/// Offline embedder hashing words into a fixed number of buckets.
///
/// Each lowercase alphanumeric word adds 1.0 to the bucket selected by its
/// FNV-1a hash, and the result is L2-normalized. Texts sharing words get a
/// high cosine similarity, which is enough for local runs and tests.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn bucket(&self, word: &str) -> usize {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % self.dims as u64) as usize
    }

    /// Synchronous form of [`Embedder::embed`].
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(&word.to_lowercase())] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// Encode a vector as a JSON array of numbers.
///
/// `serde_json` prints the shortest representation that parses back to the
/// same `f32`, so [`vector_from_json`] restores the exact bits. The text
/// form is also what stores compare for vector lookups.
///
/// # Example
///
/// ```rust
/// use treerag_core::embedding::{vector_from_json, vector_to_json};
///
/// let v = vec![1.0f32, -2.5, 0.1];
/// let text = vector_to_json(&v).unwrap();
/// assert_eq!(text, "[1.0,-2.5,0.1]");
/// assert_eq!(vector_from_json(&text).unwrap(), v);
/// ```
pub fn vector_to_json(vector: &[f32]) -> Result<String> {
    Ok(serde_json::to_string(vector)?)
}

/// Decode a vector written by [`vector_to_json`].
pub fn vector_from_json(text: &str) -> Result<Vec<f32>> {
    Ok(serde_json::from_str(text)?)
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-norm operand.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_json_roundtrip_exact() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001, 1.0e-7, f32::MAX, 0.1 + 0.2];
        let text = vector_to_json(&vec).unwrap();
        let restored = vector_from_json(&text).unwrap();
        assert_eq!(vec, restored);
        for (a, b) in vec.iter().zip(restored.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(vector_from_json("[1.0, \"x\"]").is_err());
        assert!(vector_from_json("not json").is_err());
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_hash_embedder_similarity() {
        let e = HashEmbedder::new(64);
        let a = e.embed_sync("rust borrow checker lifetimes");
        let b = e.embed_sync("the borrow checker and lifetimes in Rust");
        let c = e.embed_sync("banana bread recipe with walnuts");
        assert_eq!(a.len(), 64);
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
        assert_eq!(a, e.embed_sync("rust borrow checker lifetimes"));
    }

    #[tokio::test]
    async fn test_embed_checked_rejects_wrong_dims() {
        let e = FixedEmbedder(vec![1.0, 2.0]);
        let err = embed_checked(&e, "x").await.unwrap_err();
        assert!(matches!(
            RagError::from_anyhow(&err),
            Some(RagError::EmbeddingFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_embed_checked_rejects_nan() {
        let e = FixedEmbedder(vec![1.0, f32::NAN, 0.0]);
        assert!(embed_checked(&e, "x").await.is_err());
        let ok = FixedEmbedder(vec![1.0, 0.5, 0.0]);
        assert_eq!(embed_checked(&ok, "x").await.unwrap(), vec![1.0, 0.5, 0.0]);
    }
}
