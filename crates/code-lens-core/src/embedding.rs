//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus pure helpers for vector validation, serialization, and similarity.
//!
//! Concrete embedders (OpenAI, Ollama) live in the `code-lens` app crate.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Maps text to a fixed-length float vector.
///
/// Implementations must fail with [`RagError::Embedding`] rather than
/// return a zero or truncated vector when the backend misbehaves.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embed `text` and reject vectors that cannot be trusted.
///
/// This is the entry point the indexer and retriever use, so a provider
/// that returns garbage is caught before anything is written or ranked.
pub async fn embed_checked(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let vector = embedder.embed(text).await?;
    validate_embedding(&vector, embedder.dims())?;
    Ok(vector)
}

/// Check that a vector has the expected length, only finite values, and
/// a non-zero norm.
pub fn validate_embedding(vector: &[f32], dims: usize) -> Result<()> {
    if vector.len() != dims {
        return Err(RagError::embedding(format!(
            "expected {} dimensions, got {}",
            dims,
            vector.len()
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(RagError::embedding("vector contains non-finite values"));
    }
    if vector.iter().all(|v| *v == 0.0) {
        return Err(RagError::embedding("vector is all zeros"));
    }
    Ok(())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use code_lens_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
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

    (dot / denom).clamp(-1.0, 1.0)
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
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_vectors() {
        assert!(validate_embedding(&[0.1, 0.2, 0.3], 3).is_ok());
        assert!(matches!(
            validate_embedding(&[0.1, 0.2], 3),
            Err(RagError::Embedding(_))
        ));
        assert!(matches!(
            validate_embedding(&[0.0, 0.0, 0.0], 3),
            Err(RagError::Embedding(_))
        ));
        assert!(matches!(
            validate_embedding(&[0.1, f32::NAN, 0.3], 3),
            Err(RagError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn test_embed_checked_rejects_wrong_dims() {
        let embedder = FixedEmbedder(vec![1.0, 0.0]);
        let err = embed_checked(&embedder, "fn main() {}").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_embed_checked_passes_valid_vector() {
        let embedder = FixedEmbedder(vec![1.0, 0.0, 0.5]);
        let v = embed_checked(&embedder, "fn main() {}").await.unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.5]);
    }
}
