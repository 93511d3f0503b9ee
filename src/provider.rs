//! Provider seams for embedding and answer generation.
//!
//! Both models live outside this crate and are reached through narrow
//! async traits. The engine awaits them while holding no lock, so slow
//! providers never stall concurrent searches or builds.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::{QuarryError, Result};

/// Maps batches of texts to fixed-dimension vectors.
///
/// Implementations must be deterministic for a given model version and
/// must return one vector per input text with a constant dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Embed a batch of texts, one vector per text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Turns an assembled prompt into an answer string.
///
/// The core performs no retries; retry policy belongs to callers.
#[async_trait]
pub trait GenerationProvider: Send + Sync + Debug {
    /// Generate an answer for `prompt`, bounded by `max_output_tokens`.
    async fn generate(&self, prompt: &str, max_output_tokens: usize) -> Result<String>;
}

/// Deterministic token-hashing embedder.
///
/// Lowercases, splits on whitespace, hashes each token into one of
/// `dimension` buckets with a fixed-seed hasher, then L2-normalizes the
/// bucket counts. Useful for tests and offline experiments; it is not a
/// semantic model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    hasher: ahash::RandomState,
}

impl HashingEmbedder {
    /// Fixed seeds keep the embedding stable across processes.
    const SEEDS: (u64, u64, u64, u64) = (
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    );

    /// Create an embedder producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(QuarryError::invalid_argument(
                "embedding dimension must be greater than zero",
            ));
        }
        let (k0, k1, k2, k3) = Self::SEEDS;
        Ok(HashingEmbedder {
            dimension,
            hasher: ahash::RandomState::with_seeds(k0, k1, k2, k3),
        })
    }

    /// The output dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let bucket = (self.hasher.hash_one(token) as usize) % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
