//! Offline embedder built on feature hashing.
//!
//! Each lowercase word token is hashed (FNV-1a) into one of `dimensions`
//! buckets with a hash-derived sign, and the resulting vector is
//! L2-normalized. Identical texts always map to identical vectors, and texts
//! sharing vocabulary land close together under cosine similarity. No network
//! or model weights are involved, which makes it useful for air-gapped setups
//! and for exercising the pipeline in tests.

use async_trait::async_trait;
use tracing::debug;

use super::{EmbeddingProvider, normalize_input};
use crate::Result;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Synchronous core of [`EmbeddingProvider::embed`]
    #[inline]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let normalized = normalize_input(text).to_lowercase();
        let mut vector = vec![0.0_f32; self.dimensions];

        for token in normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Hashing embedding for text (length: {})", text.len());
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
