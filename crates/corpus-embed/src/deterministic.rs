//! Seeded, dependency-free `EmbeddingProvider` used by `domain-manager`,
//! `domain-agent` and `coordinator` test suites so they never need model
//! weights on disk. Maps text to a fixed-dimension unit vector via SHA-256
//! expansion — deterministic, not semantically meaningful, but stable
//! enough to drive k-means/silhouette/RRF property tests against
//! reproducible clusters when combined with synthetic corpora built from a
//! small number of distinct "topic" seed strings.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use corpus_core::error::CoreError;
use corpus_core::ports::{EmbeddingProvider, Result};
use corpus_core::types::{normalize, Embedding};

pub struct DeterministicHashEmbeddingProvider {
    dimension: usize,
}

impl DeterministicHashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for DeterministicHashEmbeddingProvider {
    fn default() -> Self {
        Self::new(32)
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicHashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(CoreError::EmbeddingUnavailable("empty text".to_string()));
        }
        let mut out = Vec::with_capacity(self.dimension);
        let mut counter: u32 = 0;
        while out.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks_exact(4) {
                if out.len() >= self.dimension {
                    break;
                }
                let bits = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                // Map to [-1.0, 1.0) so the resulting vector isn't all-positive.
                let value = (bits as f32 / u32::MAX as f32) * 2.0 - 1.0;
                out.push(value);
            }
            counter += 1;
        }
        Ok(normalize(out))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_embeds_identically() {
        let p = DeterministicHashEmbeddingProvider::new(16);
        let a = p.embed("제36조").await.unwrap();
        let b = p.embed("제36조").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_embeds_differently() {
        let p = DeterministicHashEmbeddingProvider::new(16);
        let a = p.embed("제36조").await.unwrap();
        let b = p.embed("제40조").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn output_is_unit_length_and_correct_dimension() {
        let p = DeterministicHashEmbeddingProvider::new(24);
        let v = p.embed("용도지역").await.unwrap();
        assert_eq!(v.len(), 24);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let p = DeterministicHashEmbeddingProvider::new(8);
        assert!(p.embed("   ").await.is_err());
    }
}
