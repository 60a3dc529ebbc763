//! `EmbeddingProvider` implementations for the statute retrieval core.

pub mod deterministic;
pub mod embedder;

pub use deterministic::DeterministicHashEmbeddingProvider;
pub use embedder::CandleEmbeddingProvider;
