//! Sentence embedding using Candle and BGE-small-en-v1.5.
//!
//! Loads `BAAI/bge-small-en-v1.5` and computes 384-dimensional embeddings
//! for Korean statutory text. BGE is a retrieval-optimized model (CLS token
//! pooling, query instruction prefix) rather than a paraphrase-similarity
//! model, which matches a query→paragraph retrieval workload better than a
//! plain sentence-similarity model would.
//!
//! The spec's contract (§6.1) is a single `embed(text) -> vector`; this
//! provider applies the BGE retrieval instruction prefix to every call
//! rather than distinguishing query vs. stored-document embedding, since
//! the core never asks a provider to embed the same text twice in both
//! roles — see DESIGN.md for this simplification relative to the teacher's
//! `embed_query`/`embed_target` split.

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use corpus_core::error::CoreError;
use corpus_core::ports::{EmbeddingProvider, Result};
use corpus_core::types::{normalize as normalize_vec, Embedding};

const QUERY_PREFIX: &str = "Represent this sentence for searching relevant passages: ";
const MODEL_REPO: &str = "BAAI/bge-small-en-v1.5";
pub const EMBEDDING_DIM: usize = 384;

/// Sentence embedder backed by BGE-small-en-v1.5, downloaded and cached via
/// the HuggingFace Hub on first use (~130MB).
pub struct CandleEmbeddingProvider {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl CandleEmbeddingProvider {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_model(MODEL_REPO)
    }

    pub fn with_model(model_name: &str) -> anyhow::Result<Self> {
        info!("Loading embedding model: {}", model_name);

        let device = Device::Cpu;
        let api = Api::new()?;
        let repo = api.repo(Repo::new(model_name.to_string(), RepoType::Model));

        let config_path = repo.get("config.json")?;
        let tokenizer_path = repo.get("tokenizer.json")?;
        let weights_path = repo.get("model.safetensors")?;

        let config: Config = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        debug!("Model config: hidden_size={}", config.hidden_size);

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        info!("Embedding model loaded successfully (BGE-small-en-v1.5)");
        Ok(Self { model, tokenizer, device })
    }

    fn forward(&self, text: &str) -> anyhow::Result<Embedding> {
        let ids = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let input_ids = Tensor::new(ids.get_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(ids.get_attention_mask(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(ids.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let input_ids = input_ids.to_dtype(DType::U32)?;
        let token_type_ids = token_type_ids.to_dtype(DType::U32)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // CLS token pooling: take position 0 from the sequence dimension.
        let cls = output.narrow(1, 0, 1)?.squeeze(1)?;
        let normalized = Self::l2_normalize(&cls)?;
        let vec: Vec<f32> = normalized.squeeze(0)?.to_vec1()?;
        Ok(vec)
    }

    fn l2_normalize(tensor: &Tensor) -> candle_core::Result<Tensor> {
        let norm = tensor.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
        tensor.broadcast_div(&norm)
    }
}

#[async_trait]
impl EmbeddingProvider for CandleEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let prefixed = format!("{QUERY_PREFIX}{text}");
        let vec = self
            .forward(&prefixed)
            .map_err(|e| CoreError::EmbeddingUnavailable(e.to_string()))?;
        Ok(normalize_vec(vec))
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // requires model download
    async fn embed_produces_unit_vector_of_expected_dimension() {
        let provider = CandleEmbeddingProvider::new().expect("load embedder");
        let v = provider.embed("용도지역이란 무엇인가요?").await.unwrap();
        assert_eq!(v.len(), EMBEDDING_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }
}
