//! Shared fixtures for domain-manager's scenario and property tests.

use std::sync::Arc;

use async_trait::async_trait;

use corpus_core::error::CoreError;
use corpus_core::ports::{LlmProvider, Result, SelfAssessment};
use corpus_core::testkit::InMemoryRepo;
use corpus_core::types::{normalize, Article, ArticleId, Embedding, Paragraph, ParagraphId, StatuteId};
use domain_manager::DomainManager;

/// Always-available `LlmProvider` double. Returns a fixed name and a
/// fixed, confident self-assessment — domain-manager's tests exercise the
/// naming fallback path separately by constructing an always-erroring
/// variant where needed.
pub struct StubLlm;

#[async_trait]
impl LlmProvider for StubLlm {
    async fn name_cluster(&self, _snippets: &[String], max_len: usize) -> Result<String> {
        Ok("테스트도메인".chars().take(max_len).collect())
    }

    async fn assess_domain_fit(
        &self,
        _domain_name: &str,
        _representative_snippets: &[String],
        _query: &str,
    ) -> Result<SelfAssessment> {
        Ok(SelfAssessment { can_answer: true, confidence: 0.9 })
    }
}

/// An `LlmProvider` that is always unreachable — exercises the naming
/// fallback (spec §4.2.5 "the LLM being unreachable").
pub struct UnreachableLlm;

#[async_trait]
impl LlmProvider for UnreachableLlm {
    async fn name_cluster(&self, _snippets: &[String], _max_len: usize) -> Result<String> {
        Err(CoreError::LlmUnreachable("test double: always unreachable".to_string()))
    }

    async fn assess_domain_fit(
        &self,
        _domain_name: &str,
        _representative_snippets: &[String],
        _query: &str,
    ) -> Result<SelfAssessment> {
        Err(CoreError::LlmUnreachable("test double: always unreachable".to_string()))
    }
}

/// Deterministic pseudo-random unit-scale offset for index `i` over `dim`
/// components — enough jitter to keep k-means from seeing coincident
/// points without pulling an RNG crate into test fixtures.
fn jitter(i: usize, dim: usize) -> Embedding {
    (0..dim).map(|d| (((i + 1) as f32) * ((d as f32) + 1.7)).sin() * 0.05).collect()
}

pub fn embedding_near(center: &Embedding, i: usize) -> Embedding {
    let j = jitter(i, center.len());
    let v: Vec<f32> = center.iter().zip(j.iter()).map(|(c, n)| c + n).collect();
    normalize(v)
}

pub fn unit_axis(dim: usize, axis: usize) -> Embedding {
    let mut v = vec![0.0f32; dim];
    v[axis] = 1.0;
    v
}

pub fn make_repo() -> Arc<InMemoryRepo> {
    Arc::new(InMemoryRepo::new())
}

pub fn add_paragraph(repo: &InMemoryRepo, article_id: &str, paragraph_id: &str, embedding: Embedding) {
    repo.add_article(Article {
        article_id: ArticleId(article_id.to_string()),
        statute_id: StatuteId("stat-1".to_string()),
        number: "1".to_string(),
        title: "테스트 조문".to_string(),
        embedding: None,
    });
    repo.add_paragraph(Paragraph {
        paragraph_id: ParagraphId(paragraph_id.to_string()),
        article_id: ArticleId(article_id.to_string()),
        content: "테스트 내용".to_string(),
        embedding,
    });
}

pub fn new_manager(repo: Arc<InMemoryRepo>) -> DomainManager<InMemoryRepo, StubLlm> {
    DomainManager::new(repo, Arc::new(StubLlm), corpus_core::config::CoreConfig::default())
}
