//! Shared fixtures for coordinator scenario tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use corpus_core::error::CoreError;
use corpus_core::ports::{EmbeddingProvider, LlmProvider, Result, SelfAssessment};
use corpus_core::testkit::InMemoryRepo;
use corpus_core::types::{normalize, Article, ArticleId, Domain, DomainId, Embedding, Paragraph, ParagraphId, StatuteId};

/// An `EmbeddingProvider` test double keyed by exact query text, matching
/// `domain-agent`'s own fixture of the same name.
#[derive(Default)]
pub struct FixedEmbedder {
    vectors: Mutex<HashMap<String, Embedding>>,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, text: &str, vector: Embedding) {
        self.vectors.lock().unwrap().insert(text.to_string(), normalize(vector));
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.vectors
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .ok_or_else(|| CoreError::EmbeddingUnavailable(format!("no fixture vector for {text:?}")))
    }

    fn dimension(&self) -> usize {
        self.vectors.lock().unwrap().values().next().map(|v| v.len()).unwrap_or(0)
    }
}

/// An `LlmProvider` test double whose `assess_domain_fit` confidence is
/// keyed by domain name, so a scenario can pin routing without depending
/// on any real model. `name_cluster` is unused by the coordinator and
/// always succeeds.
#[derive(Default)]
pub struct StubLlm {
    confidence_by_domain: HashMap<String, f32>,
}

impl StubLlm {
    pub fn new(confidence_by_domain: &[(&str, f32)]) -> Self {
        Self { confidence_by_domain: confidence_by_domain.iter().map(|(k, v)| (k.to_string(), *v)).collect() }
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn name_cluster(&self, _snippets: &[String], max_len: usize) -> Result<String> {
        Ok("테스트도메인".chars().take(max_len).collect())
    }

    async fn assess_domain_fit(&self, domain_name: &str, _snippets: &[String], _query: &str) -> Result<SelfAssessment> {
        let confidence = self.confidence_by_domain.get(domain_name).copied().unwrap_or(0.0);
        Ok(SelfAssessment { can_answer: confidence > 0.0, confidence })
    }
}

pub fn unit_axis(dim: usize, axis: usize) -> Embedding {
    let mut v = vec![0.0f32; dim];
    v[axis] = 1.0;
    v
}

pub fn make_repo() -> InMemoryRepo {
    InMemoryRepo::new()
}

pub fn add_paragraph(repo: &InMemoryRepo, article_id: &str, paragraph_id: &str, embedding: Embedding, domain: &DomainId) {
    repo.add_article(Article {
        article_id: ArticleId(article_id.to_string()),
        statute_id: StatuteId("stat-1".to_string()),
        number: "1".to_string(),
        title: "테스트 조문".to_string(),
        embedding: None,
    });
    let pid = ParagraphId(paragraph_id.to_string());
    repo.add_paragraph(Paragraph {
        paragraph_id: pid.clone(),
        article_id: ArticleId(article_id.to_string()),
        content: format!("content for {paragraph_id}"),
        embedding,
    });
    repo.set_membership_sync(&pid, domain);
}

pub fn add_domain(repo: &InMemoryRepo, id: &str, centroid: Embedding, size: usize, neighbors: Vec<&str>) {
    repo.upsert_domain_sync(Domain {
        domain_id: DomainId(id.to_string()),
        name: id.to_string(),
        centroid,
        size,
        neighbors: neighbors.into_iter().map(|n| DomainId(n.to_string())).collect(),
    });
}
