//! Shared fixtures for domain-agent's scenario and property tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use corpus_core::error::CoreError;
use corpus_core::ports::{EmbeddingProvider, Result};
use corpus_core::testkit::InMemoryRepo;
use corpus_core::types::{normalize, Article, ArticleId, DomainId, Embedding, Paragraph, ParagraphId, StatuteId};
use domain_agent::agent::DomainAgentState;
use domain_manager::{DomainRecord, PartitionSnapshot};

/// An `EmbeddingProvider` test double keyed by exact query text, so a
/// scenario can pin a query to a hand-picked vector instead of depending on
/// any real semantic model. Unregistered text is an error, matching
/// `embedding_unavailable`'s propagation contract (spec §7).
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

pub fn domain_state(id: &str, centroid: Embedding, neighbors: Vec<&str>) -> DomainAgentState {
    DomainAgentState::new(
        DomainId(id.to_string()),
        format!("domain-{id}"),
        centroid,
        neighbors.into_iter().map(|n| DomainId(n.to_string())).collect(),
    )
}

pub fn empty_snapshot() -> PartitionSnapshot {
    PartitionSnapshot::empty()
}

/// A snapshot containing one record per given `(id, centroid, neighbor ids)`,
/// each with an empty membership set — domain-agent's `search` never reads
/// `members` off the snapshot directly (it asks the repository), so tests
/// that only exercise A2A routing don't need to populate it.
pub fn snapshot_with(domains: Vec<(&str, Embedding, Vec<&str>)>) -> PartitionSnapshot {
    let mut map = HashMap::new();
    for (id, centroid, neighbors) in domains {
        map.insert(
            DomainId(id.to_string()),
            DomainRecord {
                domain_id: DomainId(id.to_string()),
                name: format!("domain-{id}"),
                centroid: centroid.clone(),
                centroid_sum: centroid,
                members: Default::default(),
                neighbors: neighbors.into_iter().map(|n| DomainId(n.to_string())).collect(),
            },
        );
    }
    PartitionSnapshot { version: 1, domains: map }
}
