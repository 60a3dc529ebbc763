//! In-memory `GraphRepository` double. Implements the same port trait as
//! a real Postgres adapter (the teacher's "adapter behind a trait, fake
//! behind the same trait for tests" idiom) so domain-manager, domain-agent
//! and coordinator tests never need a live database.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::ports::{GraphRepository, RelationshipMatch, Result};
use crate::types::{
    Article, ArticleId, Domain, DomainId, Embedding, Neighbor, NeighborKind, NeighborRef,
    Paragraph, ParagraphId, cosine_similarity,
};

#[derive(Default)]
struct State {
    paragraphs: HashMap<ParagraphId, Paragraph>,
    articles: HashMap<ArticleId, Article>,
    article_children: HashMap<ArticleId, Vec<ParagraphId>>,
    paragraph_parent: HashMap<ParagraphId, ArticleId>,
    citations: HashMap<ParagraphId, Vec<ParagraphId>>,
    relationship_edges: Vec<(NeighborRef, Embedding)>,
    membership: HashMap<ParagraphId, DomainId>,
    domains: HashMap<DomainId, Domain>,
}

/// A fully in-process `GraphRepository`. Construct with [`InMemoryRepo::new`]
/// then populate it with the `add_*` builder methods before handing it to
/// a `DomainManager`, `DomainAgent` or `Coordinator` under test.
pub struct InMemoryRepo {
    state: RwLock<State>,
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self { state: RwLock::new(State::default()) }
    }

    pub fn add_article(&self, article: Article) {
        let mut s = self.state.write().unwrap();
        s.article_children.entry(article.article_id.clone()).or_default();
        s.articles.insert(article.article_id.clone(), article);
    }

    pub fn add_paragraph(&self, paragraph: Paragraph) {
        let mut s = self.state.write().unwrap();
        let article_id = paragraph.article_id.clone();
        s.article_children.entry(article_id.clone()).or_default().push(paragraph.paragraph_id.clone());
        s.paragraph_parent.insert(paragraph.paragraph_id.clone(), article_id);
        s.paragraphs.insert(paragraph.paragraph_id.clone(), paragraph);
    }

    pub fn add_citation(&self, from: &ParagraphId, to: &ParagraphId) {
        let mut s = self.state.write().unwrap();
        s.citations.entry(from.clone()).or_default().push(to.clone());
    }

    /// Register a containment edge embedding. `child` is the child end;
    /// `child_is_article` callers pass `NeighborRef::Article` directly.
    pub fn add_relationship_edge(&self, child: NeighborRef, embedding: Embedding) {
        self.state.write().unwrap().relationship_edges.push((child, embedding));
    }

    pub fn set_membership_sync(&self, paragraph_id: &ParagraphId, domain_id: &DomainId) {
        self.state.write().unwrap().membership.insert(paragraph_id.clone(), domain_id.clone());
    }

    pub fn upsert_domain_sync(&self, domain: Domain) {
        self.state.write().unwrap().domains.insert(domain.domain_id.clone(), domain);
    }

    pub fn paragraph_count(&self) -> usize {
        self.state.read().unwrap().paragraphs.len()
    }
}

#[async_trait]
impl GraphRepository for InMemoryRepo {
    async fn list_paragraphs_with_embeddings(&self) -> Result<Vec<(ParagraphId, Embedding)>> {
        let s = self.state.read().unwrap();
        Ok(s.paragraphs
            .values()
            .map(|p| (p.paragraph_id.clone(), p.embedding.clone()))
            .collect())
    }

    async fn paragraphs_in_domain(&self, domain_id: &DomainId) -> Result<Vec<ParagraphId>> {
        let s = self.state.read().unwrap();
        Ok(s.membership
            .iter()
            .filter(|(_, d)| *d == domain_id)
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn paragraph_vector_search(
        &self,
        query_vector: &Embedding,
        k: usize,
        domain_filter: Option<&DomainId>,
    ) -> Result<Vec<(ParagraphId, f32)>> {
        let s = self.state.read().unwrap();
        let mut scored: Vec<(ParagraphId, f32)> = s
            .paragraphs
            .values()
            .filter(|p| match domain_filter {
                Some(d) => s.membership.get(&p.paragraph_id) == Some(d),
                None => true,
            })
            .map(|p| (p.paragraph_id.clone(), cosine_similarity(query_vector, &p.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn article_vector_search(
        &self,
        query_vector: &Embedding,
        k: usize,
        domain_filter: Option<&DomainId>,
    ) -> Result<Vec<(ArticleId, f32)>> {
        let s = self.state.read().unwrap();
        let mut scored: Vec<(ArticleId, f32)> = s
            .articles
            .values()
            .filter_map(|a| {
                let emb = a.embedding.as_ref()?;
                if let Some(d) = domain_filter {
                    let in_domain = s
                        .article_children
                        .get(&a.article_id)
                        .map(|children| children.iter().any(|c| s.membership.get(c) == Some(d)))
                        .unwrap_or(false);
                    if !in_domain {
                        return None;
                    }
                }
                Some((a.article_id.clone(), cosine_similarity(query_vector, emb)))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn relationship_vector_search(
        &self,
        query_vector: &Embedding,
        k: usize,
    ) -> Result<Vec<RelationshipMatch>> {
        let s = self.state.read().unwrap();
        let mut scored: Vec<RelationshipMatch> = s
            .relationship_edges
            .iter()
            .map(|(child, emb)| RelationshipMatch {
                child: child.clone(),
                similarity: cosine_similarity(query_vector, emb),
            })
            .collect();
        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn neighbors_of(&self, paragraph_id: &ParagraphId) -> Result<Vec<Neighbor>> {
        let s = self.state.read().unwrap();
        let mut out = Vec::new();
        if let Some(article_id) = s.paragraph_parent.get(paragraph_id) {
            out.push(Neighbor {
                target: NeighborRef::Article(article_id.clone()),
                kind: NeighborKind::ContainmentParent,
                relation_label: "contains".to_string(),
            });
            if let Some(siblings) = s.article_children.get(article_id) {
                for sib in siblings {
                    if sib != paragraph_id {
                        out.push(Neighbor {
                            target: NeighborRef::Paragraph(sib.clone()),
                            kind: NeighborKind::SiblingParagraph,
                            relation_label: "sibling".to_string(),
                        });
                    }
                }
            }
        }
        if let Some(targets) = s.citations.get(paragraph_id) {
            for t in targets {
                out.push(Neighbor {
                    target: NeighborRef::Paragraph(t.clone()),
                    kind: NeighborKind::CitationTarget,
                    relation_label: "cites".to_string(),
                });
            }
        }
        Ok(out)
    }

    async fn paragraphs_of_article(&self, article_id: &ArticleId) -> Result<Vec<ParagraphId>> {
        let s = self.state.read().unwrap();
        Ok(s.article_children.get(article_id).cloned().unwrap_or_default())
    }

    async fn get_paragraphs(&self, ids: &[ParagraphId]) -> Result<Vec<Paragraph>> {
        let s = self.state.read().unwrap();
        Ok(ids.iter().filter_map(|id| s.paragraphs.get(id).cloned()).collect())
    }

    async fn exact_match(
        &self,
        article_reference: &str,
        domain_filter: Option<&DomainId>,
    ) -> Result<Vec<ParagraphId>> {
        let s = self.state.read().unwrap();
        Ok(s.paragraphs
            .values()
            .filter(|p| p.paragraph_id.0.contains(article_reference))
            .filter(|p| match domain_filter {
                Some(d) => s.membership.get(&p.paragraph_id) == Some(d),
                None => true,
            })
            .map(|p| p.paragraph_id.clone())
            .collect())
    }

    async fn embedding_dimension(&self) -> Result<Option<usize>> {
        let s = self.state.read().unwrap();
        Ok(s.paragraphs.values().next().map(|p| p.embedding.len()))
    }

    async fn domain_of_paragraph(&self, paragraph_id: &ParagraphId) -> Result<Option<DomainId>> {
        Ok(self.state.read().unwrap().membership.get(paragraph_id).cloned())
    }

    async fn upsert_domain(
        &self,
        domain_id: &DomainId,
        name: &str,
        centroid: &Embedding,
        neighbors: &[DomainId],
    ) -> Result<()> {
        let mut s = self.state.write().unwrap();
        let size = s.membership.values().filter(|d| *d == domain_id).count();
        s.domains.insert(
            domain_id.clone(),
            Domain {
                domain_id: domain_id.clone(),
                name: name.to_string(),
                centroid: centroid.clone(),
                size,
                neighbors: neighbors.to_vec(),
            },
        );
        Ok(())
    }

    async fn delete_domain(&self, domain_id: &DomainId) -> Result<()> {
        let mut s = self.state.write().unwrap();
        s.domains.remove(domain_id);
        s.membership.retain(|_, d| d != domain_id);
        Ok(())
    }

    async fn set_membership(&self, paragraph_id: &ParagraphId, domain_id: &DomainId) -> Result<()> {
        if !self.state.read().unwrap().paragraphs.contains_key(paragraph_id) {
            return Err(CoreError::InvariantViolation(format!(
                "set_membership on unknown paragraph {paragraph_id}"
            )));
        }
        self.state.write().unwrap().membership.insert(paragraph_id.clone(), domain_id.clone());
        Ok(())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>> {
        Ok(self.state.read().unwrap().domains.values().cloned().collect())
    }
}
