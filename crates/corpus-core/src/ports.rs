//! Port traits — implemented by `corpus-postgres`, `corpus-embed` and
//! `corpus-llm`. Core logic depends only on these traits, never on sqlx,
//! Candle or an HTTP client directly.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{ArticleId, DomainId, Embedding, Neighbor, Paragraph, ParagraphId};

pub type Result<T> = std::result::Result<T, CoreError>;

/// The sole interface through which the rest of the core reads and writes
/// the graph (spec §4.1). No other component issues queries to the backing
/// store directly.
#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// Restartable iteration over every paragraph with an embedding. Used at
    /// startup by the partition store.
    async fn list_paragraphs_with_embeddings(&self) -> Result<Vec<(ParagraphId, Embedding)>>;

    /// Current membership of a domain, as persisted.
    async fn paragraphs_in_domain(&self, domain_id: &DomainId) -> Result<Vec<ParagraphId>>;

    /// Top-K paragraphs by cosine similarity, optionally filtered to one
    /// domain's membership.
    async fn paragraph_vector_search(
        &self,
        query_vector: &Embedding,
        k: usize,
        domain_filter: Option<&DomainId>,
    ) -> Result<Vec<(ParagraphId, f32)>>;

    /// Top-K articles by cosine similarity over article embeddings where
    /// present, optionally filtered to one domain's membership (via its
    /// child paragraphs).
    async fn article_vector_search(
        &self,
        query_vector: &Embedding,
        k: usize,
        domain_filter: Option<&DomainId>,
    ) -> Result<Vec<(ArticleId, f32)>>;

    /// Top-K containment edges by edge-embedding similarity.
    async fn relationship_vector_search(
        &self,
        query_vector: &Embedding,
        k: usize,
    ) -> Result<Vec<RelationshipMatch>>;

    /// Containment parents, sibling paragraphs under the same article,
    /// containment children, and citation targets for a node.
    async fn neighbors_of(&self, paragraph_id: &ParagraphId) -> Result<Vec<Neighbor>>;

    /// Child paragraphs of an article (used to fold article matches and
    /// relationship matches back into paragraph candidates).
    async fn paragraphs_of_article(&self, article_id: &ArticleId) -> Result<Vec<ParagraphId>>;

    /// Full paragraph records (content + embedding) for a set of ids, in no
    /// particular order. Used to render `ParagraphRecord::content` and to
    /// sample snippets for domain naming (spec §4.2.5).
    async fn get_paragraphs(&self, ids: &[ParagraphId]) -> Result<Vec<Paragraph>>;

    /// Paragraphs within `domain_id` whose decoded `paragraph_id` matches
    /// the normalized article reference extracted from the query text
    /// (spec §4.3.1 step 1, §9 "Korean text normalization").
    async fn exact_match(
        &self,
        article_reference: &str,
        domain_filter: Option<&DomainId>,
    ) -> Result<Vec<ParagraphId>>;

    /// Embedding dimension of the currently indexed paragraphs, if known.
    async fn embedding_dimension(&self) -> Result<Option<usize>>;

    /// The domain currently owning `paragraph_id`, if it has a membership
    /// edge at all. Used by graph expansion (spec §4.3.1 step 6) to label a
    /// node reached outside the searching domain's membership as
    /// `source = neighbor_domain` without guessing at its owner.
    async fn domain_of_paragraph(&self, paragraph_id: &ParagraphId) -> Result<Option<DomainId>>;

    async fn upsert_domain(
        &self,
        domain_id: &DomainId,
        name: &str,
        centroid: &Embedding,
        neighbors: &[DomainId],
    ) -> Result<()>;

    async fn delete_domain(&self, domain_id: &DomainId) -> Result<()>;

    async fn set_membership(&self, paragraph_id: &ParagraphId, domain_id: &DomainId) -> Result<()>;

    /// All currently persisted domains (used by `list_domains` and to seed
    /// the in-memory partition store at startup).
    async fn list_domains(&self) -> Result<Vec<crate::types::Domain>>;
}

/// One relationship (containment edge) match: the child end of the edge,
/// and the edge-embedding similarity to the query. The parent is not
/// exposed — step 5 of the search pipeline only ever emits the child
/// (folding an article child into its grandchild paragraphs).
#[derive(Debug, Clone)]
pub struct RelationshipMatch {
    pub child: crate::types::NeighborRef,
    pub similarity: f32,
}

/// Deterministic mapping from text to a fixed-dimension unit vector (spec
/// §6.1). One provider instance per configured model — the core depends
/// only on this `embed(text) -> vector` contract.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
    fn dimension(&self) -> usize;
}

/// Chat-completion style text generation used for domain naming and
/// self-assessment (spec §6.1, §4.2.5, §4.4.1).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Ask for a short noun-phrase name (≤ `max_len` chars) summarizing the
    /// dominant theme of the given snippets.
    async fn name_cluster(&self, snippets: &[String], max_len: usize) -> Result<String>;

    /// Ask whether an expert on `domain_name` (given its top representative
    /// snippets) could answer `query`.
    async fn assess_domain_fit(
        &self,
        domain_name: &str,
        representative_snippets: &[String],
        query: &str,
    ) -> Result<SelfAssessment>;
}

#[derive(Debug, Clone, Copy)]
pub struct SelfAssessment {
    pub can_answer: bool,
    pub confidence: f32,
}
