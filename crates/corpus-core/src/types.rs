//! Core domain types for the statute retrieval core.
//! These are pure value types — no sqlx, no DB dependencies.

use serde::{Deserialize, Serialize};

/// Fixed-dimension unit vector. All stored and query vectors in a single
/// deployment must come from one embedding model (§6.1) — mixing dimensions
/// is a configuration error, surfaced as `CoreError::DimensionMismatch`.
pub type Embedding = Vec<f32>;

/// Which top-level kind of statute a paragraph/article belongs to.
/// Part of `paragraph_id` decoding (invariant 5: act-§36 and decree-§36 are
/// distinct entities even when article/paragraph numbers coincide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatuteKind {
    Act,
    EnforcementDecree,
    EnforcementRule,
}

impl StatuteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Act => "act",
            Self::EnforcementDecree => "enforcement-decree",
            Self::EnforcementRule => "enforcement-rule",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "act" => Some(Self::Act),
            "enforcement-decree" => Some(Self::EnforcementDecree),
            "enforcement-rule" => Some(Self::EnforcementRule),
            _ => None,
        }
    }
}

/// Stable, globally-unique statute identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatuteId(pub String);

/// Stable article identifier, unique within its statute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleId(pub String);

/// Globally-unique paragraph identifier. Encodes statute kind + article
/// number + paragraph number (invariant 5 of §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParagraphId(pub String);

impl std::fmt::Display for ParagraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable domain identifier. Never reused across a split (invariant 4 of §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId(pub String);

impl std::fmt::Display for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded identity of a paragraph, derived from its `paragraph_id` for
/// display and for exact-match decisions (spec §4.3.1 step 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphLocator {
    pub statute_kind: StatuteKind,
    pub article_number: String,
    pub paragraph_number: Option<String>,
}

/// A statute — top-level legal document (spec §3, "Statute (S)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statute {
    pub statute_id: StatuteId,
    pub kind: StatuteKind,
    pub title: String,
}

/// An article, possibly carrying its own embedding derived from
/// title + paragraph-summary (spec §3, "Article (A)"). Article embeddings
/// are optional — not every article has one (Open Question, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub article_id: ArticleId,
    pub statute_id: StatuteId,
    pub number: String,
    pub title: String,
    pub embedding: Option<Embedding>,
}

/// The leaf-level content-bearing unit (spec §3, "Paragraph (P)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub paragraph_id: ParagraphId,
    pub article_id: ArticleId,
    pub content: String,
    pub embedding: Embedding,
}

/// Kind of neighbor relation returned by `GraphRepository::neighbors_of`
/// (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborKind {
    ContainmentParent,
    ContainmentChild,
    SiblingParagraph,
    CitationTarget,
}

/// The target of a neighbor edge. Containment parents and citation targets
/// may land on an Article rather than a Paragraph (e.g. a paragraph's
/// containing article, or a citation to a whole article) — callers that
/// walk the graph resolve an `Article` target to its child paragraphs
/// before scoring, since only paragraphs are ever returned as candidates
/// (spec §4.3.1 step 6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborRef {
    Paragraph(ParagraphId),
    Article(ArticleId),
}

/// One neighbor edge as returned by graph traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neighbor {
    pub target: NeighborRef,
    pub kind: NeighborKind,
    pub relation_label: String,
}

/// A domain — a named partition cell over embedded paragraphs (spec §3,
/// "Domain (D)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub domain_id: DomainId,
    pub name: String,
    pub centroid: Embedding,
    pub size: usize,
    pub neighbors: Vec<DomainId>,
}

/// Stage that contributed a candidate to a search result (spec §4.3.1 /
/// §6.2 `RECORD.stages`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    Exact,
    ParagraphVector,
    ArticleVector,
    RelationshipVector,
    Expansion,
    Collaboration,
}

/// Where a candidate record ultimately came from — this domain, or a
/// consulted neighbor (spec §4.3.1 step 11).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordSource {
    Domain(DomainId),
    NeighborDomain(DomainId),
}

/// A ranked paragraph record — the core's unit of output (spec §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphRecord {
    pub paragraph_id: ParagraphId,
    pub content: String,
    pub locator: ParagraphLocator,
    pub score: f32,
    pub stages: Vec<SearchStage>,
    pub source: RecordSource,
}

/// Decode a `ParagraphId` into its `(statute_kind, article_number,
/// paragraph_number)` parts (spec §3 invariant 5, §6.2 `RECORD` display
/// fields).
///
/// Convention (matches `corpus-postgres::store`'s `exact_match` regex):
/// `"<statute-kind>-<article-number>[-<paragraph-number>]"`, e.g.
/// `"act-36-1"`, `"enforcement-decree-36-1"`. Parsed from the right since
/// `enforcement-decree`/`enforcement-rule` themselves contain a hyphen.
/// An appendix (transitional-provisions) paragraph's article number carries
/// a literal `"부칙"` prefix, e.g. `"act-부칙36-1"` — this is what the
/// appendix penalty (spec §4.3.1 step 9) tests for.
pub fn decode_paragraph_id(id: &ParagraphId) -> Option<ParagraphLocator> {
    let parts: Vec<&str> = id.0.rsplitn(3, '-').collect();
    let (kind_str, article_number, paragraph_number) = match parts.len() {
        3 => (parts[2], parts[1].to_string(), Some(parts[0].to_string())),
        2 => (parts[1], parts[0].to_string(), None),
        _ => return None,
    };
    let statute_kind = StatuteKind::from_str(kind_str)?;
    Some(ParagraphLocator { statute_kind, article_number, paragraph_number })
}

/// True if a decoded (or raw) paragraph identifier denotes an appendix /
/// transitional-provisions article (spec §4.3.1 step 9).
pub fn is_appendix(id: &ParagraphId) -> bool {
    id.0.contains("부칙")
}

/// Centroid-similarity based routing candidate considered by the Coordinator
/// (spec §4.4.1).
#[derive(Debug, Clone)]
pub struct DomainCandidate {
    pub domain_id: DomainId,
    pub name: String,
    pub centroid_similarity: f32,
    pub combined_score: f32,
}

/// Cosine similarity between two equal-length vectors. Returns 0.0 for a
/// zero-length vector input rather than dividing by zero — callers treat
/// that as "no signal", not as an error, since embeddings are always
/// produced unit-normalized by a conforming `EmbeddingProvider`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "cosine_similarity: dimension mismatch");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize a vector to unit length. A zero vector is returned unchanged.
pub fn normalize(mut v: Embedding) -> Embedding {
    let n = l2_norm(&v);
    if n > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
    v
}

/// Renormalized arithmetic mean of a set of embeddings (spec §3 invariant 2,
/// and the centroid definition in the GLOSSARY). Each input is normalized
/// before averaging so unevenly-scaled embeddings don't skew the mean.
///
/// # Panics
/// Panics if `vectors` is empty or vectors have mismatched dimensions —
/// callers must never invoke this on an empty membership set (an empty
/// domain must be reaped before its centroid would need recomputing).
pub fn compute_centroid(vectors: &[Embedding]) -> Embedding {
    assert!(!vectors.is_empty(), "centroid requires at least 1 vector");
    let dim = vectors[0].len();
    let mut acc = vec![0.0f32; dim];
    for v in vectors {
        assert_eq!(v.len(), dim, "all vectors must share a dimension");
        let normalized = normalize(v.clone());
        for (i, x) in normalized.iter().enumerate() {
            acc[i] += x;
        }
    }
    let n = vectors.len() as f32;
    for x in &mut acc {
        *x /= n;
    }
    normalize(acc)
}

/// Size-weighted mean of two centroids, renormalized (spec §4.2.4 step 4 —
/// used when merging a shrunken domain into its chosen target).
pub fn weighted_merge_centroid(a: &Embedding, a_size: usize, b: &Embedding, b_size: usize) -> Embedding {
    assert_eq!(a.len(), b.len(), "weighted_merge_centroid: dimension mismatch");
    let total = (a_size + b_size) as f32;
    let wa = a_size as f32 / total;
    let wb = b_size as f32 / total;
    let merged: Vec<f32> = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| wa * x + wb * y)
        .collect();
    normalize(merged)
}
