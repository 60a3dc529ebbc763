//! SQLx row types for the statute retrieval Postgres adapter.
//!
//! Each row struct derives `sqlx::FromRow` and provides `impl TryFrom<Row>
//! for <core type>`. This isolates sqlx and pgvector dependencies here,
//! keeping `corpus-core` pure.

use anyhow::anyhow;
use pgvector::Vector;
use sqlx::FromRow;

use corpus_core::error::CoreError;
use corpus_core::types::{
    Article, ArticleId, Domain, DomainId, Neighbor, NeighborKind, NeighborRef, Paragraph,
    ParagraphId, StatuteId, StatuteKind,
};

pub fn vector_to_embedding(v: Vector) -> Vec<f32> {
    v.to_vec()
}

pub fn embedding_to_vector(v: &[f32]) -> Vector {
    Vector::from(v.to_vec())
}

#[derive(Debug, FromRow)]
pub struct ParagraphRow {
    pub paragraph_id: String,
    pub article_id: String,
    pub content: String,
    pub embedding: Vector,
}

impl From<ParagraphRow> for Paragraph {
    fn from(row: ParagraphRow) -> Self {
        Paragraph {
            paragraph_id: ParagraphId(row.paragraph_id),
            article_id: ArticleId(row.article_id),
            content: row.content,
            embedding: vector_to_embedding(row.embedding),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ArticleRow {
    pub article_id: String,
    pub statute_id: String,
    pub number: String,
    pub title: String,
    pub embedding: Option<Vector>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            article_id: ArticleId(row.article_id),
            statute_id: StatuteId(row.statute_id),
            number: row.number,
            title: row.title,
            embedding: row.embedding.map(vector_to_embedding),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct DomainRow {
    pub domain_id: String,
    pub name: String,
    pub centroid: Vector,
    pub size: i64,
    pub neighbors: Vec<String>,
}

impl TryFrom<DomainRow> for Domain {
    type Error = CoreError;

    fn try_from(row: DomainRow) -> Result<Self, Self::Error> {
        Ok(Domain {
            domain_id: DomainId(row.domain_id),
            name: row.name,
            centroid: vector_to_embedding(row.centroid),
            size: usize::try_from(row.size).map_err(|e| CoreError::Internal(anyhow!(e)))?,
            neighbors: row.neighbors.into_iter().map(DomainId).collect(),
        })
    }
}

/// Row shape for `neighbors_of`: one end of an edge, with its kind tagged
/// relative to the queried paragraph (spec §4.1 `neighbors_of`).
#[derive(Debug, FromRow)]
pub struct NeighborRow {
    pub target_kind: String,
    pub target_id: String,
    pub neighbor_kind: String,
    pub relation_label: String,
}

impl TryFrom<NeighborRow> for Neighbor {
    type Error = CoreError;

    fn try_from(row: NeighborRow) -> Result<Self, Self::Error> {
        let target = match row.target_kind.as_str() {
            "paragraph" => NeighborRef::Paragraph(ParagraphId(row.target_id)),
            "article" => NeighborRef::Article(ArticleId(row.target_id)),
            other => {
                return Err(CoreError::Internal(anyhow!(
                    "unknown neighbor target_kind '{other}'"
                )))
            }
        };
        let kind = match row.neighbor_kind.as_str() {
            "containment_parent" => NeighborKind::ContainmentParent,
            "containment_child" => NeighborKind::ContainmentChild,
            "sibling_paragraph" => NeighborKind::SiblingParagraph,
            "citation_target" => NeighborKind::CitationTarget,
            other => {
                return Err(CoreError::Internal(anyhow!(
                    "unknown neighbor_kind '{other}'"
                )))
            }
        };
        Ok(Neighbor { target, kind, relation_label: row.relation_label })
    }
}

/// Row shape for `relationship_vector_search`: the child end of a
/// containment edge plus its embedding similarity to the query vector.
#[derive(Debug, FromRow)]
pub struct RelationshipMatchRow {
    pub child_kind: String,
    pub child_id: String,
    pub similarity: f32,
}

impl TryFrom<RelationshipMatchRow> for corpus_core::ports::RelationshipMatch {
    type Error = CoreError;

    fn try_from(row: RelationshipMatchRow) -> Result<Self, Self::Error> {
        let child = match row.child_kind.as_str() {
            "paragraph" => NeighborRef::Paragraph(ParagraphId(row.child_id)),
            "article" => NeighborRef::Article(ArticleId(row.child_id)),
            other => {
                return Err(CoreError::Internal(anyhow!(
                    "unknown relationship child_kind '{other}'"
                )))
            }
        };
        Ok(corpus_core::ports::RelationshipMatch { child, similarity: row.similarity })
    }
}
