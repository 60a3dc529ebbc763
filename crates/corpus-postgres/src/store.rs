//! Postgres implementation of `corpus_core::ports::GraphRepository`.
//!
//! All SQL is runtime-checked (`sqlx::query`/`query_as`, never
//! `sqlx::query!`) so the crate builds without a live database at compile
//! time. Vector columns use the `pgvector` extension; cosine distance via
//! the `<=>` operator, converted to similarity as `1.0 - distance`.
//!
//! Expected schema (see migrations, not included here):
//!   corpus.statutes(statute_id, kind, title)
//!   corpus.articles(article_id, statute_id, number, title, embedding vector NULL)
//!   corpus.paragraphs(paragraph_id, article_id, content, embedding vector NOT NULL)
//!   corpus.domains(domain_id, name, centroid vector, neighbors text[])
//!   corpus.membership(paragraph_id, domain_id)
//!   corpus.edges(parent_kind, parent_id, child_kind, child_id, kind, relation_label, embedding vector NULL)

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use corpus_core::error::CoreError;
use corpus_core::ports::{GraphRepository, RelationshipMatch, Result};
use corpus_core::types::{ArticleId, Domain, DomainId, Embedding, Neighbor, Paragraph, ParagraphId};

use crate::sqlx_types::{
    embedding_to_vector, vector_to_embedding, DomainRow, NeighborRow, ParagraphRow,
    RelationshipMatchRow,
};

pub struct PgGraphRepository {
    pool: PgPool,
}

impl PgGraphRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn internal(e: impl std::fmt::Display) -> CoreError {
    CoreError::RepositoryUnavailable(e.to_string())
}

#[async_trait]
impl GraphRepository for PgGraphRepository {
    async fn list_paragraphs_with_embeddings(&self) -> Result<Vec<(ParagraphId, Embedding)>> {
        let rows = sqlx::query_as::<_, ParagraphRow>(
            r#"
            SELECT paragraph_id, article_id, content, embedding
            FROM corpus.paragraphs
            ORDER BY paragraph_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows
            .into_iter()
            .map(|r| (ParagraphId(r.paragraph_id.clone()), vector_to_embedding(r.embedding)))
            .collect())
    }

    async fn paragraphs_in_domain(&self, domain_id: &DomainId) -> Result<Vec<ParagraphId>> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT paragraph_id
            FROM corpus.membership
            WHERE domain_id = $1
            ORDER BY paragraph_id
            "#,
        )
        .bind(&domain_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows.into_iter().map(ParagraphId).collect())
    }

    async fn paragraph_vector_search(
        &self,
        query_vector: &Embedding,
        k: usize,
        domain_filter: Option<&DomainId>,
    ) -> Result<Vec<(ParagraphId, f32)>> {
        let vector = embedding_to_vector(query_vector);
        let limit = k as i64;
        let rows = sqlx::query_as::<_, (String, f32)>(
            r#"
            SELECT p.paragraph_id, 1.0 - (p.embedding <=> $1) AS similarity
            FROM corpus.paragraphs p
            LEFT JOIN corpus.membership m ON m.paragraph_id = p.paragraph_id
            WHERE $2::text IS NULL OR m.domain_id = $2
            ORDER BY p.embedding <=> $1
            LIMIT $3
            "#,
        )
        .bind(&vector)
        .bind(domain_filter.map(|d| d.0.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows.into_iter().map(|(id, sim)| (ParagraphId(id), sim)).collect())
    }

    async fn article_vector_search(
        &self,
        query_vector: &Embedding,
        k: usize,
        domain_filter: Option<&DomainId>,
    ) -> Result<Vec<(ArticleId, f32)>> {
        let vector = embedding_to_vector(query_vector);
        let limit = k as i64;
        let rows = sqlx::query_as::<_, (String, f32)>(
            r#"
            SELECT a.article_id, 1.0 - (a.embedding <=> $1) AS similarity
            FROM corpus.articles a
            WHERE a.embedding IS NOT NULL
              AND (
                $2::text IS NULL
                OR EXISTS (
                    SELECT 1 FROM corpus.paragraphs p
                    JOIN corpus.membership m ON m.paragraph_id = p.paragraph_id
                    WHERE p.article_id = a.article_id AND m.domain_id = $2
                )
              )
            ORDER BY a.embedding <=> $1
            LIMIT $3
            "#,
        )
        .bind(&vector)
        .bind(domain_filter.map(|d| d.0.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows.into_iter().map(|(id, sim)| (ArticleId(id), sim)).collect())
    }

    async fn relationship_vector_search(
        &self,
        query_vector: &Embedding,
        k: usize,
    ) -> Result<Vec<RelationshipMatch>> {
        let vector = embedding_to_vector(query_vector);
        let limit = k as i64;
        let rows = sqlx::query_as::<_, RelationshipMatchRow>(
            r#"
            SELECT e.child_kind, e.child_id, 1.0 - (e.embedding <=> $1) AS similarity
            FROM corpus.edges e
            WHERE e.kind = 'containment_child' AND e.embedding IS NOT NULL
            ORDER BY e.embedding <=> $1
            LIMIT $2
            "#,
        )
        .bind(&vector)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(RelationshipMatch::try_from).collect()
    }

    async fn neighbors_of(&self, paragraph_id: &ParagraphId) -> Result<Vec<Neighbor>> {
        let rows = sqlx::query_as::<_, NeighborRow>(
            r#"
            SELECT child_kind AS target_kind, child_id AS target_id,
                   kind AS neighbor_kind, relation_label
            FROM corpus.edges
            WHERE parent_kind = 'paragraph' AND parent_id = $1
            UNION ALL
            SELECT parent_kind AS target_kind, parent_id AS target_id,
                   'containment_parent' AS neighbor_kind, relation_label
            FROM corpus.edges
            WHERE child_kind = 'paragraph' AND child_id = $1 AND kind = 'containment_child'
            UNION ALL
            SELECT 'paragraph' AS target_kind, sib.paragraph_id AS target_id,
                   'sibling_paragraph' AS neighbor_kind, 'sibling' AS relation_label
            FROM corpus.paragraphs self
            JOIN corpus.paragraphs sib ON sib.article_id = self.article_id AND sib.paragraph_id != self.paragraph_id
            WHERE self.paragraph_id = $1
            "#,
        )
        .bind(&paragraph_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(Neighbor::try_from).collect()
    }

    async fn paragraphs_of_article(&self, article_id: &ArticleId) -> Result<Vec<ParagraphId>> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT paragraph_id FROM corpus.paragraphs
            WHERE article_id = $1
            ORDER BY paragraph_id
            "#,
        )
        .bind(&article_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows.into_iter().map(ParagraphId).collect())
    }

    async fn get_paragraphs(&self, ids: &[ParagraphId]) -> Result<Vec<Paragraph>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_strs: Vec<&str> = ids.iter().map(|i| i.0.as_str()).collect();
        let rows = sqlx::query_as::<_, ParagraphRow>(
            r#"
            SELECT paragraph_id, article_id, content, embedding
            FROM corpus.paragraphs
            WHERE paragraph_id = ANY($1)
            "#,
        )
        .bind(&id_strs as &[&str])
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows.into_iter().map(Paragraph::from).collect())
    }

    async fn exact_match(
        &self,
        article_reference: &str,
        domain_filter: Option<&DomainId>,
    ) -> Result<Vec<ParagraphId>> {
        // paragraph_id convention: "<statute-kind>-<article>[-<paragraph>]".
        // Spec §4.1's exact-match rule is a plain substring test against the
        // raw paragraph_id ("the normalized article reference ... appears
        // in the paragraph's decoded paragraph_id"), not an end-anchored
        // suffix — a paragraph-less reference like "36" must still match
        // "act-36-1" (scenario S1). This intentionally does not disambiguate
        // statute kind — see DESIGN.md's Open Question decision.
        let pattern = regex::escape(article_reference);
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.paragraph_id
            FROM corpus.paragraphs p
            LEFT JOIN corpus.membership m ON m.paragraph_id = p.paragraph_id
            WHERE p.paragraph_id ~ $1
              AND ($2::text IS NULL OR m.domain_id = $2)
            ORDER BY p.paragraph_id
            "#,
        )
        .bind(&pattern)
        .bind(domain_filter.map(|d| d.0.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows.into_iter().map(ParagraphId).collect())
    }

    async fn embedding_dimension(&self) -> Result<Option<usize>> {
        let dim = sqlx::query_scalar::<_, Option<i32>>(
            r#"SELECT vector_dims(embedding) FROM corpus.paragraphs LIMIT 1"#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?
        .flatten();

        dim.map(|d| usize::try_from(d).map_err(|e| CoreError::Internal(anyhow!(e))))
            .transpose()
    }

    async fn domain_of_paragraph(&self, paragraph_id: &ParagraphId) -> Result<Option<DomainId>> {
        let id = sqlx::query_scalar::<_, Option<String>>(
            r#"SELECT domain_id FROM corpus.membership WHERE paragraph_id = $1"#,
        )
        .bind(&paragraph_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?
        .flatten();
        Ok(id.map(DomainId))
    }

    async fn upsert_domain(
        &self,
        domain_id: &DomainId,
        name: &str,
        centroid: &Embedding,
        neighbors: &[DomainId],
    ) -> Result<()> {
        let vector = embedding_to_vector(centroid);
        let neighbor_ids: Vec<&str> = neighbors.iter().map(|d| d.0.as_str()).collect();
        sqlx::query(
            r#"
            INSERT INTO corpus.domains (domain_id, name, centroid, neighbors)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (domain_id) DO UPDATE
            SET name = $2, centroid = $3, neighbors = $4
            "#,
        )
        .bind(&domain_id.0)
        .bind(name)
        .bind(&vector)
        .bind(&neighbor_ids as &[&str])
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn delete_domain(&self, domain_id: &DomainId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(internal)?;
        sqlx::query(r#"DELETE FROM corpus.membership WHERE domain_id = $1"#)
            .bind(&domain_id.0)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        sqlx::query(r#"DELETE FROM corpus.domains WHERE domain_id = $1"#)
            .bind(&domain_id.0)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        tx.commit().await.map_err(internal)?;
        Ok(())
    }

    async fn set_membership(&self, paragraph_id: &ParagraphId, domain_id: &DomainId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO corpus.membership (paragraph_id, domain_id)
            VALUES ($1, $2)
            ON CONFLICT (paragraph_id) DO UPDATE SET domain_id = $2
            "#,
        )
        .bind(&paragraph_id.0)
        .bind(&domain_id.0)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>> {
        let rows = sqlx::query_as::<_, DomainRow>(
            r#"
            SELECT d.domain_id, d.name, d.centroid, d.neighbors,
                   COALESCE(COUNT(m.paragraph_id), 0) AS size
            FROM corpus.domains d
            LEFT JOIN corpus.membership m ON m.domain_id = d.domain_id
            GROUP BY d.domain_id, d.name, d.centroid, d.neighbors
            ORDER BY d.domain_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(Domain::try_from).collect()
    }
}
