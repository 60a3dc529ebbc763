//! Bounded, cost-weighted graph walk over containment/sibling/citation
//! edges (spec §4.3.1 step 6, design note §9 "cyclic references in the
//! graph"). Seeded from the search's best candidates so far, it explores
//! outward while the accumulated edge cost stays under `RNE_RADIUS` and
//! stops once `RNE_MAX_NODES` have been admitted or the frontier empties.
//!
//! Containment and citation edges are free to cross (cost 0.0 — "traversing
//! the hierarchy is free; it preserves context"); only sibling edges cost
//! anything, priced by semantic distance to the query. A visited set plus
//! the cost ceiling is what keeps a citation cycle (statute A cites B cites
//! A) from looping forever, since a naive DFS over zero-cost edges would
//! never terminate on its own.

use std::collections::HashSet;

use corpus_core::ports::{GraphRepository, Result};
use corpus_core::types::{
    cosine_similarity, DomainId, Embedding, NeighborKind, NeighborRef, ParagraphId, RecordSource,
};

/// One node admitted by the walk: its query-similarity score and whether it
/// belongs to the searching domain or was merely glimpsed across a
/// domain boundary (spec §4.3.1 step 6, third bullet).
pub struct ExpansionHit {
    pub paragraph_id: ParagraphId,
    pub score: f32,
    pub source: RecordSource,
}

/// Pop the lowest-cost frontier entry. Frontier sizes here are bounded by
/// `RNE_MAX_NODES` (default 20) times each node's fan-out, so a linear scan
/// is simpler than a binary heap and plenty fast at this scale.
fn pop_min(frontier: &mut Vec<(f32, ParagraphId)>) -> Option<(f32, ParagraphId)> {
    let (idx, _) = frontier
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))?;
    Some(frontier.remove(idx))
}

#[allow(clippy::too_many_arguments)]
pub async fn expand<R: GraphRepository>(
    repo: &R,
    domain_id: &DomainId,
    query_vector: &Embedding,
    seeds: &[ParagraphId],
    membership: &HashSet<ParagraphId>,
    radius: f32,
    max_nodes: usize,
) -> Result<Vec<ExpansionHit>> {
    let mut visited: HashSet<ParagraphId> = seeds.iter().cloned().collect();
    let mut frontier: Vec<(f32, ParagraphId)> = seeds.iter().map(|s| (0.0, s.clone())).collect();
    let mut admitted: Vec<ExpansionHit> = Vec::new();

    while admitted.len() < max_nodes {
        let Some((cost, node)) = pop_min(&mut frontier) else { break };

        let neighbors = repo.neighbors_of(&node).await?;
        for neighbor in neighbors {
            let edge_cost = match neighbor.kind {
                NeighborKind::ContainmentParent | NeighborKind::ContainmentChild | NeighborKind::CitationTarget => {
                    0.0
                }
                NeighborKind::SiblingParagraph => {
                    let NeighborRef::Paragraph(ref sib_id) = neighbor.target else {
                        continue;
                    };
                    let Some(sib) = repo.get_paragraphs(std::slice::from_ref(sib_id)).await?.into_iter().next()
                    else {
                        continue;
                    };
                    1.0 - cosine_similarity(query_vector, &sib.embedding)
                }
            };

            let resolved: Vec<ParagraphId> = match &neighbor.target {
                NeighborRef::Paragraph(id) => vec![id.clone()],
                NeighborRef::Article(article_id) => repo.paragraphs_of_article(article_id).await?,
            };

            for target_id in resolved {
                if target_id == node || visited.contains(&target_id) {
                    continue;
                }
                let new_cost = cost + edge_cost;
                if new_cost >= radius {
                    continue;
                }
                visited.insert(target_id.clone());

                let Some(target) = repo.get_paragraphs(std::slice::from_ref(&target_id)).await?.into_iter().next()
                else {
                    continue;
                };
                let score = cosine_similarity(query_vector, &target.embedding);

                if membership.contains(&target_id) {
                    frontier.push((new_cost, target_id.clone()));
                    admitted.push(ExpansionHit { paragraph_id: target_id, score, source: RecordSource::Domain(domain_id.clone()) });
                } else {
                    let owner = repo.domain_of_paragraph(&target_id).await?;
                    let owner = owner.unwrap_or_else(|| DomainId("unknown".to_string()));
                    admitted.push(ExpansionHit { paragraph_id: target_id, score, source: RecordSource::NeighborDomain(owner) });
                    // Does not recurse from a foreign-domain node.
                }

                if admitted.len() >= max_nodes {
                    break;
                }
            }
            if admitted.len() >= max_nodes {
                break;
            }
        }
    }

    Ok(admitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::testkit::InMemoryRepo;
    use corpus_core::types::{normalize, Article, ArticleId, Paragraph, StatuteId};

    fn pid(s: &str) -> ParagraphId {
        ParagraphId(s.to_string())
    }

    fn add_para(repo: &InMemoryRepo, article: &str, id: &str, embedding: Embedding) {
        repo.add_article(Article {
            article_id: ArticleId(article.to_string()),
            statute_id: StatuteId("s".to_string()),
            number: "1".to_string(),
            title: "t".to_string(),
            embedding: None,
        });
        repo.add_paragraph(Paragraph {
            paragraph_id: pid(id),
            article_id: ArticleId(article.to_string()),
            content: "c".to_string(),
            embedding,
        });
    }

    #[tokio::test]
    async fn citation_cycle_terminates() {
        let repo = InMemoryRepo::new();
        let v = normalize(vec![1.0, 0.0]);
        add_para(&repo, "a1", "p1", v.clone());
        add_para(&repo, "a2", "p2", v.clone());
        repo.add_citation(&pid("p1"), &pid("p2"));
        repo.add_citation(&pid("p2"), &pid("p1"));

        let domain = DomainId("d1".to_string());
        let membership: HashSet<ParagraphId> = [pid("p1"), pid("p2")].into_iter().collect();

        let hits = expand(&repo, &domain, &v, &[pid("p1")], &membership, 0.25, 20).await.unwrap();
        // Citation edges are free and cyclic; a visited set must stop this
        // from looping forever, admitting each node once at most.
        assert!(hits.len() <= 2);
    }

    #[tokio::test]
    async fn foreign_domain_node_is_labeled_and_not_recursed() {
        let repo = InMemoryRepo::new();
        let v = normalize(vec![1.0, 0.0]);
        add_para(&repo, "a1", "p1", v.clone());
        add_para(&repo, "a2", "p2", v.clone());
        add_para(&repo, "a3", "p3", v.clone());
        repo.add_citation(&pid("p1"), &pid("p2"));
        repo.add_citation(&pid("p2"), &pid("p3"));
        repo.set_membership_sync(&pid("p1"), &DomainId("d1".to_string()));
        repo.set_membership_sync(&pid("p2"), &DomainId("d2".to_string()));
        repo.set_membership_sync(&pid("p3"), &DomainId("d2".to_string()));

        let domain = DomainId("d1".to_string());
        let membership: HashSet<ParagraphId> = [pid("p1")].into_iter().collect();

        let hits = expand(&repo, &domain, &v, &[pid("p1")], &membership, 0.25, 20).await.unwrap();
        assert_eq!(hits.len(), 1, "p3 must not be reached since the walk doesn't recurse past p2");
        assert_eq!(hits[0].paragraph_id, pid("p2"));
        assert_eq!(hits[0].source, RecordSource::NeighborDomain(DomainId("d2".to_string())));
    }

    #[tokio::test]
    async fn sibling_edge_costs_semantic_distance_and_can_exceed_radius() {
        let repo = InMemoryRepo::new();
        let query = normalize(vec![1.0, 0.0]);
        let close = normalize(vec![1.0, 0.0]);
        let far = normalize(vec![0.0, 1.0]);
        repo.add_article(Article {
            article_id: ArticleId("a1".to_string()),
            statute_id: StatuteId("s".to_string()),
            number: "1".to_string(),
            title: "t".to_string(),
            embedding: None,
        });
        repo.add_paragraph(Paragraph { paragraph_id: pid("seed"), article_id: ArticleId("a1".to_string()), content: "c".into(), embedding: close.clone() });
        repo.add_paragraph(Paragraph { paragraph_id: pid("far-sib"), article_id: ArticleId("a1".to_string()), content: "c".into(), embedding: far });

        let domain = DomainId("d1".to_string());
        let membership: HashSet<ParagraphId> = [pid("seed"), pid("far-sib")].into_iter().collect();

        let hits = expand(&repo, &domain, &query, &[pid("seed")], &membership, 0.25, 20).await.unwrap();
        assert!(hits.is_empty(), "an orthogonal sibling costs ~1.0, over the default radius");
    }
}
