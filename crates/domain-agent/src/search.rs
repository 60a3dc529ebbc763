//! The domain agent's `search` pipeline (spec §4.3.1): a pure function over
//! a [`DomainAgentState`] value and its [`SearchDeps`], grounded on
//! `entity-gateway::search_engine`'s "interpreter with named stages, each
//! producing a ranked match" shape. Every numbered comment below refers to
//! the correspondingly numbered step in the spec.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use tracing::{debug, warn};

use corpus_core::config::CoreConfig;
use corpus_core::ports::{EmbeddingProvider, GraphRepository, Result};
use corpus_core::reference::normalize_and_extract;
use corpus_core::types::{
    decode_paragraph_id, is_appendix, DomainId, Embedding, NeighborRef, ParagraphId,
    ParagraphRecord, RecordSource, SearchStage,
};
use domain_manager::PartitionSnapshot;

use crate::agent::DomainAgentState;
use crate::events::{emit, ProgressEvent, ProgressSink};
use crate::expansion;
use crate::fusion::{fuse, minmax_normalize, StageHits};

/// Everything a `search` call needs besides the domain's own state: the
/// repository and embedder ports, the tunable config, and the partition
/// snapshot a neighbor consultation (step 11) resolves other domains'
/// states from. Bundled so the recursive A2A call doesn't have to thread
/// five separate parameters through the boxed future below.
pub struct SearchDeps<'a, R, E> {
    pub repo: &'a R,
    pub embedder: &'a E,
    pub config: &'a CoreConfig,
    pub snapshot: &'a PartitionSnapshot,
}

/// Result of a single `search` call (spec §4.3.1 step 12, §4.3.2 `complete`).
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub records: Vec<ParagraphRecord>,
    pub confidence: f32,
    /// Non-empty only when step 11 (A2A) actually fired.
    pub collaborated_domains: Vec<DomainId>,
}

/// Keep the highest score seen per id, in no particular order.
fn dedup_max(pairs: impl IntoIterator<Item = (ParagraphId, f32)>) -> HashMap<ParagraphId, f32> {
    let mut best: HashMap<ParagraphId, f32> = HashMap::new();
    for (id, score) in pairs {
        best.entry(id).and_modify(|s| *s = s.max(score)).or_insert(score);
    }
    best
}

/// Top-3 distinct candidates across steps 1–5, descending score with
/// `paragraph_id`-ascending tie-break (spec §4.3.1 step 6, "seeded from the
/// top-3 candidates produced by steps 1–5 combined").
fn top_seeds(best: &HashMap<ParagraphId, f32>) -> Vec<ParagraphId> {
    let mut all: Vec<(ParagraphId, f32)> = best.iter().map(|(id, s)| (id.clone(), *s)).collect();
    all.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal) {
        std::cmp::Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    all.into_iter().take(3).map(|(id, _)| id).collect()
}

/// `search(state, deps, query, limit) -> SearchOutcome`, matching design
/// note §9 exactly: a value object plus a pure function, no per-domain
/// subclassing. `is_collab_call` suppresses step 11 so a neighbor
/// consultation can never itself trigger a consultation (spec §4.3.1 step
/// 11, "not already a neighbor-consultation call, to prevent cycles").
/// Written as a plain fn returning a boxed future, not `async fn`, because
/// step 11 calls back into `search` itself — a directly self-recursive
/// `async fn` has no finite size.
pub fn search<'a, 'b, R, E>(
    state: &'b DomainAgentState,
    deps: &'a SearchDeps<'a, R, E>,
    query_text: &'b str,
    limit: usize,
    is_collab_call: bool,
    progress: Option<&'b ProgressSink>,
) -> Pin<Box<dyn Future<Output = Result<SearchOutcome>> + Send + 'b>>
where
    R: GraphRepository,
    E: EmbeddingProvider,
    'a: 'b,
{
    Box::pin(async move {
        let start = Instant::now();
        let domain_id = &state.domain_id;

        let membership: HashSet<ParagraphId> =
            deps.repo.paragraphs_in_domain(domain_id).await?.into_iter().collect();

        // Step 1: exact match.
        let mut exact_ids: Vec<ParagraphId> = Vec::new();
        for reference in normalize_and_extract(query_text) {
            let fragment = reference.decode_fragment();
            let mut hits = deps.repo.exact_match(&fragment, Some(domain_id)).await?;
            exact_ids.append(&mut hits);
        }
        exact_ids.sort();
        exact_ids.dedup();
        emit(progress, ProgressEvent::ExactMatch { domain_id: domain_id.clone(), matched: exact_ids.len() });

        // Step 2: query embedding. A failure here is fatal — every later
        // stage depends on having a query vector.
        let query_vector: Embedding = deps.embedder.embed(query_text).await?;

        // Step 3: paragraph-vector search.
        let k = limit * deps.config.paragraph_search_k_multiplier;
        let paragraph_hits: Vec<(ParagraphId, f32)> = deps
            .repo
            .paragraph_vector_search(&query_vector, k, Some(domain_id))
            .await?
            .into_iter()
            .filter(|(_, score)| *score >= deps.config.paragraph_sim_threshold)
            .collect();
        emit(progress, ProgressEvent::ParagraphVector { domain_id: domain_id.clone(), matched: paragraph_hits.len() });

        // Step 4: article-vector search, folded into child paragraphs at a
        // 0.95 indirectness penalty.
        let article_matches = deps
            .repo
            .article_vector_search(&query_vector, k, Some(domain_id))
            .await?;
        let mut article_folded: Vec<(ParagraphId, f32)> = Vec::new();
        for (article_id, similarity) in article_matches {
            if similarity < deps.config.paragraph_sim_threshold {
                continue;
            }
            for child in deps.repo.paragraphs_of_article(&article_id).await? {
                if membership.contains(&child) {
                    article_folded.push((child, similarity * 0.95));
                }
            }
        }

        // Step 5: relationship-vector search over containment-edge
        // embeddings, folded the same way. Not domain-filtered by the
        // repository, so results outside this domain's membership are
        // dropped here rather than leaking across domains before step 6.
        let relationship_matches = deps.repo.relationship_vector_search(&query_vector, k).await?;
        let mut relationship_folded: Vec<(ParagraphId, f32)> = Vec::new();
        for rel in relationship_matches {
            let resolved: Vec<ParagraphId> = match rel.child {
                NeighborRef::Paragraph(id) => vec![id],
                NeighborRef::Article(article_id) => deps.repo.paragraphs_of_article(&article_id).await?,
            };
            for id in resolved {
                if membership.contains(&id) {
                    relationship_folded.push((id, rel.similarity));
                }
            }
        }
        emit(
            progress,
            ProgressEvent::RelationshipVector { domain_id: domain_id.clone(), matched: relationship_folded.len() },
        );

        // Step 6: bounded graph expansion, seeded from the best of 1–5.
        let seed_pool = dedup_max(
            exact_ids
                .iter()
                .map(|id| (id.clone(), 1.0))
                .chain(paragraph_hits.iter().cloned())
                .chain(article_folded.iter().cloned())
                .chain(relationship_folded.iter().cloned()),
        );
        let seeds = top_seeds(&seed_pool);
        let expansion_hits = expansion::expand(
            deps.repo,
            domain_id,
            &query_vector,
            &seeds,
            &membership,
            deps.config.rne_radius,
            deps.config.rne_max_nodes,
        )
        .await?;
        emit(progress, ProgressEvent::Expansion { domain_id: domain_id.clone(), admitted: expansion_hits.len() });

        // Steps 7–8: min-max normalize each non-exact stage, then fuse by
        // reciprocal rank. Foreign-domain expansion hits ride along in the
        // same stage — their `source` is already set, only their score
        // participates in fusion.
        let stages = vec![
            StageHits { stage: SearchStage::ParagraphVector, hits: paragraph_hits },
            StageHits { stage: SearchStage::ArticleVector, hits: article_folded },
            StageHits { stage: SearchStage::RelationshipVector, hits: relationship_folded },
            StageHits {
                stage: SearchStage::Expansion,
                hits: expansion_hits.iter().map(|h| (h.paragraph_id.clone(), h.score)).collect(),
            },
        ];
        let fused = fuse(stages, deps.config.rrf_k);

        let expansion_source: HashMap<ParagraphId, RecordSource> =
            expansion_hits.into_iter().map(|h| (h.paragraph_id, h.source)).collect();

        let mut stage_map: HashMap<ParagraphId, Vec<SearchStage>> =
            exact_ids.iter().map(|id| (id.clone(), vec![SearchStage::Exact])).collect();

        // Step 9: appendix penalty, applied to the *raw* RRF sum before the
        // final min-max pass. Penalizing the already-normalized score would,
        // for a pool of only a couple of candidates, be applied to values
        // already squashed to exactly `{0, 1}` — a 0.5 cut on a lone `1.0`
        // still beats an untouched `0.0`, so the penalty could never change
        // who ranks first. Applying it to the raw sum first keeps the
        // relative gap between candidates meaningful going into the
        // normalization that follows.
        let mut fused_raw: HashMap<ParagraphId, f32> = HashMap::new();
        for candidate in fused {
            if exact_ids.contains(&candidate.paragraph_id) {
                continue;
            }
            fused_raw.insert(candidate.paragraph_id.clone(), candidate.rrf_score);
            stage_map.insert(candidate.paragraph_id.clone(), candidate.stages);
        }
        for (id, score) in fused_raw.iter_mut() {
            if is_appendix(id) {
                *score *= deps.config.appendix_penalty;
            }
        }
        let normalized_fused = minmax_normalize(&fused_raw);
        let fused_ids: Vec<ParagraphId> = normalized_fused.keys().cloned().collect();

        // Exact matches are placed unconditionally above the fused pool
        // (spec §4.3.1 step 8) and never normalized (step 7 excludes them),
        // though the appendix penalty still applies to their fixed score.
        let mut scores: HashMap<ParagraphId, f32> = exact_ids
            .iter()
            .map(|id| (id.clone(), if is_appendix(id) { deps.config.appendix_penalty } else { 1.0 }))
            .collect();
        scores.extend(normalized_fused);

        let by_score_desc = |scores: &HashMap<ParagraphId, f32>, ids: &mut Vec<ParagraphId>| {
            ids.sort_by(|a, b| match scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal) {
                std::cmp::Ordering::Equal => a.cmp(b),
                other => other,
            });
        };

        let mut exact_sorted = exact_ids.clone();
        by_score_desc(&scores, &mut exact_sorted);
        let mut fused_sorted = fused_ids;
        by_score_desc(&scores, &mut fused_sorted);
        let mut ordered_ids: Vec<ParagraphId> = exact_sorted;
        ordered_ids.extend(fused_sorted);

        // Step 10: self-assessed confidence.
        let mut confidence = ordered_ids.first().map(|id| scores[id]).unwrap_or(0.0);
        if ordered_ids.len() < 3 {
            confidence *= 0.8;
        }
        if ordered_ids.len() >= 2 {
            let gap = scores[&ordered_ids[0]] - scores[&ordered_ids[1]];
            if gap < 0.05 {
                confidence *= 0.9;
            }
        }

        let mut collaborated_domains: Vec<DomainId> = Vec::new();
        let mut neighbor_source: HashMap<ParagraphId, DomainId> = HashMap::new();

        // Step 11: A2A neighbor consultation.
        let deadline_exceeded = start.elapsed().as_millis() as u64 >= deps.config.agent_deadline_ms;
        if !is_collab_call && confidence < deps.config.collab_confidence_threshold && !deadline_exceeded {
            let neighbor_states: Vec<DomainAgentState> = state
                .neighbors
                .iter()
                .filter_map(|nid| DomainAgentState::from_snapshot(deps.snapshot, nid))
                .collect();

            if !neighbor_states.is_empty() {
                let deadline = std::time::Duration::from_millis(deps.config.agent_deadline_ms);
                let calls = neighbor_states.iter().map(|neighbor_state| {
                    let neighbor_id = neighbor_state.domain_id.clone();
                    async move {
                        match tokio::time::timeout(
                            deadline,
                            search(neighbor_state, deps, query_text, limit, true, None),
                        )
                        .await
                        {
                            Ok(Ok(outcome)) => Some((neighbor_id, outcome)),
                            Ok(Err(err)) => {
                                warn!(domain = %neighbor_id, error = %err, "neighbor consultation failed");
                                None
                            }
                            Err(_) => {
                                debug!(domain = %neighbor_id, "neighbor consultation timed out");
                                None
                            }
                        }
                    }
                });
                let results = futures::future::join_all(calls).await;

                for (neighbor_id, outcome) in results.into_iter().flatten() {
                    collaborated_domains.push(neighbor_id.clone());
                    for record in outcome.records {
                        let merged_score = record.score;
                        let entry_score = scores.entry(record.paragraph_id.clone()).or_insert(0.0);
                        if merged_score > *entry_score {
                            *entry_score = merged_score;
                        }
                        let entry_stages = stage_map.entry(record.paragraph_id.clone()).or_default();
                        if !entry_stages.contains(&SearchStage::Collaboration) {
                            entry_stages.push(SearchStage::Collaboration);
                        }
                        if !ordered_ids.contains(&record.paragraph_id) {
                            ordered_ids.push(record.paragraph_id.clone());
                        }
                        neighbor_source.entry(record.paragraph_id.clone()).or_insert_with(|| neighbor_id.clone());
                    }
                }

                by_score_desc(&scores, &mut ordered_ids);
                emit(
                    progress,
                    ProgressEvent::Collaboration { domain_id: domain_id.clone(), consulted: collaborated_domains.clone() },
                );
            }
        }

        // Step 12: truncate and assemble records.
        ordered_ids.truncate(limit);
        let paragraphs = deps.repo.get_paragraphs(&ordered_ids).await?;
        let content_by_id: HashMap<ParagraphId, String> =
            paragraphs.into_iter().map(|p| (p.paragraph_id, p.content)).collect();

        let mut records = Vec::with_capacity(ordered_ids.len());
        for id in &ordered_ids {
            let Some(locator) = decode_paragraph_id(id) else {
                warn!(paragraph_id = %id, "paragraph id does not decode, dropping from results");
                continue;
            };
            let source = if let Some(neighbor_id) = neighbor_source.get(id) {
                RecordSource::NeighborDomain(neighbor_id.clone())
            } else {
                expansion_source.get(id).cloned().unwrap_or_else(|| RecordSource::Domain(domain_id.clone()))
            };
            records.push(ParagraphRecord {
                paragraph_id: id.clone(),
                content: content_by_id.get(id).cloned().unwrap_or_default(),
                locator,
                score: scores[id],
                stages: stage_map.get(id).cloned().unwrap_or_default(),
                source,
            });
        }

        emit(progress, ProgressEvent::Complete { domain_id: domain_id.clone(), results: records.clone() });

        Ok(SearchOutcome { records, confidence, collaborated_domains })
    })
}
