//! `Coordinator::query` (spec §4.4): domain routing, parallel dispatch,
//! cross-domain fusion, and the streaming event sequence. Grounded on
//! `ob-semantic-matcher::matcher`'s top-level-orchestrator idiom: one
//! pipeline, an optional progress sink, synchronous and streaming callers
//! both funnel through it instead of duplicating logic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{instrument, warn};

use corpus_core::config::CoreConfig;
use corpus_core::error::CoreError;
use corpus_core::ports::{EmbeddingProvider, GraphRepository, LlmProvider, Result};
use corpus_core::types::{cosine_similarity, DomainCandidate, DomainId, Embedding, ParagraphId, ParagraphRecord};
use domain_agent::search::SearchDeps;
use domain_agent::{DomainAgentState, SearchOutcome};
use domain_manager::DomainManager;

use crate::events::{emit, ProgressEvent, ProgressSink};

/// The primary domain a query was routed to (spec §6.2 `primary_domain`).
#[derive(Debug, Clone)]
pub struct PrimaryDomain {
    pub id: DomainId,
    pub name: String,
}

/// A locally-recovered, quality-degrading condition (spec §7's "reserved"
/// diagnostic fields, named in full by SPEC_FULL.md §14).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: corpus_core::error::ErrorKind,
    pub domain_id: Option<DomainId>,
    pub message: String,
}

/// Result of `Coordinator::query`/`query_streaming` (spec §6.2).
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub results: Vec<ParagraphRecord>,
    pub primary_domain: PrimaryDomain,
    pub collaborated_domains: Vec<DomainId>,
    pub response_time_ms: u64,
    pub total_matched: usize,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Coordinator<R, E, L> {
    repo: Arc<R>,
    embedder: Arc<E>,
    llm: Arc<L>,
    pub(crate) manager: Arc<DomainManager<R, L>>,
    config: CoreConfig,
}

impl<R, E, L> Coordinator<R, E, L>
where
    R: GraphRepository,
    E: EmbeddingProvider,
    L: LlmProvider,
{
    pub fn new(repo: Arc<R>, embedder: Arc<E>, llm: Arc<L>, manager: Arc<DomainManager<R, L>>, config: CoreConfig) -> Self {
        Self { repo, embedder, llm, manager, config }
    }

    /// Synchronous path: no progress is reported, only the terminal
    /// outcome (spec §6.2 "Synchronous result").
    #[instrument(skip(self, query_text))]
    pub async fn query(&self, query_text: &str, limit: usize) -> Result<QueryOutcome> {
        self.run(query_text, limit, None).await
    }

    /// Streaming path: the same pipeline, with progress proxied through
    /// `sink` per spec §4.4.3. The terminal `QueryOutcome` is still
    /// returned; a caller that only wants the stream can drop it.
    #[instrument(skip(self, query_text, sink))]
    pub async fn query_streaming(&self, query_text: &str, limit: usize, sink: &ProgressSink) -> Result<QueryOutcome> {
        self.run(query_text, limit, Some(sink)).await
    }

    async fn run(&self, query_text: &str, limit: usize, sink: Option<&ProgressSink>) -> Result<QueryOutcome> {
        let start = Instant::now();
        let mut diagnostics: Vec<Diagnostic> = Vec::new();

        // Step 1 (§4.4.1): embed the query. Fatal — every later stage
        // depends on a query vector.
        let query_vector: Embedding = match self.embedder.embed(query_text).await {
            Ok(v) => v,
            Err(err) => {
                emit(sink, ProgressEvent::Error { message: err.to_string() });
                return Err(err);
            }
        };

        let snapshot = self.manager.current().await;
        if snapshot.domains.is_empty() {
            emit(sink, ProgressEvent::Error { message: "empty_corpus".to_string() });
            return Err(CoreError::EmptyCorpus);
        }

        // Step 2: top-5 domains by centroid similarity.
        let mut by_centroid: Vec<DomainCandidate> = snapshot
            .domains
            .values()
            .map(|d| DomainCandidate {
                domain_id: d.domain_id.clone(),
                name: d.name.clone(),
                centroid_similarity: cosine_similarity(&query_vector, &d.centroid),
                combined_score: 0.0,
            })
            .collect();
        by_centroid.sort_by(|a, b| {
            b.centroid_similarity.partial_cmp(&a.centroid_similarity).unwrap_or(std::cmp::Ordering::Equal)
        });
        by_centroid.truncate(5);

        // Step 3-4: LLM self-assessment per candidate, combined with
        // centroid similarity. An unreachable LLM degrades to
        // centroid-similarity-only routing for that candidate rather than
        // aborting the query (spec §7 `llm_unreachable`).
        let mut candidates = Vec::with_capacity(by_centroid.len());
        for mut candidate in by_centroid {
            let snippets = self.representative_snippets(&candidate.domain_id).await.unwrap_or_default();
            candidate.combined_score = match self.llm.assess_domain_fit(&candidate.name, &snippets, query_text).await {
                Ok(assessment) => 0.7 * assessment.confidence + 0.3 * candidate.centroid_similarity,
                Err(err) => {
                    warn!(domain_id = %candidate.domain_id, error = %err, "llm self-assessment unreachable, falling back to centroid-only routing");
                    diagnostics.push(Diagnostic {
                        kind: err.kind(),
                        domain_id: Some(candidate.domain_id.clone()),
                        message: err.to_string(),
                    });
                    candidate.centroid_similarity
                }
            };
            candidates.push(candidate);
        }
        candidates.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(std::cmp::Ordering::Equal));

        let Some(primary) = candidates.first().cloned() else {
            emit(sink, ProgressEvent::Error { message: "empty_corpus".to_string() });
            return Err(CoreError::EmptyCorpus);
        };
        let dispatch_set: Vec<DomainCandidate> = candidates.into_iter().take(self.config.coordinator_dispatch_n).collect();

        let primary_size = snapshot.domain(&primary.domain_id).map(|d| d.size()).unwrap_or(0);
        emit(
            sink,
            ProgressEvent::Started {
                primary_domain_id: primary.domain_id.clone(),
                primary_domain_name: primary.name.clone(),
                primary_domain_size: primary_size,
            },
        );

        // Steps 4.4.2: parallel dispatch, each agent under its own soft
        // deadline, the whole fan-out under the coordinator's hard
        // deadline.
        let agent_deadline = Duration::from_millis(self.config.agent_deadline_ms);
        let coordinator_deadline = Duration::from_millis(self.config.coordinator_deadline_ms);

        let deps = SearchDeps { repo: self.repo.as_ref(), embedder: self.embedder.as_ref(), config: &self.config, snapshot: &snapshot };

        let dispatch = async {
            let mut tasks = FuturesUnordered::new();
            for candidate in &dispatch_set {
                let is_primary = candidate.domain_id == primary.domain_id;
                let Some(state) = DomainAgentState::from_snapshot(&snapshot, &candidate.domain_id) else {
                    continue;
                };
                tasks.push(self.dispatch_one(state, &deps, query_text, limit, is_primary, agent_deadline, sink));
            }

            let mut outcomes: Vec<(DomainId, bool, SearchOutcome)> = Vec::new();
            let mut local_diagnostics = Vec::new();
            while let Some(outcome) = tasks.next().await {
                match outcome {
                    DispatchResult::Ok(domain_id, is_primary, out) => outcomes.push((domain_id, is_primary, out)),
                    DispatchResult::TimedOut(domain_id, elapsed_ms) => {
                        warn!(domain_id = %domain_id, elapsed_ms, "domain agent exceeded its deadline, dropping its contribution");
                        local_diagnostics.push(Diagnostic {
                            kind: corpus_core::error::ErrorKind::AgentDeadlineExceeded,
                            domain_id: Some(domain_id),
                            message: format!("agent_deadline_exceeded after {elapsed_ms}ms"),
                        });
                    }
                    DispatchResult::Failed(domain_id, err) => {
                        warn!(domain_id = %domain_id, error = %err, "domain agent call failed, dropping its contribution");
                        local_diagnostics.push(Diagnostic { kind: err.kind(), domain_id: Some(domain_id), message: err.to_string() });
                    }
                }
            }
            (outcomes, local_diagnostics)
        };

        let (outcomes, dispatch_diagnostics) = match tokio::time::timeout(coordinator_deadline, dispatch).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                emit(sink, ProgressEvent::Error { message: "coordinator_deadline_exceeded".to_string() });
                return Err(CoreError::CoordinatorDeadlineExceeded { elapsed_ms });
            }
        };
        diagnostics.extend(dispatch_diagnostics);

        // §4.4.3 step 3: collaboration, union of what each dispatched
        // agent itself consulted via A2A.
        let mut collaborated_domains: Vec<DomainId> = outcomes.iter().flat_map(|(_, _, o)| o.collaborated_domains.clone()).collect();
        collaborated_domains.sort_by(|a, b| a.0.cmp(&b.0));
        collaborated_domains.dedup();
        if !collaborated_domains.is_empty() {
            emit(sink, ProgressEvent::Collaboration { progress: 0.9, consulted: collaborated_domains.clone() });
        }

        // §4.4.2: merge by paragraph_id, summed fused score, 1.0 primary /
        // 0.8 secondary multiplier.
        let mut merged: HashMap<ParagraphId, ParagraphRecord> = HashMap::new();
        for (_, is_primary, outcome) in outcomes {
            let multiplier = if is_primary { 1.0 } else { 0.8 };
            for record in outcome.records {
                merged
                    .entry(record.paragraph_id.clone())
                    .and_modify(|existing| {
                        existing.score += record.score * multiplier;
                        for stage in &record.stages {
                            if !existing.stages.contains(stage) {
                                existing.stages.push(*stage);
                            }
                        }
                    })
                    .or_insert_with(|| ParagraphRecord { score: record.score * multiplier, ..record });
            }
        }

        let total_matched = merged.len();

        // A paragraph surfaced by both the primary domain and a secondary
        // (crossing a domain boundary via expansion or A2A) can sum past
        // 1.0 here; re-normalize the merged pool back into [0, 1] (spec
        // §6.2 `RECORD.score`) before truncating, reusing the same
        // min-max convention `domain_agent::fusion` applies per-stage.
        let raw_scores: HashMap<ParagraphId, f32> = merged.iter().map(|(id, r)| (id.clone(), r.score)).collect();
        let normalized_scores = domain_agent::fusion::minmax_normalize(&raw_scores);
        for (id, record) in merged.iter_mut() {
            record.score = normalized_scores[id];
        }

        let mut results: Vec<ParagraphRecord> = merged.into_values().collect();
        results.sort_by(|a, b| match b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Equal => a.paragraph_id.cmp(&b.paragraph_id),
            other => other,
        });
        results.truncate(limit);

        emit(sink, ProgressEvent::Enrichment { progress: 0.95 });

        let response_time_ms = start.elapsed().as_millis() as u64;
        emit(
            sink,
            ProgressEvent::Complete {
                progress: 1.0,
                results: results.clone(),
                response_time_ms,
                total_matched,
            },
        );

        Ok(QueryOutcome {
            results,
            primary_domain: PrimaryDomain { id: primary.domain_id, name: primary.name },
            collaborated_domains,
            response_time_ms,
            total_matched,
            diagnostics,
        })
    }

    /// Run one domain agent's search under its own soft deadline. The
    /// primary domain's stage events (spec §4.4.3 step 2) are proxied
    /// through `sink` with the fixed progress fractions the spec assigns
    /// them; secondary domains run silently.
    async fn dispatch_one<'a>(
        &'a self,
        state: DomainAgentState,
        deps: &'a SearchDeps<'a, R, E>,
        query_text: &'a str,
        limit: usize,
        is_primary: bool,
        deadline: Duration,
        sink: Option<&'a ProgressSink>,
    ) -> DispatchResult {
        let domain_id = state.domain_id.clone();
        let start = Instant::now();

        let timed_result = if is_primary {
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let call = domain_agent::search(&state, deps, query_text, limit, false, Some(&tx));
            tokio::pin!(call);
            let driven = async {
                loop {
                    tokio::select! {
                        biased;
                        event = rx.recv() => {
                            match event {
                                Some(event) => self.proxy_stage(sink, event),
                                None => continue,
                            }
                        }
                        outcome = &mut call => break outcome,
                    }
                }
            };
            tokio::time::timeout(deadline, driven).await
        } else {
            tokio::time::timeout(deadline, domain_agent::search(&state, deps, query_text, limit, false, None)).await
        };

        match timed_result {
            Ok(Ok(outcome)) => DispatchResult::Ok(domain_id, is_primary, outcome),
            Ok(Err(err)) => DispatchResult::Failed(domain_id, err),
            Err(_) => DispatchResult::TimedOut(domain_id, start.elapsed().as_millis() as u64),
        }
    }

    fn proxy_stage(&self, sink: Option<&ProgressSink>, event: domain_agent::ProgressEvent) {
        use domain_agent::ProgressEvent as Ev;
        let translated = match event {
            Ev::ExactMatch { domain_id, .. } => Some(ProgressEvent::Stage { stage: "exact_match", domain_id, progress: 0.2 }),
            Ev::ParagraphVector { domain_id, .. } => Some(ProgressEvent::Stage { stage: "paragraph_vector", domain_id, progress: 0.4 }),
            Ev::RelationshipVector { domain_id, .. } => Some(ProgressEvent::Stage { stage: "relationship_vector", domain_id, progress: 0.6 }),
            Ev::Expansion { domain_id, .. } => Some(ProgressEvent::Stage { stage: "expansion", domain_id, progress: 0.8 }),
            // The primary's own A2A collaboration is folded into the
            // coordinator-level `collaboration` event emitted after
            // dispatch completes, so it carries the full union of
            // consulted domains rather than just the primary's.
            Ev::Collaboration { .. } | Ev::Complete { .. } => None,
        };
        if let Some(event) = translated {
            emit(sink, event);
        }
    }

    async fn representative_snippets(&self, domain_id: &DomainId) -> Result<Vec<String>> {
        let Some(centroid) = self.manager.current().await.domain(domain_id).map(|d| d.centroid.clone()) else {
            return Ok(Vec::new());
        };
        let top = self.repo.paragraph_vector_search(&centroid, 3, Some(domain_id)).await?;
        let ids: Vec<ParagraphId> = top.into_iter().map(|(id, _)| id).collect();
        let paragraphs = self.repo.get_paragraphs(&ids).await?;
        Ok(paragraphs.into_iter().map(|p| p.content).collect())
    }
}

enum DispatchResult {
    Ok(DomainId, bool, SearchOutcome),
    TimedOut(DomainId, u64),
    Failed(DomainId, CoreError),
}
