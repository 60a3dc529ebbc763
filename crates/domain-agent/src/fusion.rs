//! Score normalization (spec §4.3.1 step 7) and reciprocal-rank fusion
//! (step 8) over the candidate pool a search's stages produced.

use std::collections::HashMap;

use corpus_core::types::{ParagraphId, SearchStage};

/// One stage's raw (paragraph_id, similarity) pairs, not yet deduplicated
/// or ranked. A stage may emit the same paragraph more than once (e.g.
/// article-vector folding several matched articles into overlapping child
/// paragraphs) — [`rank_stage`] keeps the best score per id.
pub struct StageHits {
    pub stage: SearchStage,
    pub hits: Vec<(ParagraphId, f32)>,
}

/// A ranked, normalized, deduplicated view of one stage's hits, in
/// descending score order (ties broken by `paragraph_id` ascending — spec
/// §5 "RRF's tie-break on score equality is by paragraph_id ascending").
struct RankedStage {
    stage: SearchStage,
    /// `(paragraph_id, 1-based rank, min-max normalized score)`.
    entries: Vec<(ParagraphId, usize, f32)>,
}

fn rank_stage(hits: StageHits) -> RankedStage {
    let mut best: HashMap<ParagraphId, f32> = HashMap::new();
    for (id, score) in hits.hits {
        best.entry(id)
            .and_modify(|s| *s = s.max(score))
            .or_insert(score);
    }
    let mut sorted: Vec<(ParagraphId, f32)> = best.into_iter().collect();
    sorted.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal) {
        std::cmp::Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });

    let min = sorted.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
    let max = sorted.iter().map(|(_, s)| *s).fold(f32::NEG_INFINITY, f32::max);
    let span = max - min;

    let entries = sorted
        .into_iter()
        .enumerate()
        .map(|(i, (id, score))| {
            let normalized = if span > f32::EPSILON { (score - min) / span } else { 1.0 };
            (id, i + 1, normalized)
        })
        .collect();

    RankedStage { stage: hits.stage, entries }
}

/// Per-candidate fusion accumulator: which stages touched it and its
/// summed reciprocal-rank score. Deliberately *not* min-max normalized here
/// — callers apply path-aware penalties (spec §4.3.1 step 9) to this raw
/// sum first; normalizing before the penalty would, for a small candidate
/// pool, squash every score to exactly `{0, 1}` and make the penalty unable
/// to change the ranking at all. [`minmax_normalize`] is the caller's tool
/// for producing the final `[0, 1]` display score, applied once, after the
/// penalty.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub paragraph_id: ParagraphId,
    pub stages: Vec<SearchStage>,
    pub rrf_score: f32,
}

/// Fuse several stages' hits by reciprocal-rank fusion (spec §4.3.1 steps
/// 7–8). Order-independent with respect to the order `stages` is given in
/// (testable property 7): the accumulation is a sum over a map, not an
/// iteration-order-dependent fold. Returned in descending `rrf_score` order,
/// ties broken by `paragraph_id` ascending (spec §5).
pub fn fuse(stages: Vec<StageHits>, rrf_k: f32) -> Vec<FusedCandidate> {
    let mut per_candidate: HashMap<ParagraphId, (Vec<SearchStage>, f32)> = HashMap::new();

    for stage_hits in stages {
        let ranked = rank_stage(stage_hits);
        for (id, rank, _normalized) in ranked.entries {
            let entry = per_candidate.entry(id).or_insert_with(|| (Vec::new(), 0.0));
            entry.0.push(ranked.stage);
            entry.1 += 1.0 / (rrf_k + rank as f32);
        }
    }

    let mut fused: Vec<FusedCandidate> = per_candidate
        .into_iter()
        .map(|(paragraph_id, (stages, rrf_score))| FusedCandidate { paragraph_id, stages, rrf_score })
        .collect();

    fused.sort_by(|a, b| match b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal) {
        std::cmp::Ordering::Equal => a.paragraph_id.cmp(&b.paragraph_id),
        other => other,
    });

    fused
}

/// Min-max normalize a score map to `[0, 1]`. A single-entry (or
/// all-equal) map normalizes to `1.0` throughout, matching [`rank_stage`]'s
/// convention for a zero-span input.
pub fn minmax_normalize(scores: &HashMap<ParagraphId, f32>) -> HashMap<ParagraphId, f32> {
    let min = scores.values().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.values().cloned().fold(f32::NEG_INFINITY, f32::max);
    let span = max - min;
    scores
        .iter()
        .map(|(id, v)| {
            let normalized = if span > f32::EPSILON { (v - min) / span } else { 1.0 };
            (id.clone(), normalized)
        })
        .collect()
}
