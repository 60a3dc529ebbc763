//! Lloyd's k-means over unit vectors plus mean silhouette scoring, used by
//! initial partitioning (spec §4.2.1) and by split (spec §4.2.3, k fixed at
//! 2). Generalizes the teacher's "average of unit vectors" centroid idiom
//! into a full seeded clustering pass.
//!
//! Deliberately O(n·k·iterations) for assignment and O(n²) for silhouette —
//! fine for the domain sizes this system targets (tens to low hundreds of
//! paragraphs per candidate cluster run). Not intended for corpus-wide runs
//! over millions of points.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use corpus_core::types::{compute_centroid, cosine_similarity, Embedding};

pub struct KMeansResult {
    pub assignments: Vec<usize>,
    pub centroids: Vec<Embedding>,
}

/// Run Lloyd's algorithm with `k` clusters, a fixed `seed`, and up to
/// `max_iter` iterations (stops early on convergence — no assignment
/// changes between iterations).
pub fn kmeans(vectors: &[Embedding], k: usize, seed: u64, max_iter: usize) -> KMeansResult {
    assert!(k >= 1, "kmeans requires k >= 1");
    assert!(vectors.len() >= k, "kmeans requires at least k points");

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..vectors.len()).collect();
    indices.shuffle(&mut rng);
    let mut centroids: Vec<Embedding> =
        indices[..k].iter().map(|&i| vectors[i].clone()).collect();

    let mut assignments = vec![0usize; vectors.len()];

    for _ in 0..max_iter {
        let mut changed = false;
        for (i, v) in vectors.iter().enumerate() {
            let best = nearest_centroid(v, &centroids);
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }

        let mut members: Vec<Vec<Embedding>> = vec![Vec::new(); k];
        for (i, v) in vectors.iter().enumerate() {
            members[assignments[i]].push(v.clone());
        }
        for (cluster, pts) in members.iter().enumerate() {
            if !pts.is_empty() {
                centroids[cluster] = compute_centroid(pts);
            }
        }

        if !changed {
            break;
        }
    }

    KMeansResult { assignments, centroids }
}

fn nearest_centroid(v: &Embedding, centroids: &[Embedding]) -> usize {
    centroids
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            cosine_similarity(v, a)
                .partial_cmp(&cosine_similarity(v, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Mean silhouette score in [-1, 1] over the assignment produced by
/// [`kmeans`]. Distance is `1 - cosine_similarity`. A point in a
/// singleton cluster scores 0 (silhouette is undefined for |cluster| = 1;
/// the conventional fallback is to treat it as neither good nor bad).
pub fn silhouette_score(vectors: &[Embedding], assignments: &[usize], k: usize) -> f32 {
    if vectors.len() <= k {
        return 0.0;
    }
    let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); k];
    for (i, &c) in assignments.iter().enumerate() {
        clusters[c].push(i);
    }

    let mut total = 0.0f32;
    let mut count = 0usize;

    for (i, v) in vectors.iter().enumerate() {
        let own = assignments[i];
        if clusters[own].len() <= 1 {
            count += 1;
            continue;
        }

        let a = clusters[own]
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| 1.0 - cosine_similarity(v, &vectors[j]))
            .sum::<f32>()
            / (clusters[own].len() - 1) as f32;

        let b = (0..k)
            .filter(|&c| c != own && !clusters[c].is_empty())
            .map(|c| {
                clusters[c].iter().map(|&j| 1.0 - cosine_similarity(v, &vectors[j])).sum::<f32>()
                    / clusters[c].len() as f32
            })
            .fold(f32::MAX, f32::min);

        let s = if a < b {
            1.0 - a / b
        } else if a > b {
            b / a - 1.0
        } else {
            0.0
        };
        total += s;
        count += 1;
    }

    if count == 0 {
        0.0
    } else {
        total / count as f32
    }
}
