//! The Domain Manager (spec §4.2): the sole writer of domains and
//! membership. Holds the authoritative [`PartitionSnapshot`] behind a
//! `tokio::sync::RwLock` and replaces it wholesale on every commit so that
//! a `DomainAgent` or `Coordinator` holding a snapshot reference never
//! observes a torn partition (spec §5).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use corpus_core::config::CoreConfig;
use corpus_core::error::CoreError;
use corpus_core::ports::{GraphRepository, LlmProvider, Result};
use corpus_core::types::{
    compute_centroid, cosine_similarity, weighted_merge_centroid, DomainId, Embedding, ParagraphId,
};

use crate::kmeans::{kmeans, silhouette_score};
use crate::store::{centroid_sum_of, DomainRecord, PartitionSnapshot};

/// Result of `initialize_partition`, `rebalance_now`, `split_domain` and
/// `merge_domain` (spec §6.3 admin operations).
#[derive(Debug, Clone, Default)]
pub struct RebalanceReport {
    pub domains_before: usize,
    pub domains_after: usize,
    pub splits: usize,
    pub merges: usize,
    pub non_compliant: usize,
}

/// Deterministic seed for a given k — "a fixed random seed" (spec §4.2.1
/// step 2) means reproducible per-k, not globally constant.
fn seed_for_k(k: usize) -> u64 {
    1_000 + k as u64
}

fn short_id(domain_id: &DomainId) -> String {
    domain_id.0.chars().take(8).collect()
}

pub struct DomainManager<R, L> {
    repo: Arc<R>,
    llm: Arc<L>,
    config: CoreConfig,
    snapshot: RwLock<Arc<PartitionSnapshot>>,
}

impl<R, L> DomainManager<R, L>
where
    R: GraphRepository,
    L: LlmProvider,
{
    pub fn new(repo: Arc<R>, llm: Arc<L>, config: CoreConfig) -> Self {
        Self { repo, llm, config, snapshot: RwLock::new(Arc::new(PartitionSnapshot::empty())) }
    }

    /// The snapshot in effect right now. Callers (domain agents,
    /// coordinator) hold onto the `Arc` for the lifetime of one search so
    /// later commits never mutate state they're reading (spec §5).
    pub async fn current(&self) -> Arc<PartitionSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Load persisted domains and membership from the Repository. Used at
    /// startup before deciding whether `initialize_partition` has work to
    /// do.
    pub async fn load(&self) -> Result<()> {
        let domains = self.repo.list_domains().await?;
        let mut records = HashMap::new();
        for d in domains {
            let members = self.repo.paragraphs_in_domain(&d.domain_id).await?;
            records.insert(
                d.domain_id.clone(),
                DomainRecord {
                    domain_id: d.domain_id,
                    name: d.name,
                    centroid: d.centroid.clone(),
                    centroid_sum: d.centroid,
                    members: members.into_iter().collect(),
                    neighbors: d.neighbors,
                },
            );
        }
        let mut guard = self.snapshot.write().await;
        *guard = Arc::new(guard.committed(records));
        Ok(())
    }

    /// Initial partitioning (spec §4.2.1). No-op (returns the current
    /// counts) if domains already exist.
    pub async fn initialize_partition(&self) -> Result<RebalanceReport> {
        {
            let snap = self.current().await;
            if !snap.domains.is_empty() {
                let n = snap.domains.len();
                return Ok(RebalanceReport { domains_before: n, domains_after: n, ..Default::default() });
            }
        }

        let paragraphs = self.repo.list_paragraphs_with_embeddings().await?;
        if paragraphs.is_empty() {
            return Err(CoreError::EmptyCorpus);
        }

        let ids: Vec<ParagraphId> = paragraphs.iter().map(|(id, _)| id.clone()).collect();
        let vectors: Vec<Embedding> = paragraphs.into_iter().map(|(_, e)| e).collect();

        let k_max = self.config.k_max.min(vectors.len().saturating_sub(1)).max(self.config.k_min);
        let mut best: Option<(f32, crate::kmeans::KMeansResult)> = None;
        for k in self.config.k_min..=k_max {
            if vectors.len() < k {
                break;
            }
            let result = kmeans(&vectors, k, seed_for_k(k), 100);
            let score = silhouette_score(&vectors, &result.assignments, k);
            let better = match &best {
                None => true,
                // Strict `>`: iterating k ascending and only replacing on a
                // strictly higher score keeps the smaller k on ties (spec
                // §4.2.1 step 3, "prefer smaller k").
                Some((best_score, _)) => score > *best_score,
            };
            if better {
                best = Some((score, result));
            }
        }
        let (_, result) = best.ok_or_else(|| {
            CoreError::InvariantViolation("no candidate k produced a clustering".to_string())
        })?;
        let k = result.centroids.len();

        let mut clusters: Vec<Vec<(ParagraphId, Embedding)>> = vec![Vec::new(); k];
        for (i, &label) in result.assignments.iter().enumerate() {
            clusters[label].push((ids[i].clone(), vectors[i].clone()));
        }

        let mut records: HashMap<DomainId, DomainRecord> = HashMap::new();
        for cluster in clusters.into_iter() {
            if cluster.is_empty() {
                continue;
            }
            let domain_id = DomainId(Uuid::new_v4().to_string());
            let cluster_vectors: Vec<Embedding> = cluster.iter().map(|(_, e)| e.clone()).collect();
            let cluster_ids: Vec<ParagraphId> = cluster.iter().map(|(id, _)| id.clone()).collect();
            let centroid = compute_centroid(&cluster_vectors);
            let name = self.name_domain(&domain_id, &cluster_ids).await;
            records.insert(
                domain_id.clone(),
                DomainRecord {
                    domain_id,
                    name,
                    centroid: centroid.clone(),
                    centroid_sum: centroid_sum_of(&cluster_vectors),
                    members: cluster_ids.into_iter().collect(),
                    neighbors: Vec::new(),
                },
            );
        }

        let all_ids: Vec<DomainId> = records.keys().cloned().collect();
        self.recompute_neighbors_for(&all_ids, &mut records);

        for rec in records.values() {
            self.repo.upsert_domain(&rec.domain_id, &rec.name, &rec.centroid, &rec.neighbors).await?;
            for member in &rec.members {
                self.repo.set_membership(member, &rec.domain_id).await?;
            }
        }

        let domains_after = records.len();
        let mut guard = self.snapshot.write().await;
        *guard = Arc::new(guard.committed(records));

        Ok(RebalanceReport { domains_before: 0, domains_after, splits: 0, merges: 0, non_compliant: 0 })
    }

    /// Admit a newly-embedded paragraph (spec §4.2.2): assign to the
    /// most-similar domain, fold it into that domain's running centroid
    /// sum online, and enqueue a split if the domain is now oversized.
    pub async fn admit_paragraph(&self, paragraph_id: ParagraphId, embedding: Embedding) -> Result<()> {
        let snap = self.current().await;
        if snap.domains.is_empty() {
            return Err(CoreError::EmptyCorpus);
        }

        let (best_id, best_similarity) = snap
            .domains
            .values()
            .map(|d| (d.domain_id.clone(), cosine_similarity(&embedding, &d.centroid)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .expect("snapshot checked non-empty above");

        if best_similarity < self.config.domain_admit_threshold {
            warn!(
                paragraph_id = %paragraph_id,
                domain_id = %best_id,
                similarity = best_similarity,
                "admitting paragraph below domain_admit_threshold; no orphan state exists"
            );
        }

        let mut domains = snap.domains.clone();
        let new_size = {
            let rec = domains.get_mut(&best_id).expect("domain looked up from this snapshot");
            rec.admit(paragraph_id.clone(), &embedding);
            rec.size()
        };

        self.repo.set_membership(&paragraph_id, &best_id).await?;
        {
            let rec = &domains[&best_id];
            self.repo.upsert_domain(&rec.domain_id, &rec.name, &rec.centroid, &rec.neighbors).await?;
        }

        {
            let mut guard = self.snapshot.write().await;
            *guard = Arc::new(guard.committed(domains));
        }

        if new_size > self.config.max_domain_size {
            self.split_domain(&best_id).await?;
        }

        Ok(())
    }

    /// Split an oversized domain (spec §4.2.3). Returns `false` (no-op) if
    /// the domain no longer exists, is not actually oversized, doesn't have
    /// enough embedded members to cluster, or would leave a half below
    /// `min_domain_size` — in which case it is left oversized with a
    /// warning for the next rebalance pass to retry.
    pub async fn split_domain(&self, domain_id: &DomainId) -> Result<bool> {
        let snap = self.current().await;
        let Some(rec) = snap.domain(domain_id) else {
            return Ok(false);
        };
        if rec.size() <= self.config.max_domain_size {
            return Ok(false);
        }

        let members: Vec<ParagraphId> = rec.members.iter().cloned().collect();
        let fetched = self.repo.get_paragraphs(&members).await?;
        let mut by_id: HashMap<ParagraphId, Embedding> =
            fetched.into_iter().map(|p| (p.paragraph_id, p.embedding)).collect();
        let mut ids = Vec::with_capacity(members.len());
        let mut vectors = Vec::with_capacity(members.len());
        for id in &members {
            if let Some(v) = by_id.remove(id) {
                ids.push(id.clone());
                vectors.push(v);
            }
        }

        if vectors.len() < 2 {
            warn!(domain_id = %domain_id, "split skipped: fewer than 2 embedded members available");
            return Ok(false);
        }

        let result = kmeans(&vectors, 2, seed_for_k(2), 100);
        let mut halves: [Vec<(ParagraphId, Embedding)>; 2] = [Vec::new(), Vec::new()];
        for (i, &label) in result.assignments.iter().enumerate() {
            halves[label].push((ids[i].clone(), vectors[i].clone()));
        }

        if halves[0].len() < self.config.min_domain_size || halves[1].len() < self.config.min_domain_size {
            warn!(
                domain_id = %domain_id,
                half_a = halves[0].len(),
                half_b = halves[1].len(),
                "split aborted: a half would fall below min_domain_size; domain left oversized"
            );
            return Ok(false);
        }

        let mut domains = snap.domains.clone();
        domains.remove(domain_id);

        let mut new_ids = Vec::with_capacity(2);
        for half in &halves {
            let half_vectors: Vec<Embedding> = half.iter().map(|(_, e)| e.clone()).collect();
            let half_ids: Vec<ParagraphId> = half.iter().map(|(id, _)| id.clone()).collect();
            let new_domain_id = DomainId(Uuid::new_v4().to_string());
            let centroid = compute_centroid(&half_vectors);
            let name = self.name_domain(&new_domain_id, &half_ids).await;
            domains.insert(
                new_domain_id.clone(),
                DomainRecord {
                    domain_id: new_domain_id.clone(),
                    name,
                    centroid: centroid.clone(),
                    centroid_sum: centroid_sum_of(&half_vectors),
                    members: half_ids.into_iter().collect(),
                    neighbors: Vec::new(),
                },
            );
            new_ids.push(new_domain_id);
        }

        let affected: Vec<DomainId> = domains
            .iter()
            .filter(|(id, rec)| !new_ids.contains(id) && rec.neighbors.contains(domain_id))
            .map(|(id, _)| id.clone())
            .collect();
        for rec in domains.values_mut() {
            rec.neighbors.retain(|n| n != domain_id);
        }

        let mut targets = new_ids.clone();
        targets.extend(affected);
        self.recompute_neighbors_for(&targets, &mut domains);

        self.repo.delete_domain(domain_id).await?;
        for id in &new_ids {
            let rec = &domains[id];
            self.repo.upsert_domain(&rec.domain_id, &rec.name, &rec.centroid, &rec.neighbors).await?;
            for member in &rec.members {
                self.repo.set_membership(member, &rec.domain_id).await?;
            }
        }
        for id in &targets {
            if new_ids.contains(id) {
                continue;
            }
            if let Some(rec) = domains.get(id) {
                self.repo.upsert_domain(&rec.domain_id, &rec.name, &rec.centroid, &rec.neighbors).await?;
            }
        }

        let mut guard = self.snapshot.write().await;
        *guard = Arc::new(guard.committed(domains));

        Ok(true)
    }

    /// Merge an undersized domain into its most similar eligible neighbor
    /// by centroid (spec §4.2.4). Returns `false` if the domain no longer
    /// exists, is not actually undersized, or every other domain is too
    /// large to absorb it.
    pub async fn merge_domain(&self, domain_id: &DomainId) -> Result<bool> {
        let snap = self.current().await;
        let Some(small) = snap.domain(domain_id) else {
            return Ok(false);
        };
        if small.size() >= self.config.min_domain_size {
            return Ok(false);
        }

        let target = snap
            .domains
            .values()
            .filter(|d| d.domain_id != *domain_id)
            .filter(|d| d.size() + small.size() <= self.config.max_domain_size)
            .map(|d| (d.domain_id.clone(), cosine_similarity(&small.centroid, &d.centroid)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let Some((target_id, _)) = target else {
            warn!(domain_id = %domain_id, "merge skipped: every other domain is too large to absorb it");
            return Ok(false);
        };

        let mut domains = snap.domains.clone();
        let small_rec = domains.remove(domain_id).expect("checked present above");

        let new_centroid = {
            let target_rec = domains.get(&target_id).expect("target looked up from this snapshot");
            weighted_merge_centroid(&target_rec.centroid, target_rec.size(), &small_rec.centroid, small_rec.size())
        };
        {
            let target_rec = domains.get_mut(&target_id).expect("target looked up from this snapshot");
            target_rec.members.extend(small_rec.members.iter().cloned());
            // The merged centroid is the size-weighted mean of the two old
            // centroids (spec §4.2.4 step 4), not a recomputation from raw
            // members, so the running sum is reseeded from it rather than
            // added to exactly — later admissions still fold in online.
            target_rec.centroid = new_centroid.clone();
            target_rec.centroid_sum = new_centroid;
            target_rec.neighbors.retain(|n| n != domain_id);
        }

        let affected: Vec<DomainId> = domains
            .iter()
            .filter(|(id, rec)| **id != target_id && rec.neighbors.contains(domain_id))
            .map(|(id, _)| id.clone())
            .collect();
        for rec in domains.values_mut() {
            rec.neighbors.retain(|n| n != domain_id);
        }

        let mut targets = vec![target_id.clone()];
        targets.extend(affected);
        self.recompute_neighbors_for(&targets, &mut domains);

        self.repo.delete_domain(domain_id).await?;
        for member in &small_rec.members {
            self.repo.set_membership(member, &target_id).await?;
        }
        for id in &targets {
            if let Some(rec) = domains.get(id) {
                self.repo.upsert_domain(&rec.domain_id, &rec.name, &rec.centroid, &rec.neighbors).await?;
            }
        }

        let mut guard = self.snapshot.write().await;
        *guard = Arc::new(guard.committed(domains));

        Ok(true)
    }

    /// Rebalance pass (spec §4.2.6): split every oversized domain in
    /// decreasing size order, then merge every domain left undersized in
    /// increasing size order. Each split/merge is its own commit; this is
    /// not atomic as a whole.
    pub async fn rebalance_now(&self) -> Result<RebalanceReport> {
        let snap = self.current().await;
        let domains_before = snap.domains.len();

        let mut oversized: Vec<(DomainId, usize)> = snap
            .domains
            .values()
            .filter(|d| d.size() > self.config.max_domain_size)
            .map(|d| (d.domain_id.clone(), d.size()))
            .collect();
        oversized.sort_by(|a, b| b.1.cmp(&a.1));

        let mut splits = 0usize;
        for (id, _) in &oversized {
            if self.split_domain(id).await? {
                splits += 1;
            }
        }

        let snap = self.current().await;
        let mut undersized: Vec<(DomainId, usize)> = snap
            .domains
            .values()
            .filter(|d| d.size() < self.config.min_domain_size)
            .map(|d| (d.domain_id.clone(), d.size()))
            .collect();
        undersized.sort_by(|a, b| a.1.cmp(&b.1));

        let mut merges = 0usize;
        for (id, _) in &undersized {
            if self.merge_domain(id).await? {
                merges += 1;
            }
        }

        let snap = self.current().await;
        let non_compliant = snap
            .domains
            .values()
            .filter(|d| d.size() < self.config.min_domain_size || d.size() > self.config.max_domain_size)
            .count();

        Ok(RebalanceReport {
            domains_before,
            domains_after: snap.domains.len(),
            splits,
            merges,
            non_compliant,
        })
    }

    pub async fn list_domains(&self) -> Vec<corpus_core::types::Domain> {
        self.current().await.list_domains()
    }

    /// Naming procedure (spec §4.2.5). Tolerates an unreachable LLM (falls
    /// back to `domain-<short-id>`), non-Korean output (accepted as-is),
    /// and an empty result (same fallback). Truncation to the character
    /// limit is the `LlmProvider`'s responsibility.
    async fn name_domain(&self, domain_id: &DomainId, paragraph_ids: &[ParagraphId]) -> String {
        let fallback = || format!("domain-{}", short_id(domain_id));

        let sample: Vec<ParagraphId> =
            paragraph_ids.iter().take(self.config.naming_sample_size).cloned().collect();
        if sample.is_empty() {
            return fallback();
        }

        let snippets = match self.repo.get_paragraphs(&sample).await {
            Ok(paragraphs) => paragraphs.into_iter().map(|p| p.content).collect::<Vec<_>>(),
            Err(e) => {
                warn!(domain_id = %domain_id, error = %e, "failed to load snippets for naming");
                return fallback();
            }
        };
        if snippets.is_empty() {
            return fallback();
        }

        match self.llm.name_cluster(&snippets, 15).await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => fallback(),
            Err(e) => {
                warn!(domain_id = %domain_id, error = %e, "llm naming failed, falling back to id-derived name");
                fallback()
            }
        }
    }

    /// Recompute the top-`neighbor_count` neighbor list (by centroid cosine
    /// similarity) for each domain in `targets`, against the full set of
    /// centroids currently in `domains`.
    fn recompute_neighbors_for(&self, targets: &[DomainId], domains: &mut HashMap<DomainId, DomainRecord>) {
        let centroids: Vec<(DomainId, Embedding)> =
            domains.values().map(|d| (d.domain_id.clone(), d.centroid.clone())).collect();
        let n = self.config.neighbor_count;

        for target in targets {
            let Some(centroid) = domains.get(target).map(|d| d.centroid.clone()) else {
                continue;
            };
            let mut scored: Vec<(DomainId, f32)> = centroids
                .iter()
                .filter(|(other, _)| other != target)
                .map(|(other, c)| (other.clone(), cosine_similarity(&centroid, c)))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(n);
            if let Some(rec) = domains.get_mut(target) {
                rec.neighbors = scored.into_iter().map(|(d, _)| d).collect();
            }
        }
    }
}
