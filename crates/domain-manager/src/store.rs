//! Versioned, immutable partition snapshot (spec §5 "treating the
//! partition as a versioned snapshot"). A commit produces a brand new
//! `PartitionSnapshot`; nothing in an existing snapshot is ever mutated in
//! place, so a reference held by an in-flight search stays internally
//! consistent no matter what the `DomainManager` does afterwards.

use std::collections::{HashMap, HashSet};

use corpus_core::types::{normalize, Domain, DomainId, Embedding, ParagraphId};

/// One domain's mutable state within a snapshot. `centroid_sum` is the
/// running sum of each member's *normalized* embedding — summing
/// normalized vectors rather than averaging lets admission update the
/// centroid online (spec §4.2.2 "incremental mean") while still satisfying
/// invariant 2 exactly, since `normalize(sum) == normalize(mean)`.
#[derive(Debug, Clone)]
pub struct DomainRecord {
    pub domain_id: DomainId,
    pub name: String,
    pub centroid: Embedding,
    pub centroid_sum: Embedding,
    pub members: HashSet<ParagraphId>,
    pub neighbors: Vec<DomainId>,
}

impl DomainRecord {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn to_domain(&self) -> Domain {
        Domain {
            domain_id: self.domain_id.clone(),
            name: self.name.clone(),
            centroid: self.centroid.clone(),
            size: self.size(),
            neighbors: self.neighbors.clone(),
        }
    }

    /// Fold a newly-admitted member's embedding into the running sum and
    /// refresh the cached centroid.
    pub fn admit(&mut self, paragraph_id: ParagraphId, embedding: &Embedding) {
        let normalized = normalize(embedding.clone());
        for (i, x) in normalized.iter().enumerate() {
            self.centroid_sum[i] += x;
        }
        self.members.insert(paragraph_id);
        self.centroid = normalize(self.centroid_sum.clone());
    }
}

/// Sum of each vector's normalized form — NOT divided by count, since
/// `normalize` is scale-invariant and downstream consumers only ever read
/// `normalize(centroid_sum)`.
pub fn centroid_sum_of(vectors: &[Embedding]) -> Embedding {
    assert!(!vectors.is_empty(), "centroid_sum_of requires at least one vector");
    let dim = vectors[0].len();
    let mut acc = vec![0.0f32; dim];
    for v in vectors {
        let n = normalize(v.clone());
        for (i, x) in n.iter().enumerate() {
            acc[i] += x;
        }
    }
    acc
}

#[derive(Debug, Clone, Default)]
pub struct PartitionSnapshot {
    pub version: u64,
    pub domains: HashMap<DomainId, DomainRecord>,
}

impl PartitionSnapshot {
    pub fn empty() -> Self {
        Self { version: 0, domains: HashMap::new() }
    }

    pub fn domain(&self, id: &DomainId) -> Option<&DomainRecord> {
        self.domains.get(id)
    }

    pub fn list_domains(&self) -> Vec<Domain> {
        let mut out: Vec<Domain> = self.domains.values().map(DomainRecord::to_domain).collect();
        out.sort_by(|a, b| a.domain_id.0.cmp(&b.domain_id.0));
        out
    }

    pub fn owner_of(&self, paragraph_id: &ParagraphId) -> Option<&DomainId> {
        self.domains
            .values()
            .find(|d| d.members.contains(paragraph_id))
            .map(|d| &d.domain_id)
    }

    /// Produce the next version with `domains` replacing the current map
    /// wholesale. Callers build the replacement map from a clone of the
    /// current one plus their edits, never mutating `self`.
    pub fn committed(&self, domains: HashMap<DomainId, DomainRecord>) -> Self {
        Self { version: self.version + 1, domains }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_core::types::normalize;

    fn record(id: &str, members: &[&str]) -> DomainRecord {
        let centroid = normalize(vec![1.0, 0.0]);
        DomainRecord {
            domain_id: DomainId(id.to_string()),
            name: format!("domain-{id}"),
            centroid: centroid.clone(),
            centroid_sum: centroid,
            members: members.iter().map(|m| ParagraphId(m.to_string())).collect(),
            neighbors: vec![],
        }
    }

    #[test]
    fn admit_updates_centroid_and_membership_incrementally() {
        let mut rec = record("d1", &["p1"]);
        rec.admit(ParagraphId("p2".into()), &vec![0.0, 1.0]);
        assert_eq!(rec.size(), 2);
        assert!(rec.members.contains(&ParagraphId("p2".into())));
        let expected = normalize(centroid_sum_of(&[vec![1.0, 0.0], vec![0.0, 1.0]]));
        for (a, b) in rec.centroid.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn committed_snapshot_has_incremented_version_and_old_untouched() {
        let snap = PartitionSnapshot::empty();
        let mut domains = HashMap::new();
        domains.insert(DomainId("d1".into()), record("d1", &["p1"]));
        let next = snap.committed(domains);
        assert_eq!(snap.version, 0);
        assert_eq!(next.version, 1);
        assert!(snap.domains.is_empty());
        assert_eq!(next.domains.len(), 1);
    }

    #[test]
    fn owner_of_finds_containing_domain() {
        let mut domains = HashMap::new();
        domains.insert(DomainId("d1".into()), record("d1", &["p1", "p2"]));
        let snap = PartitionSnapshot { version: 1, domains };
        assert_eq!(snap.owner_of(&ParagraphId("p2".into())), Some(&DomainId("d1".into())));
        assert_eq!(snap.owner_of(&ParagraphId("p9".into())), None);
    }
}
