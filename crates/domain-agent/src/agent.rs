//! Per-domain immutable search-time state (spec §9 design note: "a value
//! object (the domain's state snapshot) plus a pure function `search(state,
//! query, limit) -> records)`. There is no per-domain subclassing — every
//! domain shares the same [`crate::search::search`] logic over a different
//! `DomainAgentState`.

use corpus_core::types::{DomainId, Embedding};
use domain_manager::PartitionSnapshot;

/// One domain's state as seen by a single `search` call. Constructed fresh
/// from whatever `PartitionSnapshot` the caller (typically the Coordinator)
/// is holding, so a search never observes a torn partition mid-rebalance
/// (spec §5).
#[derive(Debug, Clone)]
pub struct DomainAgentState {
    pub domain_id: DomainId,
    pub name: String,
    pub centroid: Embedding,
    /// Up to `neighbor_count` domains ranked by centroid similarity, used
    /// for A2A consultation when this domain's confidence is low (spec
    /// §4.3.1 step 11).
    pub neighbors: Vec<DomainId>,
}

impl DomainAgentState {
    pub fn new(domain_id: DomainId, name: String, centroid: Embedding, neighbors: Vec<DomainId>) -> Self {
        Self { domain_id, name, centroid, neighbors }
    }

    /// Build a domain's search-time state from a versioned partition
    /// snapshot (spec §5). `None` if `domain_id` is not (or no longer) part
    /// of this snapshot — callers should treat this as "nothing to search",
    /// not an error, since a domain can vanish between snapshot and lookup
    /// only if it was merged away, in which case the query belongs to its
    /// successor instead.
    pub fn from_snapshot(snapshot: &PartitionSnapshot, domain_id: &DomainId) -> Option<Self> {
        let record = snapshot.domain(domain_id)?;
        Some(Self::new(
            record.domain_id.clone(),
            record.name.clone(),
            record.centroid.clone(),
            record.neighbors.clone(),
        ))
    }
}
