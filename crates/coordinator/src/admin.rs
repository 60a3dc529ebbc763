//! Admin operations (spec §6.3), exposed as thin wrappers over the Domain
//! Manager — grounded on `ob-semantic-matcher::matcher`'s practice of
//! giving every mutating operation its own narrow, documented async fn
//! rather than a single catch-all "admin" request type.

use corpus_core::ports::{EmbeddingProvider, GraphRepository, LlmProvider, Result};
use corpus_core::types::{DomainId, Embedding};
use domain_manager::RebalanceReport;

use crate::coordinator::Coordinator;

/// One entry of `list_domains()` (spec §6.3): `centroid_summary` is the
/// centroid's leading components, enough to eyeball a domain's semantic
/// direction without shipping the full embedding over an admin listing.
#[derive(Debug, Clone)]
pub struct DomainSummary {
    pub id: DomainId,
    pub name: String,
    pub size: usize,
    pub centroid_summary: Embedding,
}

const CENTROID_SUMMARY_LEN: usize = 8;

impl<R, E, L> Coordinator<R, E, L>
where
    R: GraphRepository,
    E: EmbeddingProvider,
    L: LlmProvider,
{
    /// `rebalance_now()` (spec §6.3): split every oversized domain, merge
    /// every undersized one, serializable with respect to itself (the
    /// manager's own lock makes this true without any extra coordination
    /// here).
    pub async fn rebalance_now(&self) -> Result<RebalanceReport> {
        self.manager.rebalance_now().await
    }

    /// `initialize_partition()` (spec §6.3): same report shape as
    /// `rebalance_now`, a no-op once at least one domain already exists.
    pub async fn initialize_partition(&self) -> Result<RebalanceReport> {
        self.manager.initialize_partition().await
    }

    /// `list_domains()` (spec §6.3).
    pub async fn list_domains(&self) -> Vec<DomainSummary> {
        self.manager
            .list_domains()
            .await
            .into_iter()
            .map(|d| DomainSummary {
                id: d.domain_id,
                name: d.name,
                size: d.size,
                centroid_summary: d.centroid.into_iter().take(CENTROID_SUMMARY_LEN).collect(),
            })
            .collect()
    }
}
