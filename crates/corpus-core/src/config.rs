//! Central configuration (spec §6.4). Every tunable named in the spec lives
//! here, each with its documented default. No algorithm in this workspace
//! should hard-code one of these values inline.

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub min_domain_size: usize,
    pub max_domain_size: usize,
    pub k_min: usize,
    pub k_max: usize,
    pub domain_admit_threshold: f32,
    pub paragraph_sim_threshold: f32,
    pub paragraph_search_k_multiplier: usize,
    pub rne_radius: f32,
    pub rne_max_nodes: usize,
    pub rrf_k: f32,
    pub appendix_penalty: f32,
    pub collab_confidence_threshold: f32,
    pub coordinator_dispatch_n: usize,
    pub agent_deadline_ms: u64,
    pub coordinator_deadline_ms: u64,
    pub llm_retries: u32,
    pub naming_sample_size: usize,
    pub neighbor_count: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            min_domain_size: 50,
            max_domain_size: 500,
            k_min: 5,
            k_max: 15,
            domain_admit_threshold: 0.5,
            paragraph_sim_threshold: 0.5,
            paragraph_search_k_multiplier: 2,
            rne_radius: 0.25,
            rne_max_nodes: 20,
            rrf_k: 60.0,
            appendix_penalty: 0.5,
            collab_confidence_threshold: 0.6,
            coordinator_dispatch_n: 3,
            agent_deadline_ms: 10_000,
            coordinator_deadline_ms: 30_000,
            llm_retries: 3,
            naming_sample_size: 20,
            neighbor_count: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let c = CoreConfig::default();
        assert_eq!(c.min_domain_size, 50);
        assert_eq!(c.max_domain_size, 500);
        assert_eq!(c.k_min, 5);
        assert_eq!(c.k_max, 15);
        assert_eq!(c.paragraph_search_k_multiplier, 2);
        assert_eq!(c.rrf_k, 60.0);
        assert_eq!(c.coordinator_dispatch_n, 3);
        assert_eq!(c.agent_deadline_ms, 10_000);
        assert_eq!(c.coordinator_deadline_ms, 30_000);
    }
}
