//! Error kinds for the statute retrieval core (spec §7).
//!
//! `CoreError` is a single flat enum — the stable identifiers from spec §7
//! are its variants, not internal exception names buried under layers of
//! wrapping. `kind()` exposes the stable identifier for callers who only
//! want to branch on it; `is_recoverable()` encodes the propagation policy
//! (errors that degrade quality recover locally, errors that prevent any
//! useful answer propagate).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("embedding_unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("repository_unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("rate_limited: {0}")]
    RateLimited(String),

    #[error("llm_unreachable: {0}")]
    LlmUnreachable(String),

    #[error("agent_deadline_exceeded: domain {domain_id} after {elapsed_ms}ms")]
    AgentDeadlineExceeded { domain_id: String, elapsed_ms: u64 },

    #[error("coordinator_deadline_exceeded: after {elapsed_ms}ms")]
    CoordinatorDeadlineExceeded { elapsed_ms: u64 },

    #[error("dimension_mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invariant_violation: {0}")]
    InvariantViolation(String),

    #[error("empty_corpus")]
    EmptyCorpus,

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

/// The stable identifier named in spec §7, independent of the `Display`
/// message — used for diagnostics and for tests asserting on error kind
/// rather than message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmbeddingUnavailable,
    RepositoryUnavailable,
    RateLimited,
    LlmUnreachable,
    AgentDeadlineExceeded,
    CoordinatorDeadlineExceeded,
    DimensionMismatch,
    InvariantViolation,
    EmptyCorpus,
    Internal,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmbeddingUnavailable(_) => ErrorKind::EmbeddingUnavailable,
            Self::RepositoryUnavailable(_) => ErrorKind::RepositoryUnavailable,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::LlmUnreachable(_) => ErrorKind::LlmUnreachable,
            Self::AgentDeadlineExceeded { .. } => ErrorKind::AgentDeadlineExceeded,
            Self::CoordinatorDeadlineExceeded { .. } => ErrorKind::CoordinatorDeadlineExceeded,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::EmptyCorpus => ErrorKind::EmptyCorpus,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for errors that degrade quality but permit a partial answer —
    /// the caller recovers locally and records the condition in
    /// `QueryOutcome::diagnostics` rather than aborting (spec §7
    /// propagation policy).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::LlmUnreachable
                | ErrorKind::AgentDeadlineExceeded
                | ErrorKind::RateLimited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds_are_not_recoverable() {
        assert!(!CoreError::EmbeddingUnavailable("x".into()).is_recoverable());
        assert!(!CoreError::RepositoryUnavailable("x".into()).is_recoverable());
        assert!(!CoreError::DimensionMismatch { expected: 384, actual: 768 }.is_recoverable());
        assert!(!CoreError::InvariantViolation("x".into()).is_recoverable());
    }

    #[test]
    fn degrading_kinds_are_recoverable() {
        assert!(CoreError::LlmUnreachable("x".into()).is_recoverable());
        assert!(CoreError::AgentDeadlineExceeded { domain_id: "d1".into(), elapsed_ms: 10_001 }
            .is_recoverable());
        assert!(CoreError::RateLimited("x".into()).is_recoverable());
    }
}
