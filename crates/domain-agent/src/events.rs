//! Progress events emitted at the stage boundaries named by spec §4.3.2.
//! The core defines the event names and payloads; the transport (SSE,
//! WebSocket, ...) is external (spec §1, §6).

use corpus_core::types::{DomainId, ParagraphRecord};

/// One of the six stage checkpoints `search` reports on (spec §4.3.2). The
/// Coordinator proxies a subset of these with its own progress fractions
/// (spec §4.4.3); within a single domain agent call they carry no fraction
/// of their own, only the stage name and a running candidate count.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    ExactMatch { domain_id: DomainId, matched: usize },
    ParagraphVector { domain_id: DomainId, matched: usize },
    RelationshipVector { domain_id: DomainId, matched: usize },
    Expansion { domain_id: DomainId, admitted: usize },
    Collaboration { domain_id: DomainId, consulted: Vec<DomainId> },
    Complete { domain_id: DomainId, results: Vec<ParagraphRecord> },
}

impl ProgressEvent {
    pub fn stage_name(&self) -> &'static str {
        match self {
            Self::ExactMatch { .. } => "exact_match",
            Self::ParagraphVector { .. } => "paragraph_vector",
            Self::RelationshipVector { .. } => "relationship_vector",
            Self::Expansion { .. } => "expansion",
            Self::Collaboration { .. } => "collaboration",
            Self::Complete { .. } => "complete",
        }
    }
}

/// Sink a [`search`](crate::search::search) call reports progress through.
/// `None` disables reporting entirely — callers that only want the final
/// records (the synchronous `query` path, spec §6.2) pass `None`.
pub type ProgressSink = tokio::sync::mpsc::UnboundedSender<ProgressEvent>;

pub(crate) fn emit(sink: Option<&ProgressSink>, event: ProgressEvent) {
    if let Some(sink) = sink {
        // A dropped receiver just means nobody is listening to progress on
        // this call; the search itself must not fail because of it.
        let _ = sink.send(event);
    }
}
