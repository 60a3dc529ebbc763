//! Coordinator-level progress events (spec §4.4.3), streamed to an optional
//! caller-supplied sink exactly the way [`domain_agent::ProgressEvent`] is —
//! one pipeline, an optional progress channel, not a second code path.

use corpus_core::types::{DomainId, ParagraphRecord};

/// One event in the `query_streaming` sequence. `progress` is the fraction
/// named in spec §4.4.3 for that checkpoint.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { primary_domain_id: DomainId, primary_domain_name: String, primary_domain_size: usize },
    Stage { stage: &'static str, domain_id: DomainId, progress: f32 },
    Collaboration { progress: f32, consulted: Vec<DomainId> },
    Enrichment { progress: f32 },
    Complete { progress: f32, results: Vec<ParagraphRecord>, response_time_ms: u64, total_matched: usize },
    Error { message: String },
}

impl ProgressEvent {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Stage { .. } => "searching",
            Self::Collaboration { .. } => "searching",
            Self::Enrichment { .. } => "processing",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

/// Sink a [`crate::coordinator::Coordinator::query_streaming`] call reports
/// progress through. `None` (the plain `query` path) disables it entirely.
pub type ProgressSink = tokio::sync::mpsc::UnboundedSender<ProgressEvent>;

pub(crate) fn emit(sink: Option<&ProgressSink>, event: ProgressEvent) {
    if let Some(sink) = sink {
        let _ = sink.send(event);
    }
}
