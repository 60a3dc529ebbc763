//! Coordinator (spec §4.4): query routing, parallel domain dispatch,
//! cross-domain RRF-weighted fusion, streaming progress events, and the
//! admin surface over the Domain Manager.

pub mod admin;
pub mod coordinator;
pub mod events;

pub use admin::DomainSummary;
pub use coordinator::{Coordinator, Diagnostic, PrimaryDomain, QueryOutcome};
pub use events::{ProgressEvent, ProgressSink};
