//! Domain Agent (spec §4.3): one instance per domain, holding a reference to
//! its domain id, the Graph Repository, the Embedding Provider, and the
//! domain's current neighbor list. [`search::search`] is the pipeline;
//! [`agent::DomainAgentState`] is the immutable value it runs over.

pub mod agent;
pub mod events;
pub mod expansion;
pub mod fusion;
pub mod search;

pub use agent::DomainAgentState;
pub use events::{ProgressEvent, ProgressSink};
pub use search::{search, SearchDeps, SearchOutcome};
