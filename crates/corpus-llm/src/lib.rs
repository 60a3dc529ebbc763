//! `LlmProvider` implementation: HTTP chat-completion client used for
//! domain naming and self-assessment.

pub mod http;

pub use http::{HttpLlmConfig, HttpLlmProvider};
