//! Pure domain types, port traits, configuration and error kinds for the
//! self-organizing statute retrieval core. Zero I/O — every suspension
//! point (graph store, embedding model, LLM) is a trait in `ports`,
//! implemented by sibling crates.

pub mod config;
pub mod error;
pub mod ports;
pub mod reference;
pub mod retry;
pub mod types;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
