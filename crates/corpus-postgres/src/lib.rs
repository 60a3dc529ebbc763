//! corpus-postgres — PostgreSQL + pgvector implementation of
//! `corpus_core::ports::GraphRepository`.

pub mod sqlx_types;
pub mod store;

pub use store::PgGraphRepository;
