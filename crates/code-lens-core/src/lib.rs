//! # Code Lens Core
//!
//! Retrieval pipeline for explaining code: data models, the store
//! abstraction, chunk indexing, similarity retrieval, context assembly,
//! and prompt formatting.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Embedding services and stores are reached through the
//! [`embedding::Embedder`], [`store::VectorStore`] and
//! [`store::CommitSource`] traits; the `code-lens` crate supplies the
//! native implementations.
//!
//! A typical request flows through:
//!
//! 1. [`indexer::ChunkIndexer`] to embed and upsert source spans,
//! 2. [`context::RagContextBuilder`] to gather similar code, commit
//!    history, and documentation concurrently,
//! 3. [`prompt::PromptFormatter`] to render the result.

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod store;

pub use error::{RagError, Result};
