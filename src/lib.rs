//! # code-lens
//!
//! Retrieval-augmented code explanation. Source code, git history, and
//! documentation are embedded into a local SQLite index; for a highlighted
//! snippet the pipeline gathers similar code, the commits that touched the
//! file, and related documentation, renders them into a prompt, and asks an
//! LLM to explain the code.
//!
//! The retrieval pipeline itself (indexer, retriever, context builder,
//! prompt formatter) lives in `code-lens-core`; this crate supplies the
//! storage, providers, ingestion, CLI, and HTTP server around it.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ fs / git log │──▶│ chunk+embed  │──▶│  SQLite  │
//! └──────────────┘   └──────────────┘   └────┬─────┘
//!                                            │ retrieve ×3
//!                                            ▼
//!                 ┌────────┐  prompt  ┌────────────┐
//!                 │ Gemini │◀─────────│ RagContext │
//!                 └────────┘          └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store and commit source |
//! | [`embedding`] | OpenAI / Ollama embedders |
//! | [`generate`] | Gemini generator |
//! | [`retry`] | HTTP retry with backoff |
//! | [`connector_fs`] | Filesystem walker |
//! | [`connector_git`] | `git log` reader |
//! | [`chunk`] | Paragraph chunking for prose |
//! | [`extract`] | Comment and docstring extraction |
//! | [`ingest`] | Indexing pipelines |
//! | [`service`] | Component wiring shared by CLI and server |
//! | [`server`] | HTTP API |
//! | [`stats`] | Index overview |

pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod connector_git;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod ingest;
pub mod migrate;
pub mod retry;
pub mod server;
pub mod service;
pub mod sqlite_store;
pub mod stats;
