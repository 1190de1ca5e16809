//! Error taxonomy for the retrieval pipeline.
//!
//! Every fallible core operation returns [`RagError`]. The variants map
//! one-to-one onto the failure classes a caller has to react to
//! differently: the embedding service, a read against a store, a write
//! against a store, and caller mistakes.

use thiserror::Error;

/// Errors surfaced by the indexer, retriever, and context builder.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding service was unavailable or returned malformed output.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A vector or structured store was unreachable or returned a malformed response.
    #[error("query failed: {0}")]
    Query(String),

    /// A write or upsert could not complete.
    #[error("store write failed: {0}")]
    Store(String),

    /// The caller supplied arguments that violate an operation's constraints.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RagError {
    pub fn embedding(msg: impl std::fmt::Display) -> Self {
        Self::Embedding(msg.to_string())
    }

    pub fn query(msg: impl std::fmt::Display) -> Self {
        Self::Query(msg.to_string())
    }

    pub fn store(msg: impl std::fmt::Display) -> Self {
        Self::Store(msg.to_string())
    }

    pub fn invalid(msg: impl std::fmt::Display) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Machine-readable error code, used by the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Embedding(_) => "embedding_error",
            Self::Query(_) => "query_error",
            Self::Store(_) => "store_error",
            Self::InvalidInput(_) => "bad_request",
        }
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
