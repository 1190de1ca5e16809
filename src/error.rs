//! Errors surfaced by the service layer.
//!
//! Retrieval failures keep their [`RagError`] class; generation gets its
//! own variant so callers can tell "no context" from "no answer".

use thiserror::Error;

use code_lens_core::error::RagError;

#[derive(Debug, Error)]
#[error("generation failed: {0}")]
pub struct GenerationError(String);

impl GenerationError {
    pub fn new(msg: impl std::fmt::Display) -> Self {
        Self(msg.to_string())
    }
}

#[derive(Debug, Error)]
pub enum LensError {
    #[error(transparent)]
    Rag(#[from] RagError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl LensError {
    /// Machine-readable error code, shared with the HTTP error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rag(e) => e.code(),
            Self::Generation(_) => "generation_error",
        }
    }
}
