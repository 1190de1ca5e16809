//! Writes embedded code chunks into the code collection.
//!
//! The embedding is computed and validated before anything touches the
//! store, and the store write itself is a single atomic upsert, so a
//! failed call never leaves a half-written chunk behind.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::chunk::chunk_lines;
use crate::embedding::{embed_checked, Embedder};
use crate::error::{RagError, Result};
use crate::models::CodeChunk;
use crate::store::VectorStore;

#[derive(Clone)]
pub struct ChunkIndexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl ChunkIndexer {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed and upsert one span. Returns the chunk id
    /// (`file_path:line_start-line_end`).
    ///
    /// Re-indexing an existing span replaces its content and embedding,
    /// bumps `last_modified`, and keeps `created_at`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for an empty path or content, or
    ///   `line_start > line_end`.
    /// - [`RagError::Embedding`] if the embedder fails or returns an
    ///   unusable vector.
    /// - [`RagError::Store`] if the upsert fails.
    pub async fn index_chunk(
        &self,
        content: &str,
        file_path: &str,
        line_start: u32,
        line_end: u32,
    ) -> Result<String> {
        if file_path.trim().is_empty() {
            return Err(RagError::invalid("file_path must not be empty"));
        }
        if content.trim().is_empty() {
            return Err(RagError::invalid("content must not be empty"));
        }
        if line_start > line_end {
            return Err(RagError::invalid(format!(
                "line_start ({}) must be <= line_end ({})",
                line_start, line_end
            )));
        }

        let embedding = embed_checked(self.embedder.as_ref(), content).await?;

        let now = Utc::now();
        let chunk = CodeChunk {
            id: CodeChunk::span_id(file_path, line_start, line_end),
            file_path: file_path.to_string(),
            line_start,
            line_end,
            content: content.to_string(),
            embedding,
            created_at: now,
            last_modified: now,
        };
        self.store.upsert_chunk(&chunk).await?;

        debug!(chunk_id = %chunk.id, "indexed chunk");
        Ok(chunk.id)
    }

    /// Split a whole file into line windows and index each one.
    ///
    /// Stops at the first failure; windows indexed before it stay indexed
    /// (each one is independently complete).
    pub async fn index_file(
        &self,
        file_path: &str,
        text: &str,
        max_lines: usize,
        overlap: usize,
    ) -> Result<Vec<String>> {
        let spans = chunk_lines(text, max_lines, overlap)?;
        let mut ids = Vec::with_capacity(spans.len());
        for span in spans {
            let id = self
                .index_chunk(&span.content, file_path, span.line_start, span.line_end)
                .await?;
            ids.push(id);
        }
        Ok(ids)
    }
}
