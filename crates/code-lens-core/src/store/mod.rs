//! Storage abstraction for Code Lens.
//!
//! Two traits split the external store along the lines of how it is
//! queried:
//!
//! - [`VectorStore`] holds the three embedded collections and answers
//!   nearest-neighbor queries by cosine similarity.
//! - [`CommitSource`] ingests commit records append-only and answers the
//!   structured "which commits touched this file" query.
//!
//! A backend usually implements both over the same storage (see
//! [`memory::InMemoryStore`] and the SQLite store in the app crate).
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{CodeChunk, Collection, CommitRecord, DocRecord, MatchPayload};

/// A candidate returned by a nearest-neighbor query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Stored id of the record.
    pub id: String,
    /// Cosine similarity between the query vector and the record's vector.
    pub score: f32,
    pub payload: MatchPayload,
}

/// Embedded collections with cosine nearest-neighbor search.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_chunk`](VectorStore::upsert_chunk) | Insert or replace a code chunk |
/// | [`get_chunk`](VectorStore::get_chunk) | Fetch a code chunk by id |
/// | [`append_doc`](VectorStore::append_doc) | Insert a documentation record if new |
/// | [`nearest_neighbors`](VectorStore::nearest_neighbors) | Cosine search in one collection |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a chunk, or replace the content, embedding and
    /// `last_modified` of the chunk with the same id. An existing
    /// chunk's `created_at` is kept. The write is atomic.
    async fn upsert_chunk(&self, chunk: &CodeChunk) -> Result<()>;

    async fn get_chunk(&self, id: &str) -> Result<Option<CodeChunk>>;

    /// Insert a documentation record. Returns `false` when a record with
    /// the same id already exists (nothing is written).
    async fn append_doc(&self, doc: &DocRecord) -> Result<bool>;

    /// Return up to `k` records of `collection`, ranked by
    /// [`rank_neighbors`].
    async fn nearest_neighbors(
        &self,
        collection: Collection,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>>;
}

/// Append-only commit history.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Insert a commit. Returns `false` when the hash is already known
    /// (the stored record is left untouched).
    async fn append_commit(&self, commit: &CommitRecord) -> Result<bool>;

    async fn get_commit(&self, hash: &str) -> Result<Option<CommitRecord>>;

    /// Commits whose `files_changed` contains `file_path`, newest first,
    /// at most `limit` of them.
    async fn commits_touching(&self, file_path: &str, limit: usize) -> Result<Vec<CommitRecord>>;
}

/// Cosine similarity of a stored vector against the query vector.
///
/// A stored vector of another length was written by a different
/// embedding model and cannot be compared; that is a query error.
pub fn score_against(query: &[f32], stored: &[f32], id: &str) -> Result<f32> {
    if query.len() != stored.len() {
        return Err(RagError::query(format!(
            "stored vector for {} has {} dimensions, query has {}; re-index after changing the embedding model",
            id,
            stored.len(),
            query.len()
        )));
    }
    Ok(cosine_similarity(query, stored))
}

/// Order neighbors by descending score, ties by ascending id.
pub fn rank_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Order commits by descending date, ties by ascending hash.
pub fn sort_commits_newest_first(commits: &mut [CommitRecord]) {
    commits.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.hash.cmp(&b.hash)));
}
