//! Core data models for the retrieval pipeline.
//!
//! Stored records ([`CodeChunk`], [`CommitRecord`], [`DocRecord`]) carry
//! their embedding vectors. The transient types produced per query
//! ([`RetrievalMatch`], [`RagContext`]) only carry projections of those
//! records, never the vectors.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RagError;

/// Similarity threshold below which documentation matches are treated as noise.
pub const DOCS_MIN_SCORE: f32 = 0.7;

/// A logically distinct set of records with its own similarity index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Code,
    Commits,
    Docs,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Code, Collection::Commits, Collection::Docs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Code => "code",
            Collection::Commits => "commits",
            Collection::Docs => "docs",
        }
    }

    /// Lower similarity bound applied when the caller does not pick one.
    pub fn default_min_score(&self) -> Option<f32> {
        match self {
            Collection::Docs => Some(DOCS_MIN_SCORE),
            Collection::Code | Collection::Commits => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" => Ok(Collection::Code),
            "commits" | "commit" => Ok(Collection::Commits),
            "docs" | "doc" | "documentation" => Ok(Collection::Docs),
            other => Err(RagError::invalid(format!(
                "unknown collection '{}'; use code, commits, or docs",
                other
            ))),
        }
    }
}

/// An embedded span of source code.
///
/// Identity is `(file_path, line_start, line_end)`; [`CodeChunk::span_id`]
/// derives the stored id from those three fields so re-indexing the same
/// span overwrites the previous record.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeChunk {
    pub id: String,
    pub file_path: String,
    /// First line of the span (1-based, inclusive).
    pub line_start: u32,
    /// Last line of the span (1-based, inclusive).
    pub line_end: u32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl CodeChunk {
    /// `file_path:line_start-line_end`
    pub fn span_id(file_path: &str, line_start: u32, line_end: u32) -> String {
        format!("{}:{}-{}", file_path, line_start, line_end)
    }
}

/// A commit imported from version-control history. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    /// Full commit hash; the canonical key everywhere except display.
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub files_changed: BTreeSet<String>,
    pub ticket_refs: BTreeSet<String>,
    /// Embedding of the commit message.
    pub embedding: Vec<f32>,
}

impl CommitRecord {
    pub fn touches(&self, file_path: &str) -> bool {
        self.files_changed.contains(file_path)
    }
}

/// Kind of documentation a [`DocRecord`] was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Comment,
    Docstring,
    Readme,
    Other,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Comment => "comment",
            DocType::Docstring => "docstring",
            DocType::Readme => "readme",
            DocType::Other => "other",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comment" => Ok(DocType::Comment),
            "docstring" => Ok(DocType::Docstring),
            "readme" => Ok(DocType::Readme),
            "other" => Ok(DocType::Other),
            other => Err(RagError::invalid(format!("unknown doc type '{}'", other))),
        }
    }
}

/// An embedded piece of documentation. Append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct DocRecord {
    pub id: String,
    pub doc_type: DocType,
    pub content: String,
    pub file_path: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl DocRecord {
    /// Build a record whose id is derived from its path, type, and content.
    pub fn new(
        doc_type: DocType,
        content: impl Into<String>,
        file_path: impl Into<String>,
        embedding: Vec<f32>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        let file_path = file_path.into();
        Self {
            id: doc_id(&file_path, doc_type, &content),
            doc_type,
            content,
            file_path,
            embedding,
            created_at,
        }
    }
}

/// Content digest used as a documentation record id.
///
/// The same text extracted from the same file yields the same id, so a
/// repeated sync appends nothing new.
pub fn doc_id(file_path: &str, doc_type: DocType, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(doc_type.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("doc-{}", &digest[..32])
}

/// Projection of a [`CodeChunk`] without its vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeChunkView {
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub content: String,
}

impl From<&CodeChunk> for CodeChunkView {
    fn from(c: &CodeChunk) -> Self {
        Self {
            file_path: c.file_path.clone(),
            line_start: c.line_start,
            line_end: c.line_end,
            content: c.content.clone(),
        }
    }
}

/// Projection of a [`CommitRecord`] without its vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitView {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub files_changed: Vec<String>,
    pub ticket_refs: Vec<String>,
}

impl From<&CommitRecord> for CommitView {
    fn from(c: &CommitRecord) -> Self {
        Self {
            hash: c.hash.clone(),
            author_name: c.author_name.clone(),
            author_email: c.author_email.clone(),
            date: c.date,
            message: c.message.clone(),
            files_changed: c.files_changed.iter().cloned().collect(),
            ticket_refs: c.ticket_refs.iter().cloned().collect(),
        }
    }
}

/// Projection of a [`DocRecord`] without its vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocView {
    pub doc_type: DocType,
    pub content: String,
    pub file_path: String,
}

impl From<&DocRecord> for DocView {
    fn from(d: &DocRecord) -> Self {
        Self {
            doc_type: d.doc_type,
            content: d.content.clone(),
            file_path: d.file_path.clone(),
        }
    }
}

/// The record a match points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchPayload {
    Code(CodeChunkView),
    Commit(CommitView),
    Doc(DocView),
}

/// One ranked hit, produced per query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalMatch {
    /// Stored id of the matched record (chunk id, full commit hash, or doc id).
    pub source_id: String,
    /// Cosine similarity in `[-1.0, 1.0]`. Commit-history entries, which
    /// come from a structured filter rather than a similarity search,
    /// carry `1.0`.
    pub score: f32,
    pub payload: MatchPayload,
}

/// Everything gathered for one explanation request.
#[derive(Debug, Clone, Serialize)]
pub struct RagContext {
    pub target_code: String,
    pub file_path: String,
    /// Descending by score.
    pub similar_code: Vec<RetrievalMatch>,
    /// Descending by commit date.
    pub commit_history: Vec<RetrievalMatch>,
    /// Descending by score.
    pub documentation: Vec<RetrievalMatch>,
    /// Signals that failed and were replaced by an empty list.
    pub degraded: Vec<Collection>,
    pub timestamp: DateTime<Utc>,
}
