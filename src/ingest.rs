//! Ingestion pipelines.
//!
//! | Pipeline | Source | Writes |
//! |----------|--------|--------|
//! | [`index_code`] | files matching `[indexing].include_globs` | code chunks (upsert) |
//! | [`index_docs`] | `[indexing].doc_globs` prose plus comments and docstrings in code files | docs (append-only) |
//! | [`import_commits`] | `git log` of a repository | commits (append-only) |
//!
//! Each pipeline stops at the first failed write and returns the error;
//! everything written before it stays written.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use code_lens_core::embedding::embed_checked;
use code_lens_core::models::{CommitRecord, DocRecord, DocType};

use crate::chunk::paragraph_chunks;
use crate::connector_fs::scan_files;
use crate::connector_git::read_git_log;
use crate::extract::{extract_code_docs, prose_doc_type};
use crate::service::Lens;

/// Maximum characters per README/text documentation record.
const DOC_MAX_CHARS: usize = 1500;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodeIndexStats {
    pub files: usize,
    pub chunks: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DocIndexStats {
    pub files: usize,
    pub added: usize,
    pub existing: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitImportStats {
    pub read: usize,
    pub added: usize,
    pub existing: usize,
}

/// Chunk and index every code file under the indexing root.
pub async fn index_code(lens: &Lens) -> Result<CodeIndexStats> {
    let indexing = &lens.config().indexing;
    let files = scan_files(&indexing.root, &indexing.include_globs, &indexing.exclude_globs)?;

    let mut stats = CodeIndexStats::default();
    for file in &files {
        let ids = lens
            .indexer()
            .index_file(
                &file.rel_path,
                &file.body,
                indexing.chunk_lines,
                indexing.chunk_overlap,
            )
            .await?;
        debug!(path = %file.rel_path, chunks = ids.len(), "indexed file");
        stats.files += 1;
        stats.chunks += ids.len();
    }

    info!(files = stats.files, chunks = stats.chunks, "code indexing complete");
    Ok(stats)
}

/// Index prose documentation and the comments/docstrings of code files.
pub async fn index_docs(lens: &Lens) -> Result<DocIndexStats> {
    let indexing = &lens.config().indexing;
    let mut stats = DocIndexStats::default();

    let prose = scan_files(&indexing.root, &indexing.doc_globs, &indexing.exclude_globs)?;
    for file in &prose {
        let doc_type = prose_doc_type(&file.rel_path);
        for piece in paragraph_chunks(&file.body, DOC_MAX_CHARS) {
            append_doc(lens, doc_type, &piece, &file.rel_path, &mut stats).await?;
        }
        stats.files += 1;
    }

    let code = scan_files(&indexing.root, &indexing.include_globs, &indexing.exclude_globs)?;
    for file in &code {
        let extracted = extract_code_docs(&file.rel_path, &file.body);
        if extracted.is_empty() {
            continue;
        }
        for doc in extracted {
            append_doc(lens, doc.doc_type, &doc.content, &file.rel_path, &mut stats).await?;
        }
        stats.files += 1;
    }

    info!(
        files = stats.files,
        added = stats.added,
        existing = stats.existing,
        "doc indexing complete"
    );
    Ok(stats)
}

async fn append_doc(
    lens: &Lens,
    doc_type: DocType,
    content: &str,
    file_path: &str,
    stats: &mut DocIndexStats,
) -> Result<()> {
    let embedding = embed_checked(lens.embedder(), content).await?;
    let doc = DocRecord::new(doc_type, content, file_path, embedding, Utc::now());
    if lens.vectors().append_doc(&doc).await? {
        stats.added += 1;
    } else {
        stats.existing += 1;
    }
    Ok(())
}

/// Read `git log` from `repo_dir`, embed each message, and append the
/// commits. Already-known hashes are left untouched.
pub async fn import_commits(
    lens: &Lens,
    repo_dir: &Path,
    max_count: Option<usize>,
) -> Result<CommitImportStats> {
    let log = read_git_log(repo_dir, max_count)?;
    let mut stats = CommitImportStats {
        read: log.len(),
        ..Default::default()
    };

    for commit in log {
        if lens.get_commit(&commit.hash).await?.is_some() {
            stats.existing += 1;
            continue;
        }
        let text = if commit.message.trim().is_empty() {
            commit.hash.as_str()
        } else {
            commit.message.as_str()
        };
        let embedding = embed_checked(lens.embedder(), text).await?;
        let record = CommitRecord {
            hash: commit.hash,
            author_name: commit.author_name,
            author_email: commit.author_email,
            date: commit.date,
            message: commit.message,
            files_changed: commit.files_changed,
            ticket_refs: commit.ticket_refs,
            embedding,
        };
        if lens.commits().append_commit(&record).await? {
            stats.added += 1;
        } else {
            stats.existing += 1;
        }
    }

    info!(
        read = stats.read,
        added = stats.added,
        existing = stats.existing,
        "commit import complete"
    );
    Ok(stats)
}
