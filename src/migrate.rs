//! Idempotent schema setup.
//!
//! | Table | Holds |
//! |-------|-------|
//! | `code_chunks` | embedded line spans, keyed `file_path:start-end` |
//! | `commits` | append-only commit records with message embeddings |
//! | `commit_files` | `(hash, file_path)` pairs backing the history filter |
//! | `docs` | append-only documentation records |
//!
//! Vectors are little-endian `f32` BLOBs.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index on an open pool. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS code_chunks (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            line_start INTEGER NOT NULL,
            line_end INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            last_modified INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            hash TEXT PRIMARY KEY,
            author_name TEXT NOT NULL,
            author_email TEXT NOT NULL,
            date INTEGER NOT NULL,
            message TEXT NOT NULL,
            ticket_refs_json TEXT NOT NULL DEFAULT '[]',
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commit_files (
            hash TEXT NOT NULL,
            file_path TEXT NOT NULL,
            PRIMARY KEY (hash, file_path),
            FOREIGN KEY (hash) REFERENCES commits(hash)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS docs (
            id TEXT PRIMARY KEY,
            doc_type TEXT NOT NULL,
            content TEXT NOT NULL,
            file_path TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_code_chunks_file ON code_chunks(file_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_commit_files_path ON commit_files(file_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_commits_date ON commits(date DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
