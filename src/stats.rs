//! Index overview for `lens stats`.
//!
//! Counts what each collection holds so a user can confirm that indexing
//! and commit import actually wrote something before asking for an
//! explanation.

use anyhow::Result;
use chrono::{DateTime, Utc};

use code_lens_core::models::Collection;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub code_chunks: i64,
    pub code_files: i64,
    pub commits: i64,
    pub newest_commit: Option<DateTime<Utc>>,
    pub docs: i64,
}

/// Gather counts from an open store.
pub async fn collect(store: &SqliteStore) -> Result<IndexStats> {
    let code_files: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT file_path) FROM code_chunks")
        .fetch_one(store.pool())
        .await?;
    let newest: Option<i64> = sqlx::query_scalar("SELECT MAX(date) FROM commits")
        .fetch_one(store.pool())
        .await?;
    let newest_commit = newest.and_then(DateTime::<Utc>::from_timestamp_millis);

    Ok(IndexStats {
        code_chunks: store.count(Collection::Code).await?,
        code_files,
        commits: store.count(Collection::Commits).await?,
        newest_commit,
        docs: store.count(Collection::Docs).await?,
    })
}

/// Open the configured database, creating the schema if `lens init` has
/// not run yet, so a fresh index reports zeros.
pub async fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    Ok(SqliteStore::new(pool))
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let stats = collect(&store).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("code-lens index");
    println!("===============");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!(
        "  Code:        {} chunks in {} files",
        stats.code_chunks, stats.code_files
    );
    println!(
        "  Commits:     {}{}",
        stats.commits,
        stats
            .newest_commit
            .map(|d| format!(" (newest {})", d.format("%Y-%m-%d")))
            .unwrap_or_default()
    );
    println!("  Docs:        {}", stats.docs);
    println!();

    store.pool().close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
