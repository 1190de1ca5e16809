//! SQLite-backed [`VectorStore`] and [`CommitSource`].
//!
//! Records live in the tables created by [`crate::migrate`]. Nearest
//! neighbor queries load a collection's vectors and score them with
//! brute-force cosine similarity in Rust.
//!
//! sqlx errors become [`RagError::Store`] on writes and
//! [`RagError::Query`] on reads.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use code_lens_core::embedding::{blob_to_vec, vec_to_blob};
use code_lens_core::error::{RagError, Result};
use code_lens_core::models::{
    CodeChunk, Collection, CommitRecord, DocRecord, DocType, MatchPayload,
};
use code_lens_core::store::{
    rank_neighbors, score_against, sort_commits_newest_first, CommitSource, Neighbor,
    VectorStore,
};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of records stored in `collection`.
    pub async fn count(&self, collection: Collection) -> Result<i64> {
        let sql = match collection {
            Collection::Code => "SELECT COUNT(*) FROM code_chunks",
            Collection::Commits => "SELECT COUNT(*) FROM commits",
            Collection::Docs => "SELECT COUNT(*) FROM docs",
        };
        sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::query)
    }

    async fn files_for(&self, hashes: &[String]) -> Result<HashMap<String, BTreeSet<String>>> {
        let mut files: HashMap<String, BTreeSet<String>> = HashMap::new();
        for hash in hashes {
            let rows = sqlx::query("SELECT file_path FROM commit_files WHERE hash = ?")
                .bind(hash)
                .fetch_all(&self.pool)
                .await
                .map_err(RagError::query)?;
            let set = files.entry(hash.clone()).or_default();
            for row in rows {
                set.insert(row.get::<String, _>("file_path"));
            }
        }
        Ok(files)
    }

    async fn all_commit_files(&self) -> Result<HashMap<String, BTreeSet<String>>> {
        let rows = sqlx::query("SELECT hash, file_path FROM commit_files")
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::query)?;
        let mut files: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in rows {
            files
                .entry(row.get("hash"))
                .or_default()
                .insert(row.get("file_path"));
        }
        Ok(files)
    }
}

fn ts_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| RagError::query(format!("timestamp out of range: {}", millis)))
}

fn row_to_chunk(row: &SqliteRow) -> Result<CodeChunk> {
    let blob: Vec<u8> = row.get("embedding");
    Ok(CodeChunk {
        id: row.get("id"),
        file_path: row.get("file_path"),
        line_start: row.get::<i64, _>("line_start") as u32,
        line_end: row.get::<i64, _>("line_end") as u32,
        content: row.get("content"),
        embedding: blob_to_vec(&blob),
        created_at: ts_to_datetime(row.get("created_at"))?,
        last_modified: ts_to_datetime(row.get("last_modified"))?,
    })
}

fn row_to_commit(row: &SqliteRow, files_changed: BTreeSet<String>) -> Result<CommitRecord> {
    let blob: Vec<u8> = row.get("embedding");
    let refs_json: String = row.get("ticket_refs_json");
    let ticket_refs: BTreeSet<String> = serde_json::from_str(&refs_json)
        .map_err(|e| RagError::query(format!("malformed ticket_refs_json: {}", e)))?;
    Ok(CommitRecord {
        hash: row.get("hash"),
        author_name: row.get("author_name"),
        author_email: row.get("author_email"),
        date: ts_to_datetime(row.get("date"))?,
        message: row.get("message"),
        files_changed,
        ticket_refs,
        embedding: blob_to_vec(&blob),
    })
}

fn row_to_doc(row: &SqliteRow) -> Result<DocRecord> {
    let blob: Vec<u8> = row.get("embedding");
    let doc_type: String = row.get("doc_type");
    Ok(DocRecord {
        id: row.get("id"),
        doc_type: doc_type.parse::<DocType>()?,
        content: row.get("content"),
        file_path: row.get("file_path"),
        embedding: blob_to_vec(&blob),
        created_at: ts_to_datetime(row.get("created_at"))?,
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert_chunk(&self, chunk: &CodeChunk) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO code_chunks (id, file_path, line_start, line_end, content,
                                     embedding, created_at, last_modified)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                embedding = excluded.embedding,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.file_path)
        .bind(chunk.line_start as i64)
        .bind(chunk.line_end as i64)
        .bind(&chunk.content)
        .bind(vec_to_blob(&chunk.embedding))
        .bind(chunk.created_at.timestamp_millis())
        .bind(chunk.last_modified.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;
        Ok(())
    }

    async fn get_chunk(&self, id: &str) -> Result<Option<CodeChunk>> {
        let row = sqlx::query("SELECT * FROM code_chunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RagError::query)?;
        row.as_ref().map(row_to_chunk).transpose()
    }

    async fn append_doc(&self, doc: &DocRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO docs (id, doc_type, content, file_path, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(doc.doc_type.as_str())
        .bind(&doc.content)
        .bind(&doc.file_path)
        .bind(vec_to_blob(&doc.embedding))
        .bind(doc.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;
        Ok(result.rows_affected() == 1)
    }

    async fn nearest_neighbors(
        &self,
        collection: Collection,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        let mut neighbors = Vec::new();
        match collection {
            Collection::Code => {
                let rows = sqlx::query("SELECT * FROM code_chunks")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(RagError::query)?;
                for row in &rows {
                    let chunk = row_to_chunk(row)?;
                    neighbors.push(Neighbor {
                        score: score_against(vector, &chunk.embedding, &chunk.id)?,
                        payload: MatchPayload::Code((&chunk).into()),
                        id: chunk.id,
                    });
                }
            }
            Collection::Commits => {
                let rows = sqlx::query("SELECT * FROM commits")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(RagError::query)?;
                let mut files = self.all_commit_files().await?;
                for row in &rows {
                    let hash: String = row.get("hash");
                    let commit = row_to_commit(row, files.remove(&hash).unwrap_or_default())?;
                    neighbors.push(Neighbor {
                        score: score_against(vector, &commit.embedding, &commit.hash)?,
                        payload: MatchPayload::Commit((&commit).into()),
                        id: commit.hash,
                    });
                }
            }
            Collection::Docs => {
                let rows = sqlx::query("SELECT * FROM docs")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(RagError::query)?;
                for row in &rows {
                    let doc = row_to_doc(row)?;
                    neighbors.push(Neighbor {
                        score: score_against(vector, &doc.embedding, &doc.id)?,
                        payload: MatchPayload::Doc((&doc).into()),
                        id: doc.id,
                    });
                }
            }
        }
        rank_neighbors(&mut neighbors);
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

#[async_trait]
impl CommitSource for SqliteStore {
    async fn append_commit(&self, commit: &CommitRecord) -> Result<bool> {
        let refs_json = serde_json::to_string(&commit.ticket_refs).map_err(RagError::store)?;
        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO commits (hash, author_name, author_email, date, message,
                                           ticket_refs_json, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&commit.hash)
        .bind(&commit.author_name)
        .bind(&commit.author_email)
        .bind(commit.date.timestamp_millis())
        .bind(&commit.message)
        .bind(&refs_json)
        .bind(vec_to_blob(&commit.embedding))
        .execute(&mut *tx)
        .await
        .map_err(RagError::store)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(RagError::store)?;
            return Ok(false);
        }

        for file in &commit.files_changed {
            sqlx::query("INSERT OR IGNORE INTO commit_files (hash, file_path) VALUES (?, ?)")
                .bind(&commit.hash)
                .bind(file)
                .execute(&mut *tx)
                .await
                .map_err(RagError::store)?;
        }

        tx.commit().await.map_err(RagError::store)?;
        Ok(true)
    }

    async fn get_commit(&self, hash: &str) -> Result<Option<CommitRecord>> {
        let row = sqlx::query("SELECT * FROM commits WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(RagError::query)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut files = self.files_for(&[hash.to_string()]).await?;
        let commit = row_to_commit(&row, files.remove(hash).unwrap_or_default())?;
        Ok(Some(commit))
    }

    async fn commits_touching(&self, file_path: &str, limit: usize) -> Result<Vec<CommitRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT c.* FROM commits c
            JOIN commit_files f ON f.hash = c.hash
            WHERE f.file_path = ?
            ORDER BY c.date DESC, c.hash ASC
            LIMIT ?
            "#,
        )
        .bind(file_path)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::query)?;

        let hashes: Vec<String> = rows.iter().map(|r| r.get("hash")).collect();
        let mut files = self.files_for(&hashes).await?;

        let mut commits = Vec::with_capacity(rows.len());
        for row in &rows {
            let hash: String = row.get("hash");
            commits.push(row_to_commit(row, files.remove(&hash).unwrap_or_default())?);
        }
        sort_commits_newest_first(&mut commits);
        Ok(commits)
    }
}
