//! In-memory [`VectorStore`] and [`CommitSource`] for tests and WASM targets.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`. Nearest-neighbor search is
//! brute-force cosine similarity over every record in the collection.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{CodeChunk, Collection, CommitRecord, DocRecord, MatchPayload};

use super::{
    rank_neighbors, score_against, sort_commits_newest_first, CommitSource, Neighbor, VectorStore,
};

/// In-memory store for testing and WASM environments.
pub struct InMemoryStore {
    chunks: RwLock<HashMap<String, CodeChunk>>,
    commits: RwLock<HashMap<String, CommitRecord>>,
    docs: RwLock<HashMap<String, DocRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            commits: RwLock::new(HashMap::new()),
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn doc_count(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> String {
    "in-memory store lock poisoned".to_string()
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert_chunk(&self, chunk: &CodeChunk) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(|_| RagError::Store(poisoned()))?;
        let mut stored = chunk.clone();
        if let Some(existing) = chunks.get(&chunk.id) {
            stored.created_at = existing.created_at;
        }
        chunks.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn get_chunk(&self, id: &str) -> Result<Option<CodeChunk>> {
        let chunks = self.chunks.read().map_err(|_| RagError::Query(poisoned()))?;
        Ok(chunks.get(id).cloned())
    }

    async fn append_doc(&self, doc: &DocRecord) -> Result<bool> {
        let mut docs = self.docs.write().map_err(|_| RagError::Store(poisoned()))?;
        if docs.contains_key(&doc.id) {
            return Ok(false);
        }
        docs.insert(doc.id.clone(), doc.clone());
        Ok(true)
    }

    async fn nearest_neighbors(
        &self,
        collection: Collection,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        let mut neighbors: Vec<Neighbor> = match collection {
            Collection::Code => {
                let chunks = self.chunks.read().map_err(|_| RagError::Query(poisoned()))?;
                chunks
                    .values()
                    .map(|c| {
                        Ok(Neighbor {
                            id: c.id.clone(),
                            score: score_against(vector, &c.embedding, &c.id)?,
                            payload: MatchPayload::Code(c.into()),
                        })
                    })
                    .collect::<Result<_>>()?
            }
            Collection::Commits => {
                let commits = self.commits.read().map_err(|_| RagError::Query(poisoned()))?;
                commits
                    .values()
                    .map(|c| {
                        Ok(Neighbor {
                            id: c.hash.clone(),
                            score: score_against(vector, &c.embedding, &c.hash)?,
                            payload: MatchPayload::Commit(c.into()),
                        })
                    })
                    .collect::<Result<_>>()?
            }
            Collection::Docs => {
                let docs = self.docs.read().map_err(|_| RagError::Query(poisoned()))?;
                docs.values()
                    .map(|d| {
                        Ok(Neighbor {
                            id: d.id.clone(),
                            score: score_against(vector, &d.embedding, &d.id)?,
                            payload: MatchPayload::Doc(d.into()),
                        })
                    })
                    .collect::<Result<_>>()?
            }
        };
        rank_neighbors(&mut neighbors);
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

#[async_trait]
impl CommitSource for InMemoryStore {
    async fn append_commit(&self, commit: &CommitRecord) -> Result<bool> {
        let mut commits = self.commits.write().map_err(|_| RagError::Store(poisoned()))?;
        if commits.contains_key(&commit.hash) {
            return Ok(false);
        }
        commits.insert(commit.hash.clone(), commit.clone());
        Ok(true)
    }

    async fn get_commit(&self, hash: &str) -> Result<Option<CommitRecord>> {
        let commits = self.commits.read().map_err(|_| RagError::Query(poisoned()))?;
        Ok(commits.get(hash).cloned())
    }

    async fn commits_touching(&self, file_path: &str, limit: usize) -> Result<Vec<CommitRecord>> {
        let commits = self.commits.read().map_err(|_| RagError::Query(poisoned()))?;
        let mut matching: Vec<CommitRecord> = commits
            .values()
            .filter(|c| c.touches(file_path))
            .cloned()
            .collect();
        sort_commits_newest_first(&mut matching);
        matching.truncate(limit);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocType;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeSet;

    fn chunk(id_path: &str, content: &str, embedding: Vec<f32>) -> CodeChunk {
        let now = Utc::now();
        CodeChunk {
            id: CodeChunk::span_id(id_path, 1, 5),
            file_path: id_path.to_string(),
            line_start: 1,
            line_end: 5,
            content: content.to_string(),
            embedding,
            created_at: now,
            last_modified: now,
        }
    }

    fn commit(hash: &str, files: &[&str], month: u32) -> CommitRecord {
        CommitRecord {
            hash: hash.to_string(),
            author_name: "Dana".into(),
            author_email: "dana@example.com".into(),
            date: Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap(),
            message: format!("commit {}", hash),
            files_changed: files.iter().map(|f| f.to_string()).collect(),
            ticket_refs: BTreeSet::new(),
            embedding: vec![0.0, 1.0],
        }
    }

    #[tokio::test]
    async fn test_upsert_preserves_created_at() {
        let store = InMemoryStore::new();
        let mut first = chunk("a.rs", "fn a() {}", vec![1.0, 0.0]);
        first.created_at = Utc::now() - Duration::days(3);
        store.upsert_chunk(&first).await.unwrap();

        let second = chunk("a.rs", "fn a() { 1 }", vec![0.0, 1.0]);
        store.upsert_chunk(&second).await.unwrap();

        let stored = store.get_chunk(&first.id).await.unwrap().unwrap();
        assert_eq!(store.chunk_count(), 1);
        assert_eq!(stored.content, "fn a() { 1 }");
        assert_eq!(stored.created_at, first.created_at);
        assert_eq!(stored.last_modified, second.last_modified);
    }

    #[tokio::test]
    async fn test_nearest_neighbors_ranked_and_truncated() {
        let store = InMemoryStore::new();
        store.upsert_chunk(&chunk("a.rs", "a", vec![1.0, 0.0])).await.unwrap();
        store.upsert_chunk(&chunk("b.rs", "b", vec![0.6, 0.8])).await.unwrap();
        store.upsert_chunk(&chunk("c.rs", "c", vec![0.0, 1.0])).await.unwrap();

        let hits = store
            .nearest_neighbors(Collection::Code, &[1.0, 0.0], 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a.rs:1-5");
        assert_eq!(hits[1].id, "b.rs:1-5");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_nearest_neighbors_rejects_mismatched_dimensions() {
        let store = InMemoryStore::new();
        store
            .upsert_chunk(&chunk("a.py", "a", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let err = store
            .nearest_neighbors(Collection::Code, &[1.0, 0.0], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Query(_)));
        assert!(err.to_string().contains("a.py:1-5"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = InMemoryStore::new();
        store.upsert_chunk(&chunk("a.rs", "a", vec![1.0, 0.0])).await.unwrap();
        let doc = DocRecord::new(DocType::Readme, "About", "README.md", vec![1.0, 0.0], Utc::now());
        store.append_doc(&doc).await.unwrap();

        let hits = store
            .nearest_neighbors(Collection::Docs, &[1.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(matches!(hits[0].payload, MatchPayload::Doc(_)));
    }

    #[tokio::test]
    async fn test_append_doc_is_append_only() {
        let store = InMemoryStore::new();
        let doc = DocRecord::new(DocType::Comment, "Retries twice", "net.rs", vec![1.0], Utc::now());
        assert!(store.append_doc(&doc).await.unwrap());
        assert!(!store.append_doc(&doc).await.unwrap());
        assert_eq!(store.doc_count(), 1);
    }

    #[tokio::test]
    async fn test_append_commit_never_mutates() {
        let store = InMemoryStore::new();
        let original = commit("abc1234def", &["auth.py"], 1);
        assert!(store.append_commit(&original).await.unwrap());

        let mut changed = original.clone();
        changed.message = "rewritten".into();
        assert!(!store.append_commit(&changed).await.unwrap());

        let stored = store.get_commit("abc1234def").await.unwrap().unwrap();
        assert_eq!(stored.message, original.message);
    }

    #[tokio::test]
    async fn test_commits_touching_filters_and_orders() {
        let store = InMemoryStore::new();
        store.append_commit(&commit("h1", &["auth.py"], 1)).await.unwrap();
        store.append_commit(&commit("h3", &["auth.py", "db.py"], 3)).await.unwrap();
        store.append_commit(&commit("h2", &["auth.py"], 2)).await.unwrap();
        store.append_commit(&commit("h4", &["db.py"], 4)).await.unwrap();

        let hits = store.commits_touching("auth.py", 10).await.unwrap();
        let hashes: Vec<&str> = hits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["h3", "h2", "h1"]);

        let limited = store.commits_touching("auth.py", 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }
}
