//! Similarity retrieval over a single collection.
//!
//! The retriever embeds the query, asks the store for nearest neighbors,
//! then applies its own filtering and ordering so the result contract
//! holds no matter how the backend ranks ties:
//!
//! 1. Fetch `max(top_k, candidate_k)` neighbors by cosine similarity.
//! 2. Drop non-finite scores and scores `<= min_score`.
//! 3. Sort by score (desc), then id (asc).
//! 4. Truncate to `top_k`.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::{embed_checked, Embedder};
use crate::error::{RagError, Result};
use crate::models::{Collection, RetrievalMatch};
use crate::store::{rank_neighbors, Neighbor, VectorStore};

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct RetrieverParams {
    /// Minimum number of neighbors requested from the store before filtering.
    pub candidate_k: usize,
}

impl Default for RetrieverParams {
    fn default() -> Self {
        Self { candidate_k: 50 }
    }
}

/// Bundles the inputs for one retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalQuery<'a> {
    pub collection: Collection,
    pub text: &'a str,
    /// Maximum number of matches to return; must be at least 1.
    pub top_k: usize,
    /// Matches scoring at or below this bound are dropped.
    pub min_score: Option<f32>,
}

impl<'a> RetrievalQuery<'a> {
    /// A query using the collection's default lower bound
    /// (none for code and commits, `0.7` for docs).
    pub fn new(collection: Collection, text: &'a str, top_k: usize) -> Self {
        Self {
            collection,
            text,
            top_k,
            min_score: collection.default_min_score(),
        }
    }

    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }
}

#[derive(Clone)]
pub struct ContextRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    params: RetrieverParams,
}

impl ContextRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        params: RetrieverParams,
    ) -> Self {
        Self {
            embedder,
            store,
            params,
        }
    }

    /// Ranked matches for `query`. Read-only.
    ///
    /// An empty result means nothing cleared the threshold; a failed
    /// embedding or store call is always an `Err`, never an empty list.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `top_k` is zero.
    /// - [`RagError::Embedding`] if the query cannot be embedded.
    /// - [`RagError::Query`] if the store query fails.
    pub async fn retrieve(&self, query: &RetrievalQuery<'_>) -> Result<Vec<RetrievalMatch>> {
        if query.top_k == 0 {
            return Err(RagError::invalid("top_k must be >= 1"));
        }

        let vector = embed_checked(self.embedder.as_ref(), query.text).await?;
        let k = query.top_k.max(self.params.candidate_k);
        let neighbors = self
            .store
            .nearest_neighbors(query.collection, &vector, k)
            .await?;
        let fetched = neighbors.len();

        let matches = rank_matches(neighbors, query.top_k, query.min_score);
        debug!(
            collection = %query.collection,
            fetched,
            returned = matches.len(),
            "retrieval complete"
        );
        Ok(matches)
    }
}

/// Filter, order, and truncate raw neighbors into matches.
///
/// Every returned score is finite and strictly greater than `min_score`
/// (when set); the output is sorted by score descending with ties broken
/// by ascending id, and holds at most `top_k` entries.
pub fn rank_matches(
    mut neighbors: Vec<Neighbor>,
    top_k: usize,
    min_score: Option<f32>,
) -> Vec<RetrievalMatch> {
    neighbors.retain(|n| n.score.is_finite() && min_score.map_or(true, |min| n.score > min));
    rank_neighbors(&mut neighbors);
    neighbors.truncate(top_k);
    neighbors
        .into_iter()
        .map(|n| RetrievalMatch {
            source_id: n.id,
            score: n.score,
            payload: n.payload,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocRecord, DocType, DocView, MatchPayload};
    use crate::store::memory::InMemoryStore;
    use crate::store::VectorStore;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Always embeds to the unit x-axis, so a stored vector `(s, sqrt(1-s²))`
    /// scores exactly `s`.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn upsert_chunk(&self, _chunk: &crate::models::CodeChunk) -> Result<()> {
            Err(RagError::store("read-only"))
        }
        async fn get_chunk(&self, _id: &str) -> Result<Option<crate::models::CodeChunk>> {
            Err(RagError::query("unreachable"))
        }
        async fn append_doc(&self, _doc: &DocRecord) -> Result<bool> {
            Err(RagError::store("read-only"))
        }
        async fn nearest_neighbors(
            &self,
            _collection: Collection,
            _vector: &[f32],
            _k: usize,
        ) -> Result<Vec<Neighbor>> {
            Err(RagError::query("unreachable"))
        }
    }

    fn at_score(s: f32) -> Vec<f32> {
        vec![s, (1.0 - s * s).max(0.0).sqrt()]
    }

    fn neighbor(id: &str, score: f32) -> Neighbor {
        Neighbor {
            id: id.to_string(),
            score,
            payload: MatchPayload::Doc(DocView {
                doc_type: DocType::Other,
                content: String::new(),
                file_path: String::new(),
            }),
        }
    }

    async fn docs_store(scores: &[f32]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for (i, s) in scores.iter().enumerate() {
            let doc = DocRecord::new(
                DocType::Docstring,
                format!("doc {}", i),
                "auth.py",
                at_score(*s),
                Utc::now(),
            );
            store.append_doc(&doc).await.unwrap();
        }
        store
    }

    fn retriever(store: Arc<dyn VectorStore>) -> ContextRetriever {
        ContextRetriever::new(Arc::new(AxisEmbedder), store, RetrieverParams::default())
    }

    #[test]
    fn test_rank_matches_properties() {
        let neighbors = vec![
            neighbor("a", 0.2),
            neighbor("b", 0.95),
            neighbor("c", 0.5),
            neighbor("d", f32::NAN),
            neighbor("e", 0.5),
            neighbor("f", -0.3),
        ];
        let matches = rank_matches(neighbors, 3, Some(0.1));
        let ids: Vec<&str> = matches.iter().map(|m| m.source_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "e"]);
        for w in matches.windows(2) {
            assert!(w[0].score >= w[1].score);
        }
        assert!(matches.iter().all(|m| m.score > 0.1));
    }

    #[test]
    fn test_min_score_is_exclusive() {
        let matches = rank_matches(vec![neighbor("a", 0.7), neighbor("b", 0.71)], 5, Some(0.7));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source_id, "b");
    }

    #[tokio::test]
    async fn test_docs_default_threshold() {
        let store = docs_store(&[0.65, 0.71]).await;
        let r = retriever(store);
        let q = RetrievalQuery::new(Collection::Docs, "def login()", 5);
        assert_eq!(q.min_score, Some(0.7));

        let matches = r.retrieve(&q).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert!((matches[0].score - 0.71).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_threshold_can_be_lifted() {
        let store = docs_store(&[0.65, 0.71]).await;
        let q = RetrievalQuery::new(Collection::Docs, "def login()", 5).with_min_score(None);
        let matches = retriever(store).retrieve(&q).await.unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn test_code_scenario_scores_in_order() {
        let store = Arc::new(InMemoryStore::new());
        for (i, s) in [0.40f32, 0.91, 0.85].iter().enumerate() {
            let now = Utc::now();
            let line = (i as u32 + 1) * 10;
            store
                .upsert_chunk(&crate::models::CodeChunk {
                    id: crate::models::CodeChunk::span_id("auth.py", line, line + 5),
                    file_path: "auth.py".into(),
                    line_start: line,
                    line_end: line + 5,
                    content: format!("chunk {}", i),
                    embedding: at_score(*s),
                    created_at: now,
                    last_modified: now,
                })
                .await
                .unwrap();
        }
        let q = RetrievalQuery::new(Collection::Code, "def login(): ...", 5);
        let matches = retriever(store).retrieve(&q).await.unwrap();
        let scores: Vec<f32> = matches.iter().map(|m| m.score).collect();
        assert_eq!(scores.len(), 3);
        for (got, want) in scores.iter().zip([0.91f32, 0.85, 0.40]) {
            assert!((got - want).abs() < 1e-4, "got {} want {}", got, want);
        }
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected() {
        let store = docs_store(&[0.9]).await;
        let q = RetrievalQuery::new(Collection::Docs, "x", 0);
        let err = retriever(store).retrieve(&q).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_store_failure_is_an_error_not_empty() {
        let q = RetrievalQuery::new(Collection::Code, "x", 5);
        let err = retriever(Arc::new(BrokenStore)).retrieve(&q).await.unwrap_err();
        assert!(matches!(err, RagError::Query(_)));
    }

    #[tokio::test]
    async fn test_truncates_to_top_k() {
        let store = docs_store(&[0.99, 0.98, 0.97, 0.96]).await;
        let q = RetrievalQuery::new(Collection::Docs, "x", 2);
        let matches = retriever(store).retrieve(&q).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].score > matches[1].score);
    }
}
