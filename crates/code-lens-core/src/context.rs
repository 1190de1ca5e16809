//! Assembles a [`RagContext`] for one target snippet.
//!
//! Three independent lookups run concurrently and are joined:
//!
//! | Section | Source | Default limit |
//! |---------|--------|---------------|
//! | similar code | cosine search over the code collection | 5 |
//! | commit history | commits whose `files_changed` contains the path | 10 |
//! | documentation | cosine search over docs, score > 0.7 | 5 |
//!
//! A failure in the code lookup always fails the build. Commit and doc
//! failures follow the [`FaultPolicy`]; a degraded section is left empty
//! and its collection is listed in [`RagContext::degraded`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{RagError, Result};
use crate::models::{Collection, MatchPayload, RagContext, RetrievalMatch, DOCS_MIN_SCORE};
use crate::retrieve::{ContextRetriever, RetrievalQuery};
use crate::store::{sort_commits_newest_first, CommitSource};

/// Commit-history matches are selected by a structured filter, not by
/// similarity, so they all carry this score.
pub const COMMIT_MATCH_SCORE: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct ContextParams {
    pub code_top_k: usize,
    pub commit_limit: usize,
    pub docs_top_k: usize,
    pub docs_min_score: f32,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            code_top_k: 5,
            commit_limit: 10,
            docs_top_k: 5,
            docs_min_score: DOCS_MIN_SCORE,
        }
    }
}

/// What to do when an optional section's lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnFailure {
    /// Propagate the error; the whole build fails.
    #[default]
    Fail,
    /// Log a warning and continue with the section empty.
    Degrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultPolicy {
    pub commits: OnFailure,
    pub docs: OnFailure,
}

impl Default for FaultPolicy {
    fn default() -> Self {
        Self {
            commits: OnFailure::Fail,
            docs: OnFailure::Degrade,
        }
    }
}

#[derive(Clone)]
pub struct RagContextBuilder {
    retriever: ContextRetriever,
    commits: Arc<dyn CommitSource>,
    params: ContextParams,
    policy: FaultPolicy,
}

impl RagContextBuilder {
    pub fn new(
        retriever: ContextRetriever,
        commits: Arc<dyn CommitSource>,
        params: ContextParams,
        policy: FaultPolicy,
    ) -> Self {
        Self {
            retriever,
            commits,
            params,
            policy,
        }
    }

    pub fn params(&self) -> &ContextParams {
        &self.params
    }

    /// Build the context for `target_code` located at `file_path`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `target_code` is blank.
    /// - Any error from the code lookup.
    /// - Errors from the commit or doc lookups whose policy is
    ///   [`OnFailure::Fail`].
    pub async fn build(&self, target_code: &str, file_path: &str) -> Result<RagContext> {
        if target_code.trim().is_empty() {
            return Err(RagError::invalid("target_code must not be empty"));
        }

        let code_query = RetrievalQuery::new(Collection::Code, target_code, self.params.code_top_k);
        let docs_query = RetrievalQuery::new(Collection::Docs, target_code, self.params.docs_top_k)
            .with_min_score(Some(self.params.docs_min_score));

        let (code, commits, docs) = futures::join!(
            self.retriever.retrieve(&code_query),
            self.commit_history(file_path),
            self.retriever.retrieve(&docs_query),
        );

        let similar_code = code?;
        let mut degraded = Vec::new();
        let commit_history = settle(Collection::Commits, commits, self.policy.commits, &mut degraded)?;
        let documentation = settle(Collection::Docs, docs, self.policy.docs, &mut degraded)?;

        info!(
            file_path,
            similar_code = similar_code.len(),
            commits = commit_history.len(),
            docs = documentation.len(),
            degraded = degraded.len(),
            "built rag context"
        );

        Ok(RagContext {
            target_code: target_code.to_string(),
            file_path: file_path.to_string(),
            similar_code,
            commit_history,
            documentation,
            degraded,
            timestamp: Utc::now(),
        })
    }

    async fn commit_history(&self, file_path: &str) -> Result<Vec<RetrievalMatch>> {
        let mut commits = self
            .commits
            .commits_touching(file_path, self.params.commit_limit)
            .await?;
        // Backends are asked for newest-first; re-sort so the order holds anyway.
        sort_commits_newest_first(&mut commits);
        commits.truncate(self.params.commit_limit);
        Ok(commits
            .iter()
            .map(|c| RetrievalMatch {
                source_id: c.hash.clone(),
                score: COMMIT_MATCH_SCORE,
                payload: MatchPayload::Commit(c.into()),
            })
            .collect())
    }
}

fn settle(
    collection: Collection,
    outcome: Result<Vec<RetrievalMatch>>,
    on_failure: OnFailure,
    degraded: &mut Vec<Collection>,
) -> Result<Vec<RetrievalMatch>> {
    match (outcome, on_failure) {
        (Ok(matches), _) => Ok(matches),
        (Err(e), OnFailure::Fail) => Err(e),
        (Err(e), OnFailure::Degrade) => {
            warn!(%collection, error = %e, "lookup failed; continuing without it");
            degraded.push(collection);
            Ok(Vec::new())
        }
    }
}
