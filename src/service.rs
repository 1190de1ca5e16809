//! Application wiring.
//!
//! [`Lens`] owns one instance of every pipeline component, built from a
//! [`Config`], and exposes the operations shared by the CLI and the HTTP
//! server. Core errors pass through unchanged as [`LensError::Rag`].

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{info, warn};

use code_lens_core::context::RagContextBuilder;
use code_lens_core::embedding::Embedder;
use code_lens_core::error::RagError;
use code_lens_core::indexer::ChunkIndexer;
use code_lens_core::models::{Collection, CommitRecord, CommitView, RagContext, RetrievalMatch};
use code_lens_core::prompt::PromptFormatter;
use code_lens_core::retrieve::{ContextRetriever, RetrievalQuery};
use code_lens_core::store::{CommitSource, VectorStore};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::error::LensError;
use crate::generate::{create_generator, Generator, UnavailableGenerator};
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// A generated explanation plus everything that went into it.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub model: String,
    pub explanation: String,
    pub prompt: String,
    pub context: RagContext,
}

#[derive(Clone)]
pub struct Lens {
    config: Arc<Config>,
    vectors: Arc<dyn VectorStore>,
    commits: Arc<dyn CommitSource>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    indexer: ChunkIndexer,
    retriever: ContextRetriever,
    builder: RagContextBuilder,
    formatter: PromptFormatter,
}

impl Lens {
    /// Open the configured SQLite database (running migrations) and
    /// create the configured providers.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        let store = Arc::new(SqliteStore::new(pool));
        let embedder = create_embedder(&config.embedding)?;
        let generator: Arc<dyn Generator> = match create_generator(&config.generation) {
            Ok(generator) => generator,
            Err(e) => {
                warn!(error = %e, "generator unavailable; explain requests will fail");
                Arc::new(UnavailableGenerator::new(e.to_string()))
            }
        };
        Ok(Self::from_parts(
            config.clone(),
            store.clone(),
            store,
            embedder,
            generator,
        ))
    }

    pub fn from_parts(
        config: Config,
        vectors: Arc<dyn VectorStore>,
        commits: Arc<dyn CommitSource>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let indexer = ChunkIndexer::new(embedder.clone(), vectors.clone());
        let retriever =
            ContextRetriever::new(embedder.clone(), vectors.clone(), config.retriever_params());
        let builder = RagContextBuilder::new(
            retriever.clone(),
            commits.clone(),
            config.context_params(),
            config.fault_policy(),
        );
        let formatter = PromptFormatter::new(config.prompt_limits());
        Self {
            config: Arc::new(config),
            vectors,
            commits,
            embedder,
            generator,
            indexer,
            retriever,
            builder,
            formatter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn vectors(&self) -> &dyn VectorStore {
        self.vectors.as_ref()
    }

    pub fn commits(&self) -> &dyn CommitSource {
        self.commits.as_ref()
    }

    pub fn indexer(&self) -> &ChunkIndexer {
        &self.indexer
    }

    pub async fn index_chunk(
        &self,
        content: &str,
        file_path: &str,
        line_start: u32,
        line_end: u32,
    ) -> Result<String, LensError> {
        Ok(self
            .indexer
            .index_chunk(content, file_path, line_start, line_end)
            .await?)
    }

    /// Similarity search in one collection. `min_score` of `None` keeps
    /// the collection's default bound.
    pub async fn search(
        &self,
        collection: Collection,
        text: &str,
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievalMatch>, LensError> {
        let mut query = RetrievalQuery::new(collection, text, top_k);
        if min_score.is_some() {
            query = query.with_min_score(min_score);
        }
        Ok(self.retriever.retrieve(&query).await?)
    }

    /// Commits that touched `file_path`, newest first.
    pub async fn commit_history(
        &self,
        file_path: &str,
        limit: usize,
    ) -> Result<Vec<CommitView>, LensError> {
        if limit == 0 {
            return Err(RagError::invalid("limit must be >= 1").into());
        }
        let commits = self.commits.commits_touching(file_path, limit).await?;
        Ok(commits.iter().map(CommitView::from).collect())
    }

    pub async fn get_commit(&self, hash: &str) -> Result<Option<CommitRecord>, LensError> {
        Ok(self.commits.get_commit(hash).await?)
    }

    pub async fn build_context(
        &self,
        target_code: &str,
        file_path: &str,
    ) -> Result<RagContext, LensError> {
        Ok(self.builder.build(target_code, file_path).await?)
    }

    pub fn format_prompt(&self, context: &RagContext) -> String {
        self.formatter.format(context)
    }

    /// Build the context, render the prompt, and ask the generator.
    pub async fn explain(&self, target_code: &str, file_path: &str) -> Result<Explanation, LensError> {
        let context = self.build_context(target_code, file_path).await?;
        let prompt = self.format_prompt(&context);
        let explanation = self.generator.generate(&prompt).await?;
        info!(file_path, model = self.generator.model_name(), "generated explanation");
        Ok(Explanation {
            model: self.generator.model_name().to_string(),
            explanation,
            prompt,
            context,
        })
    }
}

/// Parse an inclusive `start-end` line range (1-based).
pub fn parse_line_range(range: &str) -> anyhow::Result<(u32, u32)> {
    let (start, end) = range
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("invalid line range '{}': expected START-END", range))?;
    let start: u32 = start.trim().parse().with_context(|| format!("invalid start line in '{}'", range))?;
    let end: u32 = end.trim().parse().with_context(|| format!("invalid end line in '{}'", range))?;
    if start == 0 || start > end {
        bail!("invalid line range '{}': need 1 <= START <= END", range);
    }
    Ok((start, end))
}

/// Read a target snippet from disk.
///
/// Returns the code (the whole file, or only `lines` when given) and the
/// path to use for commit lookups: relative to `root` when the file lives
/// under it, otherwise as given.
pub fn load_target(
    root: &Path,
    file: &Path,
    lines: Option<(u32, u32)>,
) -> anyhow::Result<(String, String)> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let code = match lines {
        None => text,
        Some((start, end)) => {
            if start == 0 || start > end {
                bail!("invalid line range {}-{}: need 1 <= START <= END", start, end);
            }
            let selected: Vec<&str> = text
                .lines()
                .skip(start as usize - 1)
                .take((end - start + 1) as usize)
                .collect();
            if selected.is_empty() {
                bail!("{} has no lines in {}-{}", file.display(), start, end);
            }
            selected.join("\n")
        }
    };

    let rel_path = match (file.canonicalize(), root.canonicalize()) {
        (Ok(abs_file), Ok(abs_root)) => abs_file
            .strip_prefix(&abs_root)
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_else(|_| file.to_string_lossy().to_string()),
        _ => file.to_string_lossy().to_string(),
    };

    Ok((code, rel_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_line_range() {
        assert_eq!(parse_line_range("3-7").unwrap(), (3, 7));
        assert_eq!(parse_line_range("5-5").unwrap(), (5, 5));
        assert!(parse_line_range("7-3").is_err());
        assert!(parse_line_range("0-3").is_err());
        assert!(parse_line_range("abc").is_err());
    }

    #[test]
    fn test_load_target_relative_path_and_lines() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("src");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("auth.py");
        std::fs::write(&file, "a = 1\nb = 2\nc = 3\n").unwrap();

        let (code, rel) = load_target(tmp.path(), &file, Some((2, 3))).unwrap();
        assert_eq!(code, "b = 2\nc = 3");
        assert_eq!(rel, "src/auth.py");

        let (whole, _) = load_target(tmp.path(), &file, None).unwrap();
        assert_eq!(whole, "a = 1\nb = 2\nc = 3\n");

        assert!(load_target(tmp.path(), &file, Some((10, 12))).is_err());
    }

    #[test]
    fn test_load_target_rejects_inverted_or_zero_range() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("auth.py");
        std::fs::write(&file, "a = 1\nb = 2\n").unwrap();

        let err = load_target(tmp.path(), &file, Some((0, 1))).unwrap_err();
        assert!(err.to_string().contains("invalid line range 0-1"), "got: {}", err);
        assert!(load_target(tmp.path(), &file, Some((2, 1))).is_err());
    }
}
