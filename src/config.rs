//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to defaults.
//! [`load_config`] parses and validates; the `*_params` helpers turn the
//! parsed sections into the parameter structs the core components take.
//!
//! ```toml
//! [db]
//! path = "./data/lens.sqlite"
//!
//! [indexing]
//! root = "."
//! include_globs = ["**/*.py", "**/*.rs"]
//!
//! [retrieval]
//! docs_min_score = 0.7
//!
//! [retrieval.faults]
//! docs = "degrade"
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [server]
//! bind = "127.0.0.1:7331"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use code_lens_core::context::{ContextParams, FaultPolicy, OnFailure};
use code_lens_core::prompt::PromptLimits;
use code_lens_core::retrieve::RetrieverParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_doc_globs")]
    pub doc_globs: Vec<String>,
    #[serde(default = "default_chunk_lines")]
    pub chunk_lines: usize,
    #[serde(default)]
    pub chunk_overlap: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            doc_globs: default_doc_globs(),
            chunk_lines: default_chunk_lines(),
            chunk_overlap: 0,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_include_globs() -> Vec<String> {
    [
        "**/*.py", "**/*.rs", "**/*.js", "**/*.ts", "**/*.go", "**/*.java", "**/*.sql",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_doc_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}
fn default_chunk_lines() -> usize {
    40
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_code_top_k")]
    pub code_top_k: usize,
    #[serde(default = "default_commit_limit")]
    pub commit_limit: usize,
    #[serde(default = "default_docs_top_k")]
    pub docs_top_k: usize,
    #[serde(default = "default_docs_min_score")]
    pub docs_min_score: f32,
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    #[serde(default)]
    pub faults: FaultsConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            code_top_k: default_code_top_k(),
            commit_limit: default_commit_limit(),
            docs_top_k: default_docs_top_k(),
            docs_min_score: default_docs_min_score(),
            candidate_k: default_candidate_k(),
            faults: FaultsConfig::default(),
        }
    }
}

fn default_code_top_k() -> usize {
    5
}
fn default_commit_limit() -> usize {
    10
}
fn default_docs_top_k() -> usize {
    5
}
fn default_docs_min_score() -> f32 {
    code_lens_core::models::DOCS_MIN_SCORE
}
fn default_candidate_k() -> usize {
    50
}

/// `[retrieval.faults]`: per-signal behavior when a lookup fails.
#[derive(Debug, Deserialize, Clone)]
pub struct FaultsConfig {
    #[serde(default = "default_commits_fault")]
    pub commits: FaultMode,
    #[serde(default = "default_docs_fault")]
    pub docs: FaultMode,
}

impl Default for FaultsConfig {
    fn default() -> Self {
        Self {
            commits: default_commits_fault(),
            docs: default_docs_fault(),
        }
    }
}

fn default_commits_fault() -> FaultMode {
    FaultMode::Fail
}
fn default_docs_fault() -> FaultMode {
    FaultMode::Degrade
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FaultMode {
    Fail,
    Degrade,
}

impl From<FaultMode> for OnFailure {
    fn from(mode: FaultMode) -> Self {
        match mode {
            FaultMode::Fail => OnFailure::Fail,
            FaultMode::Degrade => OnFailure::Degrade,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_max_similar_code")]
    pub max_similar_code: usize,
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,
    #[serde(default = "default_max_docs")]
    pub max_docs: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_similar_code: default_max_similar_code(),
            max_commits: default_max_commits(),
            max_docs: default_max_docs(),
        }
    }
}

fn default_max_similar_code() -> usize {
    3
}
fn default_max_commits() -> usize {
    5
}
fn default_max_docs() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL override; each provider has its own default.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: default_dims(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

impl Config {
    /// A config with every section at its default and the database at `db_path`.
    pub fn with_db(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            indexing: IndexingConfig::default(),
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn retriever_params(&self) -> RetrieverParams {
        RetrieverParams {
            candidate_k: self.retrieval.candidate_k,
        }
    }

    pub fn context_params(&self) -> ContextParams {
        ContextParams {
            code_top_k: self.retrieval.code_top_k,
            commit_limit: self.retrieval.commit_limit,
            docs_top_k: self.retrieval.docs_top_k,
            docs_min_score: self.retrieval.docs_min_score,
        }
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        FaultPolicy {
            commits: self.retrieval.faults.commits.into(),
            docs: self.retrieval.faults.docs.into(),
        }
    }

    pub fn prompt_limits(&self) -> PromptLimits {
        PromptLimits {
            max_similar_code: self.prompt.max_similar_code,
            max_commits: self.prompt.max_commits,
            max_docs: self.prompt.max_docs,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let indexing = &config.indexing;
    if indexing.chunk_lines == 0 {
        bail!("indexing.chunk_lines must be > 0");
    }
    if indexing.chunk_overlap >= indexing.chunk_lines {
        bail!("indexing.chunk_overlap must be smaller than indexing.chunk_lines");
    }

    let retrieval = &config.retrieval;
    if retrieval.code_top_k < 1 {
        bail!("retrieval.code_top_k must be >= 1");
    }
    if retrieval.docs_top_k < 1 {
        bail!("retrieval.docs_top_k must be >= 1");
    }
    if retrieval.commit_limit < 1 {
        bail!("retrieval.commit_limit must be >= 1");
    }
    if !(-1.0..=1.0).contains(&retrieval.docs_min_score) {
        bail!("retrieval.docs_min_score must be in [-1.0, 1.0]");
    }

    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if embedding.is_enabled() {
        if embedding.dims == 0 {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                embedding.provider
            );
        }
        if embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                embedding.provider
            );
        }
    }

    let generation = &config.generation;
    match generation.provider.as_str() {
        "disabled" | "gemini" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse_config("[db]\npath = \"./lens.sqlite\"\n").unwrap();
        assert_eq!(cfg.indexing.chunk_lines, 40);
        assert_eq!(cfg.retrieval.code_top_k, 5);
        assert_eq!(cfg.retrieval.commit_limit, 10);
        assert_eq!(cfg.retrieval.docs_top_k, 5);
        assert!((cfg.retrieval.docs_min_score - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.prompt_limits(), PromptLimits::default());
        assert_eq!(cfg.fault_policy(), FaultPolicy::default());
        assert!(!cfg.embedding.is_enabled());
        assert!(!cfg.generation.is_enabled());
    }

    #[test]
    fn test_fault_modes_parse() {
        let cfg = parse_config(
            r#"
            [db]
            path = "x.sqlite"

            [retrieval.faults]
            commits = "degrade"
            docs = "fail"
            "#,
        )
        .unwrap();
        let policy = cfg.fault_policy();
        assert_eq!(policy.commits, OnFailure::Degrade);
        assert_eq!(policy.docs, OnFailure::Fail);
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let err = parse_config("[db]\npath = \"x\"\n[retrieval]\ncode_top_k = 0\n").unwrap_err();
        assert!(err.to_string().contains("code_top_k"));
    }

    #[test]
    fn test_rejects_overlap_not_below_chunk_lines() {
        let err = parse_config("[db]\npath = \"x\"\n[indexing]\nchunk_lines = 4\nchunk_overlap = 4\n")
            .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_rejects_min_score_out_of_range() {
        assert!(parse_config("[db]\npath = \"x\"\n[retrieval]\ndocs_min_score = 1.5\n").is_err());
    }

    #[test]
    fn test_enabled_embedding_needs_model() {
        let err = parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[generation]\nprovider = \"magic\"\n").is_err());
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
