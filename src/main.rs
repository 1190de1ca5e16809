//! # code-lens CLI (`lens`)
//!
//! ## Usage
//!
//! ```bash
//! lens --config ./config/lens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lens init` | Create the SQLite database and run schema migrations |
//! | `lens index code` | Chunk and embed source files under `[indexing].root` |
//! | `lens index docs` | Embed READMEs, text files, and code comments |
//! | `lens index commits --repo <dir>` | Import `git log` history |
//! | `lens search <collection> "<query>"` | Similarity search in one collection |
//! | `lens context <file>` | Print the explanation prompt for a file or line range |
//! | `lens explain <file>` | Ask the configured model to explain the code |
//! | `lens stats` | Show what is indexed |
//! | `lens serve` | Start the HTTP API |
//!
//! Log verbosity follows `RUST_LOG` (e.g. `RUST_LOG=code_lens=debug`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use code_lens::config;
use code_lens::ingest;
use code_lens::migrate;
use code_lens::server;
use code_lens::service::{load_target, parse_line_range, Lens};
use code_lens::stats;
use code_lens_core::models::{Collection, MatchPayload, RetrievalMatch};
use code_lens_core::prompt::short_hash;

/// code-lens: explain code with context from similar code, commit
/// history, and documentation.
#[derive(Parser)]
#[command(name = "lens", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index code, documentation, or commit history.
    Index {
        #[command(subcommand)]
        target: IndexTarget,
    },

    /// Similarity search in one collection.
    Search {
        /// `code`, `commits`, or `docs`.
        collection: String,

        query: String,

        /// Maximum number of results.
        #[arg(long, default_value = "5")]
        limit: usize,

        /// Only return matches scoring above this value. Defaults to the
        /// collection's configured bound.
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Build the context for a file and print the prompt that would be sent.
    Context {
        file: PathBuf,

        /// Inclusive line range, e.g. `10-42`.
        #[arg(long)]
        lines: Option<String>,
    },

    /// Build the context for a file and ask the configured model to explain it.
    Explain {
        file: PathBuf,

        /// Inclusive line range, e.g. `10-42`.
        #[arg(long)]
        lines: Option<String>,

        /// Also print the prompt that was sent.
        #[arg(long)]
        show_prompt: bool,
    },

    /// Show counts for each collection.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum IndexTarget {
    /// Chunk and embed every file matching `[indexing].include_globs`.
    Code,
    /// Embed prose files and code comments.
    Docs,
    /// Import commits from a git repository.
    Commits {
        /// Repository directory. Defaults to `[indexing].root`.
        #[arg(long)]
        repo: Option<PathBuf>,

        /// Only import the newest N commits.
        #[arg(long)]
        max_count: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { target } => {
            let lens = Lens::open(&cfg).await?;
            match target {
                IndexTarget::Code => {
                    let s = ingest::index_code(&lens).await?;
                    println!("Indexed {} chunks from {} files.", s.chunks, s.files);
                }
                IndexTarget::Docs => {
                    let s = ingest::index_docs(&lens).await?;
                    println!(
                        "Indexed docs from {} files: {} added, {} already present.",
                        s.files, s.added, s.existing
                    );
                }
                IndexTarget::Commits { repo, max_count } => {
                    let repo = repo.unwrap_or_else(|| cfg.indexing.root.clone());
                    let s = ingest::import_commits(&lens, &repo, max_count).await?;
                    println!(
                        "Read {} commits: {} added, {} already present.",
                        s.read, s.added, s.existing
                    );
                }
            }
        }
        Commands::Search {
            collection,
            query,
            limit,
            min_score,
        } => {
            let collection: Collection = collection.parse()?;
            let lens = Lens::open(&cfg).await?;
            let matches = lens.search(collection, &query, limit, min_score).await?;
            if matches.is_empty() {
                println!("No results.");
            }
            for (i, m) in matches.iter().enumerate() {
                print_match(i + 1, m);
            }
        }
        Commands::Context { file, lines } => {
            let lens = Lens::open(&cfg).await?;
            let (code, rel_path) = read_target(&cfg, &file, lines.as_deref())?;
            let context = lens.build_context(&code, &rel_path).await?;
            print!("{}", lens.format_prompt(&context));
            print_degraded(&context.degraded);
        }
        Commands::Explain {
            file,
            lines,
            show_prompt,
        } => {
            let lens = Lens::open(&cfg).await?;
            let (code, rel_path) = read_target(&cfg, &file, lines.as_deref())?;
            let answer = lens.explain(&code, &rel_path).await?;
            if show_prompt {
                println!("{}", answer.prompt);
                println!("---");
            }
            println!("{}", answer.explanation.trim_end());
            println!();
            println!("(model: {})", answer.model);
            print_degraded(&answer.context.degraded);
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn read_target(
    cfg: &config::Config,
    file: &std::path::Path,
    lines: Option<&str>,
) -> anyhow::Result<(String, String)> {
    let range = lines.map(parse_line_range).transpose()?;
    load_target(&cfg.indexing.root, file, range)
}

fn print_match(rank: usize, m: &RetrievalMatch) {
    match &m.payload {
        MatchPayload::Code(c) => {
            println!(
                "{}. [{:.3}] {} (lines {}-{})",
                rank, m.score, c.file_path, c.line_start, c.line_end
            );
            for line in c.content.lines().take(3) {
                println!("    {}", line);
            }
        }
        MatchPayload::Commit(c) => {
            println!(
                "{}. [{:.3}] {} {} ({}, {})",
                rank,
                m.score,
                short_hash(&c.hash),
                c.message.lines().next().unwrap_or(""),
                c.author_name,
                c.date.format("%Y-%m-%d")
            );
        }
        MatchPayload::Doc(d) => {
            println!(
                "{}. [{:.3}] {} ({})",
                rank,
                m.score,
                d.file_path,
                d.doc_type.as_str()
            );
            let preview: String = d.content.chars().take(120).collect();
            println!("    {}", preview.replace('\n', " "));
        }
    }
}

fn print_degraded(degraded: &[Collection]) {
    if !degraded.is_empty() {
        let names: Vec<&str> = degraded.iter().map(|c| c.as_str()).collect();
        eprintln!("warning: context is missing {} (retrieval failed)", names.join(", "));
    }
}
