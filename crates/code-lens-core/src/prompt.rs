//! Renders a [`RagContext`] into a Markdown prompt for a language model.
//!
//! Formatting is pure: the same context always yields the same string.
//! The per-section limits here are independent of how many matches the
//! builder fetched.

use std::fmt::Write;

use crate::models::{MatchPayload, RagContext};

/// Length of the abbreviated commit hash shown in prompts.
pub const SHORT_HASH_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLimits {
    pub max_similar_code: usize,
    pub max_commits: usize,
    pub max_docs: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_similar_code: 3,
            max_commits: 5,
            max_docs: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptFormatter {
    limits: PromptLimits,
}

impl PromptFormatter {
    pub fn new(limits: PromptLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PromptLimits {
        &self.limits
    }

    /// Render `ctx` as a prompt.
    ///
    /// Sections, in order: target code, similar code, recent commit
    /// history, related documentation (omitted when there is none), and
    /// the closing list of requests.
    pub fn format(&self, ctx: &RagContext) -> String {
        let mut out = String::new();
        let lang = fence_language(&ctx.file_path);

        out.push_str("# Code Explanation Request\n\n");
        let _ = writeln!(out, "## Target Code (from {}):", ctx.file_path);
        push_fenced(&mut out, lang, &ctx.target_code);
        out.push('\n');

        out.push_str("## Similar Code Context:\n");
        let code = ctx
            .similar_code
            .iter()
            .filter_map(|m| match &m.payload {
                MatchPayload::Code(c) => Some(c),
                _ => None,
            })
            .take(self.limits.max_similar_code);
        for chunk in code {
            let _ = writeln!(
                out,
                "### {} (lines {}-{}):",
                chunk.file_path, chunk.line_start, chunk.line_end
            );
            push_fenced(&mut out, fence_language(&chunk.file_path), &chunk.content);
        }
        out.push('\n');

        out.push_str("## Recent Commit History:\n");
        let commits = ctx
            .commit_history
            .iter()
            .filter_map(|m| match &m.payload {
                MatchPayload::Commit(c) => Some(c),
                _ => None,
            })
            .take(self.limits.max_commits);
        for commit in commits {
            let _ = writeln!(
                out,
                "- {}: {} by {} on {}",
                short_hash(&commit.hash),
                first_line(&commit.message),
                commit.author_name,
                commit.date.format("%Y-%m-%d")
            );
        }
        out.push('\n');

        let docs: Vec<_> = ctx
            .documentation
            .iter()
            .filter_map(|m| match &m.payload {
                MatchPayload::Doc(d) => Some(d),
                _ => None,
            })
            .take(self.limits.max_docs)
            .collect();
        if !docs.is_empty() {
            out.push_str("## Related Documentation:\n");
            for doc in docs {
                let _ = writeln!(
                    out,
                    "### {} from {}:",
                    title_case(doc.doc_type.as_str()),
                    doc.file_path
                );
                let _ = writeln!(out, "{}\n", doc.content.trim_end());
            }
        }

        out.push_str("## Please provide:\n");
        out.push_str("1. What this code does (technical explanation)\n");
        out.push_str("2. Why this code exists (business/project context)\n");
        out.push_str("3. Source information (commit IDs, ticket references, author info)\n");
        out
    }
}

fn push_fenced(out: &mut String, lang: &str, code: &str) {
    let _ = writeln!(out, "```{}", lang);
    out.push_str(code.trim_end_matches('\n'));
    out.push_str("\n```\n");
}

/// First `SHORT_HASH_LEN` characters of a commit hash.
pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(SHORT_HASH_LEN) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("").trim()
}

/// Capitalize the first letter of each word (`readme` → `Readme`,
/// `doc_string` → `Doc_String`).
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Fence language tag for a file path, from its extension.
/// Unknown extensions get an empty tag.
pub fn fence_language(file_path: &str) -> &'static str {
    let ext = file_path
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.contains('/'))
        .unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "py" => "python",
        "rs" => "rust",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" => "cpp",
        "cs" => "csharp",
        "sql" => "sql",
        "sh" | "bash" => "bash",
        "md" => "markdown",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        _ => "",
    }
}
