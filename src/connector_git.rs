//! Commit history reader.
//!
//! Runs `git log --name-only` in a local repository and parses each
//! commit into a [`GitCommit`]: full hash, author, strict ISO date,
//! message, the files it touched, and ticket references found in the
//! message (`ABC-123` style keys and `#123` issue numbers).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

const RECORD_SEP: char = '\u{1e}';
const FIELD_SEP: char = '\u{1f}';
/// Hash, author name, author email, strict ISO date, and raw body,
/// each record prefixed with RS and fields split by US.
const LOG_FORMAT: &str = "--format=%x1e%H%x1f%an%x1f%ae%x1f%aI%x1f%B%x1f";

/// One commit as read from `git log`, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct GitCommit {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub files_changed: BTreeSet<String>,
    pub ticket_refs: BTreeSet<String>,
}

/// Read up to `max_count` commits (all when `None`) reachable from HEAD,
/// newest first.
pub fn read_git_log(repo_dir: &Path, max_count: Option<usize>) -> Result<Vec<GitCommit>> {
    if !repo_dir.join(".git").exists() {
        bail!("Not a git repository: {}", repo_dir.display());
    }

    let mut cmd = Command::new("git");
    cmd.args(["log", "--name-only", "--no-color", LOG_FORMAT]);
    if let Some(n) = max_count {
        cmd.arg(format!("--max-count={}", n));
    }

    let output = cmd
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to execute 'git log'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git log failed: {}", stderr.trim());
    }

    parse_git_log(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the record/field-separated output produced by [`read_git_log`].
pub fn parse_git_log(output: &str) -> Result<Vec<GitCommit>> {
    let mut commits = Vec::new();

    for record in output.split(RECORD_SEP) {
        if record.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = record.splitn(6, FIELD_SEP).collect();
        if fields.len() < 6 {
            bail!("Malformed git log record: {:?}", record.trim());
        }

        let hash = fields[0].trim().to_string();
        let date = DateTime::parse_from_rfc3339(fields[3].trim())
            .with_context(|| format!("Bad commit date for {}: {}", hash, fields[3]))?
            .with_timezone(&Utc);
        let message = fields[4].trim().to_string();
        let files_changed = fields[5]
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        commits.push(GitCommit {
            ticket_refs: extract_ticket_refs(&message),
            hash,
            author_name: fields[1].trim().to_string(),
            author_email: fields[2].trim().to_string(),
            date,
            message,
            files_changed,
        });
    }

    Ok(commits)
}

/// `PROJ-42` style keys (an uppercase project prefix of at least two
/// characters) and `#42` issue numbers.
static TICKET_REF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#\d+\b|\b[A-Z][A-Z0-9]+-\d+\b").expect("valid regex")
});

/// Ticket references in a commit message, deduplicated and sorted.
pub fn extract_ticket_refs(message: &str) -> BTreeSet<String> {
    TICKET_REF_REGEX
        .find_iter(message)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, date: &str, message: &str, files: &[&str]) -> String {
        format!(
            "{rs}{hash}{fs}Dana Reyes{fs}dana@example.com{fs}{date}{fs}{message}\n{fs}\n\n{files}\n",
            rs = RECORD_SEP,
            fs = FIELD_SEP,
            hash = hash,
            date = date,
            message = message,
            files = files.join("\n"),
        )
    }

    #[test]
    fn test_parse_git_log() {
        let out = format!(
            "{}{}",
            record(
                "a1b2c3d4e5f6",
                "2024-03-01T10:00:00+01:00",
                "Fix token refresh (AUTH-17)\n\nCloses #42",
                &["auth.py", "session.py"]
            ),
            record("0f0f0f0f0f0f", "2024-02-01T09:00:00Z", "Initial import", &["auth.py"]),
        );
        let commits = parse_git_log(&out).unwrap();
        assert_eq!(commits.len(), 2);

        let first = &commits[0];
        assert_eq!(first.hash, "a1b2c3d4e5f6");
        assert_eq!(first.author_name, "Dana Reyes");
        assert_eq!(first.author_email, "dana@example.com");
        assert_eq!(first.date.to_rfc3339(), "2024-03-01T09:00:00+00:00");
        assert_eq!(first.message, "Fix token refresh (AUTH-17)\n\nCloses #42");
        assert_eq!(
            first.files_changed.iter().collect::<Vec<_>>(),
            vec!["auth.py", "session.py"]
        );
        assert_eq!(
            first.ticket_refs.iter().collect::<Vec<_>>(),
            vec!["#42", "AUTH-17"]
        );
        assert!(commits[1].ticket_refs.is_empty());
    }

    #[test]
    fn test_merge_commit_without_files() {
        let out = record("abc", "2024-01-01T00:00:00Z", "Merge branch 'main'", &[]);
        let commits = parse_git_log(&out).unwrap();
        assert!(commits[0].files_changed.is_empty());
    }

    #[test]
    fn test_malformed_record_is_error() {
        let out = format!("{}abc{}only two fields", RECORD_SEP, FIELD_SEP);
        assert!(parse_git_log(&out).is_err());
    }

    #[test]
    fn test_extract_ticket_refs() {
        let refs = extract_ticket_refs("PROJ-12: fix (see OPS2-7, #9, a-1, X-1, #abc, Proj-3)");
        assert_eq!(
            refs.into_iter().collect::<Vec<_>>(),
            vec!["#9", "OPS2-7", "PROJ-12"]
        );
    }

    #[test]
    fn test_extract_ticket_refs_inside_punctuation() {
        let refs = extract_ticket_refs("Fix PROJ-12-followup and see foo#123 and (ABC-7)");
        assert_eq!(
            refs.into_iter().collect::<Vec<_>>(),
            vec!["#123", "ABC-7", "PROJ-12"]
        );
    }

    #[test]
    fn test_extract_ticket_refs_deduplicates() {
        let refs = extract_ticket_refs("AUTH-17 again AUTH-17; #4 #4x #4");
        assert_eq!(refs.into_iter().collect::<Vec<_>>(), vec!["#4", "AUTH-17"]);
    }

    #[test]
    fn test_read_git_log_rejects_non_repo() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(read_git_log(tmp.path(), None).is_err());
    }
}
