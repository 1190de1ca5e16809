//! Filesystem walker for code and documentation files.
//!
//! Walks `[indexing].root`, keeps files matching the include globs and
//! not matching the exclude globs (plus `.git`, `target`, and
//! `node_modules`, which are always excluded), and reads them as UTF-8.
//! Paths are reported relative to the root with `/` separators so chunk
//! ids are stable across platforms.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the scan root, `/`-separated.
    pub rel_path: String,
    pub body: String,
}

/// Collect matching files under `root`, sorted by relative path.
/// Files that are not valid UTF-8 are skipped.
pub fn scan_files(
    root: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        bail!("Indexing root does not exist: {}", root.display());
    }

    let include_set = build_globset(include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let body = match std::fs::read_to_string(path) {
            Ok(body) => body,
            Err(e) => {
                debug!(path = %rel_str, error = %e, "skipping unreadable file");
                continue;
            }
        };
        files.push(SourceFile {
            rel_path: rel_str,
            body,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_scan_applies_globs_and_default_excludes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/auth.py", b"def login(): pass\n");
        write(tmp.path(), "src/util.rs", b"fn f() {}\n");
        write(tmp.path(), "README.md", b"# Demo\n");
        write(tmp.path(), "node_modules/lib/x.py", b"x = 1\n");
        write(tmp.path(), "src/gen/skip.py", b"y = 2\n");

        let files = scan_files(
            tmp.path(),
            &["**/*.py".to_string(), "**/*.rs".to_string()],
            &["src/gen/**".to_string()],
        )
        .unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["src/auth.py", "src/util.rs"]);
        assert_eq!(files[0].body, "def login(): pass\n");
    }

    #[test]
    fn test_non_utf8_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "bin.py", &[0xff, 0xfe, 0x00]);
        write(tmp.path(), "ok.py", b"ok = True\n");
        let files = scan_files(tmp.path(), &["**/*.py".to_string()], &[]).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, "ok.py");
    }

    #[test]
    fn test_missing_root_is_error() {
        assert!(scan_files(Path::new("/no/such/root"), &[], &[]).is_err());
    }

    #[test]
    fn test_invalid_glob_is_error() {
        assert!(build_globset(&["[".to_string()]).is_err());
    }
}
