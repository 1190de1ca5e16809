//! Documentation extraction from source files.
//!
//! Pulls comment and docstring blocks out of code so they can be indexed
//! as documentation records alongside READMEs:
//!
//! | Syntax | Docstring | Comment |
//! |--------|-----------|---------|
//! | Python | `"""…"""`, `'''…'''` | `#` runs |
//! | Rust | `///`, `//!` runs, `/** … */` | `//` runs, `/* … */` |
//! | C-like (js, ts, go, java, c, …) | `/** … */` | `//` runs, `/* … */` |
//! | Shell, Ruby, YAML, TOML | | `#` runs |
//!
//! A "run" is consecutive lines of the same comment kind. Blocks shorter
//! than [`MIN_DOC_CHARS`] after stripping markers are dropped.

use std::path::Path;

use code_lens_core::models::DocType;

/// Minimum extracted length; shorter blocks are mostly noise like `# noqa`.
pub const MIN_DOC_CHARS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDoc {
    pub doc_type: DocType,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Python,
    Rust,
    CLike,
    Hash,
    Unknown,
}

fn syntax_for(file_path: &str) -> Syntax {
    let ext = Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "py" => Syntax::Python,
        "rs" => Syntax::Rust,
        "js" | "mjs" | "cjs" | "ts" | "tsx" | "jsx" | "go" | "java" | "kt" | "c" | "h" | "cc"
        | "cpp" | "hpp" | "cs" | "swift" | "scala" => Syntax::CLike,
        "sh" | "bash" | "rb" | "yaml" | "yml" | "toml" => Syntax::Hash,
        _ => Syntax::Unknown,
    }
}

/// Doc type for a prose file: Markdown, reST, and `README*` files are
/// [`DocType::Readme`]; anything else is [`DocType::Other`].
pub fn prose_doc_type(file_path: &str) -> DocType {
    let path = Path::new(file_path);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if matches!(ext.as_str(), "md" | "markdown" | "rst") || stem.starts_with("readme") {
        DocType::Readme
    } else {
        DocType::Other
    }
}

struct Delimited {
    open: &'static str,
    close: &'static str,
    doc_type: DocType,
    star_prefixed: bool,
}

impl Syntax {
    fn line_comment<'a>(&self, trimmed: &'a str) -> Option<(DocType, &'a str)> {
        let (doc_type, body) = match self {
            Syntax::Rust => {
                if let Some(rest) = trimmed
                    .strip_prefix("//!")
                    .or_else(|| trimmed.strip_prefix("///").filter(|r| !r.starts_with('/')))
                {
                    (DocType::Docstring, rest)
                } else {
                    (DocType::Comment, trimmed.strip_prefix("//")?)
                }
            }
            Syntax::CLike => (DocType::Comment, trimmed.strip_prefix("//")?),
            Syntax::Python | Syntax::Hash => {
                if trimmed.starts_with("#!") {
                    return None;
                }
                (DocType::Comment, trimmed.strip_prefix('#')?)
            }
            Syntax::Unknown => return None,
        };
        Some((doc_type, body.strip_prefix(' ').unwrap_or(body)))
    }

    fn block_opener(&self, trimmed: &str) -> Option<Delimited> {
        match self {
            Syntax::Python => ["\"\"\"", "'''"]
                .into_iter()
                .find(|q| trimmed.starts_with(q))
                .map(|q| Delimited {
                    open: q,
                    close: q,
                    doc_type: DocType::Docstring,
                    star_prefixed: false,
                }),
            Syntax::Rust | Syntax::CLike => {
                if trimmed.starts_with("/**") && !trimmed.starts_with("/**/") {
                    Some(Delimited {
                        open: "/**",
                        close: "*/",
                        doc_type: DocType::Docstring,
                        star_prefixed: true,
                    })
                } else if trimmed.starts_with("/*") {
                    Some(Delimited {
                        open: "/*",
                        close: "*/",
                        doc_type: DocType::Comment,
                        star_prefixed: true,
                    })
                } else {
                    None
                }
            }
            Syntax::Hash | Syntax::Unknown => None,
        }
    }
}

/// Extract comment and docstring blocks from `text`, in source order.
pub fn extract_code_docs(file_path: &str, text: &str) -> Vec<ExtractedDoc> {
    let syntax = syntax_for(file_path);
    if syntax == Syntax::Unknown {
        return Vec::new();
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut docs = Vec::new();
    let mut run: Option<(DocType, Vec<String>)> = None;
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim_start();

        if let Some(delim) = syntax.block_opener(trimmed) {
            flush(&mut run, &mut docs);
            let (content, consumed) = read_delimited(&lines[i..], &delim);
            push_doc(&mut docs, delim.doc_type, &content);
            i += consumed;
            continue;
        }

        match syntax.line_comment(trimmed) {
            Some((doc_type, body)) => match &mut run {
                Some((kind, body_lines)) if *kind == doc_type => body_lines.push(body.to_string()),
                _ => {
                    flush(&mut run, &mut docs);
                    run = Some((doc_type, vec![body.to_string()]));
                }
            },
            None => flush(&mut run, &mut docs),
        }
        i += 1;
    }
    flush(&mut run, &mut docs);
    docs
}

fn flush(run: &mut Option<(DocType, Vec<String>)>, docs: &mut Vec<ExtractedDoc>) {
    if let Some((doc_type, lines)) = run.take() {
        push_doc(docs, doc_type, &lines.join("\n"));
    }
}

fn push_doc(docs: &mut Vec<ExtractedDoc>, doc_type: DocType, content: &str) {
    let content = content.trim();
    if content.chars().count() >= MIN_DOC_CHARS {
        docs.push(ExtractedDoc {
            doc_type,
            content: content.to_string(),
        });
    }
}

/// Read a delimited block starting at `lines[0]`. Returns the cleaned
/// body and the number of lines consumed. An unterminated block runs to
/// the end of the input.
fn read_delimited(lines: &[&str], delim: &Delimited) -> (String, usize) {
    let first = &lines[0].trim_start()[delim.open.len()..];
    if let Some(end) = first.find(delim.close) {
        return (clean_block_line(&first[..end], delim), 1);
    }

    let mut body = vec![clean_block_line(first, delim)];
    for (offset, line) in lines.iter().enumerate().skip(1) {
        if let Some(end) = line.find(delim.close) {
            body.push(clean_block_line(&line[..end], delim));
            return (body.join("\n"), offset + 1);
        }
        body.push(clean_block_line(line, delim));
    }
    (body.join("\n"), lines.len())
}

fn clean_block_line(line: &str, delim: &Delimited) -> String {
    let trimmed = line.trim();
    if delim.star_prefixed {
        let rest = trimmed.strip_prefix('*').unwrap_or(trimmed);
        rest.strip_prefix(' ').unwrap_or(rest).to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_docstring_and_comments() {
        let src = r#"#!/usr/bin/env python
import os

def login(user):
    """Authenticate a user against the session store.

    Raises AuthError when the token is expired.
    """
    # Tokens are refreshed lazily on first use
    # after the cache is warmed.
    return check(user)  # inline note
"#;
        let docs = extract_code_docs("auth.py", src);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].doc_type, DocType::Docstring);
        assert_eq!(
            docs[0].content,
            "Authenticate a user against the session store.\n\nRaises AuthError when the token is expired."
        );
        assert_eq!(docs[1].doc_type, DocType::Comment);
        assert_eq!(
            docs[1].content,
            "Tokens are refreshed lazily on first use\nafter the cache is warmed."
        );
    }

    #[test]
    fn test_single_line_docstring() {
        let src = "def f():\n    \"\"\"Return the configured retry budget.\"\"\"\n    return 3\n";
        let docs = extract_code_docs("f.py", src);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Return the configured retry budget.");
    }

    #[test]
    fn test_rust_doc_and_plain_comments_are_separate_runs() {
        let src = "//! Session cache with lazy refresh.\n\n/// Look up a session by token id.\n// plain implementation remark here\nfn get() {}\n";
        let docs = extract_code_docs("src/cache.rs", src);
        let kinds: Vec<DocType> = docs.iter().map(|d| d.doc_type).collect();
        assert_eq!(
            kinds,
            vec![DocType::Docstring, DocType::Docstring, DocType::Comment]
        );
        assert_eq!(docs[1].content, "Look up a session by token id.");
    }

    #[test]
    fn test_jsdoc_block() {
        let src = "/**\n * Debounce a handler so bursts collapse.\n * @param fn handler\n */\nexport function debounce(fn) {}\n";
        let docs = extract_code_docs("util.ts", src);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_type, DocType::Docstring);
        assert_eq!(
            docs[0].content,
            "Debounce a handler so bursts collapse.\n@param fn handler"
        );
    }

    #[test]
    fn test_short_blocks_dropped() {
        let docs = extract_code_docs("a.py", "# noqa\nx = 1\n");
        assert!(docs.is_empty());
    }

    #[test]
    fn test_unknown_extension_yields_nothing() {
        assert!(extract_code_docs("data.csv", "# a long comment line here\n").is_empty());
    }

    #[test]
    fn test_unterminated_block_runs_to_end() {
        let docs = extract_code_docs("a.py", "\"\"\"Never closed docstring\nstill going");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Never closed docstring\nstill going");
    }

    #[test]
    fn test_prose_doc_type() {
        assert_eq!(prose_doc_type("README.md"), DocType::Readme);
        assert_eq!(prose_doc_type("docs/guide.md"), DocType::Readme);
        assert_eq!(prose_doc_type("README"), DocType::Readme);
        assert_eq!(prose_doc_type("notes/todo.txt"), DocType::Other);
    }
}
