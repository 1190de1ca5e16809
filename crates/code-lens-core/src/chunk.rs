//! Line-window chunker for source files.
//!
//! Splits source text into [`LineSpan`]s of at most `max_lines` lines.
//! Line numbers are 1-based and inclusive, so a span maps directly onto
//! a [`CodeChunk`](crate::models::CodeChunk) identity.
//!
//! # Algorithm
//!
//! 1. Split the text into lines (`\n`, with a trailing `\r` stripped).
//! 2. Take windows of `max_lines` lines, advancing by
//!    `max_lines - overlap` lines each step.
//! 3. Skip windows that contain only whitespace.
//! 4. The last window ends at the last line; no window runs past it.
//!
//! # Example
//!
//! ```rust
//! use code_lens_core::chunk::chunk_lines;
//!
//! let spans = chunk_lines("a = 1\nb = 2\nc = 3", 2, 0).unwrap();
//! assert_eq!(spans.len(), 2);
//! assert_eq!((spans[0].line_start, spans[0].line_end), (1, 2));
//! assert_eq!((spans[1].line_start, spans[1].line_end), (3, 3));
//! ```

use crate::error::{RagError, Result};

/// A contiguous range of lines taken from a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpan {
    pub line_start: u32,
    pub line_end: u32,
    pub content: String,
}

/// Split `text` into line windows.
///
/// # Errors
///
/// Returns [`RagError::InvalidInput`] if `max_lines` is zero or
/// `overlap >= max_lines` (the window would never advance).
pub fn chunk_lines(text: &str, max_lines: usize, overlap: usize) -> Result<Vec<LineSpan>> {
    if max_lines == 0 {
        return Err(RagError::invalid("max_lines must be > 0"));
    }
    if overlap >= max_lines {
        return Err(RagError::invalid(format!(
            "overlap ({}) must be smaller than max_lines ({})",
            overlap, max_lines
        )));
    }

    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    // A trailing newline does not start another line.
    let line_count = match lines.last() {
        Some(last) if last.is_empty() => lines.len() - 1,
        _ => lines.len(),
    };

    let step = max_lines - overlap;
    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < line_count {
        let end = (start + max_lines).min(line_count);
        let window = &lines[start..end];
        if window.iter().any(|l| !l.trim().is_empty()) {
            spans.push(LineSpan {
                line_start: (start + 1) as u32,
                line_end: end as u32,
                content: window.join("\n"),
            });
        }
        if end == line_count {
            break;
        }
        start += step;
    }

    Ok(spans)
}
