//! Paragraph-boundary chunker for prose documentation.
//!
//! README and text files are split on blank lines (`\n\n`) and paragraphs
//! are packed into pieces of at most `max_chars` characters. A paragraph
//! longer than the limit is hard-split at the last newline or space
//! before the limit.

/// Split `text` into paragraph-packed pieces. Blank input yields no pieces.
pub fn paragraph_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let normalized = text.replace("\r\n", "\n");
    let mut pieces = Vec::new();
    let mut current = String::new();

    for para in normalized.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current.is_empty() {
            trimmed.len()
        } else {
            current.len() + 2 + trimmed.len()
        };
        if would_be > max_chars && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut pieces);
            continue;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(trimmed);
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn hard_split(text: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max_chars {
            out.push(remaining.trim().to_string());
            break;
        }
        let mut limit = max_chars;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        let split_at = remaining[..limit]
            .rfind('\n')
            .or_else(|| remaining[..limit].rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(limit.max(next_boundary(remaining)));
        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}

/// Byte length of the first character, so a split always makes progress.
fn next_boundary(s: &str) -> usize {
    s.chars().next().map(char::len_utf8).unwrap_or(1)
}
