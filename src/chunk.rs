//! Recursive separator-based text chunker.
//!
//! Splits document text by trying separators in priority order
//! (paragraph, line, sentence, space) and falling back to a raw
//! character split for text with no usable boundary. Adjacent pieces
//! are merged back up, and every chunk after the first is prefixed
//! with the trailing `chunk_overlap` characters of its predecessor so
//! local context survives chunk boundaries. Room for that prefix is
//! reserved while merging, so no chunk — overlap included — ever
//! exceeds `chunk_size` characters.
//!
//! Identical input and configuration always yield an identical chunk
//! sequence, in document order.

/// Separators in decreasing priority. Exhausting the list falls back to
/// a raw character split.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split `text` into overlapping chunks of at most `chunk_size`
/// characters each.
///
/// Chunks after the first carry up to `chunk_overlap` characters
/// repeated from the end of their predecessor; the repeated prefix
/// counts against the size limit. Callers must guarantee
/// `chunk_overlap < chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    // Reserve room for the prepended overlap so the finished chunks
    // stay within chunk_size.
    let budget = chunk_size.saturating_sub(chunk_overlap).max(1);
    let pieces = split_recursive(trimmed, budget, &SEPARATORS);
    let merged = merge_pieces(&pieces, budget);

    if chunk_overlap == 0 || merged.len() < 2 {
        return merged;
    }

    let mut out = Vec::with_capacity(merged.len());
    for (i, chunk) in merged.iter().enumerate() {
        if i == 0 {
            out.push(chunk.clone());
        } else {
            let tail = char_tail(&merged[i - 1], chunk_overlap);
            let mut with_overlap = String::with_capacity(tail.len() + chunk.len());
            with_overlap.push_str(tail);
            with_overlap.push_str(chunk);
            out.push(with_overlap);
        }
    }
    out
}

/// Split on the first separator that occurs in `text`; any piece still
/// over `chunk_size` is re-split with the remaining separators.
fn split_recursive(text: &str, chunk_size: usize, separators: &[&str]) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((sep, rest)) = separators.split_first() else {
        return hard_split(text, chunk_size);
    };

    let parts: Vec<&str> = text.split_inclusive(*sep).collect();
    if parts.len() == 1 {
        // Separator absent; try the next one.
        return split_recursive(text, chunk_size, rest);
    }

    let mut out = Vec::new();
    for part in parts {
        if char_len(part) <= chunk_size {
            out.push(part.to_string());
        } else {
            out.extend(split_recursive(part, chunk_size, rest));
        }
    }
    out
}

/// Greedily concatenate adjacent pieces without exceeding `chunk_size`
/// characters per chunk. Whitespace-only chunks are dropped.
fn merge_pieces(pieces: &[String], chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for piece in pieces {
        let piece_len = char_len(piece);
        if buf_len > 0 && buf_len + piece_len > chunk_size {
            flush(&mut chunks, &mut buf);
            buf_len = 0;
        }
        buf.push_str(piece);
        buf_len += piece_len;
    }
    flush(&mut chunks, &mut buf);

    chunks
}

fn flush(chunks: &mut Vec<String>, buf: &mut String) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    buf.clear();
}

/// Last-resort split at raw character boundaries.
fn hard_split(text: &str, chunk_size: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut len = 0usize;
    for ch in text.chars() {
        if len == chunk_size {
            out.push(std::mem::take(&mut current));
            len = 0;
        }
        current.push(ch);
        len += 1;
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The trailing `n` characters of `s` (all of `s` when shorter).
fn char_tail(s: &str, n: usize) -> &str {
    let count = char_len(s);
    if count <= n {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hello, world!", 100, 20);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(split_text("", 100, 20).is_empty());
        assert!(split_text("   \n\n  ", 100, 20).is_empty());
    }

    #[test]
    fn test_paragraphs_merged_under_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = split_text(text, 200, 0);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("First paragraph."));
        assert!(chunks[0].contains("Third paragraph."));
    }

    #[test]
    fn test_paragraph_boundary_preferred() {
        let text = "Alpha paragraph one.\n\nBeta paragraph two.";
        let chunks = split_text(text, 25, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "Alpha paragraph one.");
        assert_eq!(chunks[1], "Beta paragraph two.");
    }

    #[test]
    fn test_chunks_respect_size_bound() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} here. ", i))
            .collect::<String>();
        let size = 120;
        let overlap = 30;
        let chunks = split_text(&text, size, overlap);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // The prepended overlap counts against the limit.
            assert!(
                chunk.chars().count() <= size,
                "chunk too long: {} chars",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} here. ", i))
            .collect::<String>();
        let overlap = 30;
        let chunks = split_text(&text, 120, overlap);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail = char_tail(&pair[0], overlap);
            assert!(
                pair[1].starts_with(tail),
                "chunk does not start with predecessor tail: {:?} vs {:?}",
                tail,
                &pair[1]
            );
        }
    }

    #[test]
    fn test_production_sized_chunks_stay_within_limit() {
        let text = (0..200)
            .map(|i| format!("Paragraph {} talks about refund policies at length.\n\n", i))
            .collect::<String>();
        let chunks = split_text(&text, 1000, 200);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000);
        }
    }

    #[test]
    fn test_no_separator_falls_back_to_char_split() {
        let text = "a".repeat(350);
        let chunks = split_text(&text, 100, 0);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().take(3).all(|c| c.chars().count() == 100));
        assert_eq!(chunks[3].chars().count(), 50);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha one.\n\nBeta two.\n\nGamma three. Delta four. Epsilon five.";
        let a = split_text(text, 30, 10);
        let b = split_text(text, 30, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multibyte_boundaries_are_safe() {
        let text = "héllo wörld ünïcode ".repeat(20);
        let chunks = split_text(&text, 50, 10);
        assert!(!chunks.is_empty());
        // Reaching here without a panic means no char boundary was split.
        for chunk in &chunks {
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_char_tail() {
        assert_eq!(char_tail("abcdef", 3), "def");
        assert_eq!(char_tail("ab", 5), "ab");
        assert_eq!(char_tail("héllo", 2), "lo");
    }
}
