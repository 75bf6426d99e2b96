//! Recursive text chunking with character overlap

use std::collections::VecDeque;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::types::Chunk;

/// Separators tried in order, coarsest first. `""` splits into graphemes.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Text chunker with configurable size and overlap
///
/// Splits on the coarsest separator present, recurses into pieces that are
/// still too long, then greedily merges neighbouring pieces back up to
/// `chunk_size` characters, carrying up to `overlap` characters from the end
/// of one chunk into the start of the next.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks
    overlap: usize,
    separators: Vec<String>,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split a document's text into chunks stamped with `document_id` and a
    /// sequential `chunk_index` starting at 0
    pub fn chunk_document(&self, document_id: Uuid, text: &str) -> Vec<Chunk> {
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk::new(document_id, i as u32, content))
            .collect()
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Pick the first separator that occurs; "" always matches
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_splits(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_splits(&pending));
        }

        chunks
    }

    /// Greedily join small pieces into chunks of at most `chunk_size`
    fn merge_splits(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window);

                // Keep only the tail that fits in the overlap (and leaves room for `piece`)
                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        push_trimmed(&mut chunks, &window);
        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

fn push_trimmed(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(s, _)| *s).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching each separator to the start of the piece
/// that follows it. An empty separator yields graphemes.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.graphemes(true).collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx != last {
            pieces.push(&text[last..idx]);
        }
        last = idx;
    }
    if last < text.len() {
        pieces.push(&text[last..]);
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(prefix: &str, n: usize) -> String {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunker = TextChunker::default();
        assert_eq!(chunker.split_text("  The sky is blue.  "), vec!["The sky is blue."]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        let chunker = TextChunker::default();
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split_text(" \n\n \n").is_empty());
    }

    #[test]
    fn two_long_paragraphs_split_on_blank_line() {
        let first = "a".repeat(500);
        let second = "b".repeat(500);
        let text = format!("{}\n\n{}", first, second);

        let chunks = TextChunker::new(800, 100).split_text(&text);
        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn chunks_respect_size_and_overlap() {
        let text = words("word", 400);
        let chunker = TextChunker::new(800, 100);
        let chunks = chunker.split_text(&text);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 800, "chunk too long: {}", char_len(chunk));
        }
        for pair in chunks.windows(2) {
            let next_first_word = pair[1].split(' ').next().unwrap();
            assert!(pair[0].contains(next_first_word), "no overlap between consecutive chunks");
        }
    }

    #[test]
    fn unbreakable_text_falls_back_to_graphemes() {
        let text = "x".repeat(2000);
        let chunks = TextChunker::new(800, 100).split_text(&text);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| char_len(c) <= 800));
    }

    #[test]
    fn sentences_used_before_words() {
        let body = "s".repeat(300);
        let text = format!("{b}. {b}. {b}. {b}.", b = body);
        let chunks = TextChunker::new(800, 0).split_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{b}. {b}", b = body));
    }

    #[test]
    fn chunk_document_stamps_ids_and_indices() {
        let doc_id = Uuid::new_v4();
        let text = format!("{}\n\n{}", words("alpha", 120), words("beta", 120));
        let chunks = TextChunker::default().chunk_document(doc_id, &text);

        assert!(chunks.len() >= 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.document_id, doc_id);
        }
    }

    #[test]
    fn separator_attaches_to_following_piece() {
        assert_eq!(split_keeping_separator("a. b. c", ". "), vec!["a", ". b", ". c"]);
        assert_eq!(split_keeping_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
        assert_eq!(split_keeping_separator("héllo", ""), vec!["h", "é", "l", "l", "o"]);
    }
}
