//! Citation formatting helpers

use uuid::Uuid;

use crate::providers::vector_store::VectorSearchResult;
use crate::types::response::Citation;

/// Length of the document id prefix shown in citations
pub const SHORT_ID_LEN: usize = 8;

/// First 8 characters of a document id
pub fn short_document_id(id: &Uuid) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

/// Leading `max_chars` characters of `content`, with `...` appended when cut
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let mut chars = content.char_indices();
    match chars.nth(max_chars) {
        Some((byte_pos, _)) => format!("{}...", &content[..byte_pos]),
        None => content.to_string(),
    }
}

/// Number citations 1..=n in the order given
pub fn build_citations(results: &[VectorSearchResult], excerpt_chars: usize) -> Vec<Citation> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| Citation::from_chunk(i + 1, &r.chunk, r.similarity, excerpt_chars))
        .collect()
}
