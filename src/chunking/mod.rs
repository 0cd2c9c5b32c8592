// Chunking module
// Splits documents into overlapping fixed-size character windows


use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::{Document, DocumentMetadata};

/// Configuration for document chunking, measured in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters (must be < `chunk_size`)
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A bounded window of a document's text, carrying the parent's provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Split every document into overlapping windows of at most
/// `config.chunk_size` characters, the window start advancing by
/// `chunk_size - chunk_overlap` each step. The final window of a document
/// may be shorter; a document no longer than `chunk_size` yields exactly
/// one chunk equal to the whole text.
#[inline]
pub fn split_documents(documents: &[Document], config: &ChunkerConfig) -> Vec<Chunk> {
    debug_assert!(config.chunk_overlap < config.chunk_size);

    let mut chunks = Vec::new();
    for document in documents {
        split_document(document, config, &mut chunks);
    }

    debug!(
        "Split {} documents into {} chunks",
        documents.len(),
        chunks.len()
    );

    chunks
}

fn split_document(document: &Document, config: &ChunkerConfig, out: &mut Vec<Chunk>) {
    // Window positions are measured in characters; byte offsets of each
    // character boundary let us slice without re-walking the string.
    let boundaries: Vec<usize> = document
        .text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(document.text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let step = config.chunk_size.saturating_sub(config.chunk_overlap).max(1);
    let mut start = 0usize;

    loop {
        let end = usize::min(start + config.chunk_size, char_len);
        out.push(Chunk {
            text: document.text[boundaries[start]..boundaries[end]].to_string(),
            metadata: document.metadata.clone(),
        });

        if end == char_len {
            break;
        }
        start += step;
    }
}
