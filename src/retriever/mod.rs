// Retriever module
// Issues top-K similarity queries and formats deduplicated source citations


use itertools::Itertools;
use tracing::debug;

use crate::Result;
use crate::embeddings::Embedder;
use crate::index::{SearchResult, VectorStore};

pub const DEFAULT_TOP_K: usize = 25;

/// Chunks retrieved for one question, plus the formatted citation block
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub chunks: Vec<SearchResult>,
    /// One line per unique (author, book) pair; empty when nothing matched
    pub citations: String,
}

/// Wraps the vector store with a fixed top-K query contract
pub struct Retriever {
    store: VectorStore,
    embedder: Box<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    #[inline]
    pub fn new(store: VectorStore, embedder: Box<dyn Embedder>, top_k: usize) -> Self {
        Self {
            store,
            embedder,
            top_k,
        }
    }

    /// Embed the question and return the top-K most similar chunks together
    /// with their citation block.
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval> {
        let query_vector = self.embedder.embed(question)?;
        let chunks = self.store.query(&query_vector, self.top_k).await?;

        debug!("Retrieved {} chunks for question", chunks.len());

        let citations = format_citations(&chunks);
        Ok(Retrieval { chunks, citations })
    }
}

/// Format one citation line per unique (author, book) pair among the
/// retrieved chunks, sorted for stable output. Returns the empty string when
/// nothing was retrieved.
#[inline]
pub fn format_citations(chunks: &[SearchResult]) -> String {
    chunks
        .iter()
        .map(|result| (result.metadata.author.as_str(), result.metadata.book.as_str()))
        .unique()
        .sorted()
        .map(|(author, book)| format!("- {author} in \"{book}\""))
        .join("\n")
}
