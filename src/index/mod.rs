// Embedding index module
// Persists (chunk, vector) records in LanceDB and answers similarity queries


pub mod vector_store;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AssistantError, Result};

pub use vector_store::{IndexStats, SearchResult, VectorStore};

const MANIFEST_FILE: &str = "manifest.toml";

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding
    pub id: String,
    /// The vector embedding; dimensionality is fixed per collection
    pub vector: Vec<f32>,
    /// Metadata about the chunk this embedding represents
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Author of the source book
    pub author: String,
    /// Title of the source book
    pub book: String,
    /// Path of the source PDF file
    pub source_path: String,
    /// The actual text content of the chunk
    pub content: String,
    /// Index of this chunk within the corpus (for ordering)
    pub chunk_index: u32,
    /// Timestamp when this embedding was created
    pub created_at: String,
}

/// Persisted description of a collection. Its presence is the signal that an
/// index exists at a location; the recorded model id guards against querying
/// with vectors from a different embedding space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: u64,
    pub created_at: String,
}

impl CollectionManifest {
    #[inline]
    pub fn load(index_dir: &Path) -> Result<Option<Self>> {
        let path = index_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let manifest = toml::from_str(&content).map_err(|e| {
            AssistantError::Database(format!(
                "failed to parse collection manifest {}: {e}",
                path.display()
            ))
        })?;

        Ok(Some(manifest))
    }

    #[inline]
    pub fn save(&self, index_dir: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            AssistantError::Database(format!("failed to serialize collection manifest: {e}"))
        })?;
        fs::write(index_dir.join(MANIFEST_FILE), content)?;
        Ok(())
    }

    #[inline]
    pub fn delete(index_dir: &Path) -> Result<()> {
        let path = index_dir.join(MANIFEST_FILE);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
