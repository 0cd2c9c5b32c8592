#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChunkMetadata, CollectionManifest, EmbeddingRecord};
use crate::chunking::Chunk;
use crate::embeddings::Embedder;
use crate::{AssistantError, Result};

const TABLE_NAME: &str = "chunks";
const REBUILD_LOCK_FILE: &str = ".rebuild.lock";

/// Vector collection backed by LanceDB for similarity search.
///
/// A collection is bound to the embedding model that produced its vectors;
/// the model id is recorded in the manifest at build time and re-checked at
/// load time. Queries may run concurrently; `build` and `delete_collection`
/// take a filesystem lock for the duration of the rewrite.
pub struct VectorStore {
    connection: Connection,
    dimension: usize,
    embedding_model: String,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub metadata: ChunkMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

/// Collection statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub chunk_count: u64,
    pub dimension: usize,
}

/// Exclusive-rebuild lock: a lock file created for the duration of a
/// collection rewrite and removed on drop.
struct RebuildGuard {
    path: PathBuf,
}

impl RebuildGuard {
    fn acquire(index_dir: &Path) -> Result<Self> {
        fs::create_dir_all(index_dir)?;
        let path = index_dir.join(REBUILD_LOCK_FILE);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(AssistantError::Database(format!(
                    "another rebuild is in progress at {} (delete {} if it is stale)",
                    index_dir.display(),
                    path.display()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RebuildGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl VectorStore {
    /// Embed every chunk and write a fresh collection at `index_dir`,
    /// replacing any existing one.
    ///
    /// All chunks are embedded before stored state is touched: an embedding
    /// failure aborts the build and leaves a previously persisted collection
    /// intact.
    #[inline]
    pub async fn build(
        index_dir: &Path,
        embedder: &dyn Embedder,
        chunks: &[Chunk],
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(AssistantError::IndexBuild(
                "cannot build an index from zero chunks".to_string(),
            ));
        }

        let _guard = RebuildGuard::acquire(index_dir)?;

        info!(
            "Building collection at {} from {} chunks with model {}",
            index_dir.display(),
            chunks.len(),
            embedder.model_id()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).map_err(|e| {
            AssistantError::IndexBuild(format!("embedding failed during build: {e}"))
        })?;

        let dimension = vectors.first().map(Vec::len).unwrap_or_default();
        if dimension == 0 {
            return Err(AssistantError::IndexBuild(
                "embedding function returned a zero-dimensional vector".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(AssistantError::IndexBuild(format!(
                "inconsistent embedding dimensions: expected {dimension}, got {}",
                bad.len()
            )));
        }

        let created_at = Utc::now().to_rfc3339();
        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| EmbeddingRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                metadata: ChunkMetadata {
                    author: chunk.metadata.author.clone(),
                    book: chunk.metadata.book.clone(),
                    source_path: chunk.metadata.source_path.display().to_string(),
                    content: chunk.text.clone(),
                    chunk_index: i as u32,
                    created_at: created_at.clone(),
                },
            })
            .collect();

        // Embedding succeeded for the whole corpus; now swap the stored
        // collection.
        let connection = connect(index_dir).await?;
        drop_table_if_exists(&connection).await?;

        let schema = create_schema(dimension);
        connection
            .create_empty_table(TABLE_NAME, schema)
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("failed to create table: {e}")))?;

        let store = Self {
            connection,
            dimension,
            embedding_model: embedder.model_id().to_string(),
        };

        store.insert_records(&records).await?;

        CollectionManifest {
            embedding_model: store.embedding_model.clone(),
            dimension,
            chunk_count: records.len() as u64,
            created_at,
        }
        .save(index_dir)?;

        info!("Collection built with {} records", records.len());
        Ok(store)
    }

    /// Open an existing collection, or return `None` when no collection has
    /// been persisted at `index_dir`.
    ///
    /// Fails when the collection was built with a different embedding model
    /// than the one configured now: similarity scores across embedding
    /// spaces are meaningless.
    #[inline]
    pub async fn load(index_dir: &Path, embedder: &dyn Embedder) -> Result<Option<Self>> {
        let Some(manifest) = CollectionManifest::load(index_dir)? else {
            debug!("No collection manifest at {}", index_dir.display());
            return Ok(None);
        };

        if manifest.embedding_model != embedder.model_id() {
            return Err(AssistantError::Config(format!(
                "collection at {} was built with embedding model '{}' but '{}' is configured; \
                 re-run ingest or restore the original model",
                index_dir.display(),
                manifest.embedding_model,
                embedder.model_id()
            )));
        }

        let connection = connect(index_dir).await?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("failed to list tables: {e}")))?;
        if !table_names.contains(&TABLE_NAME.to_string()) {
            return Err(AssistantError::Database(format!(
                "collection manifest exists at {} but the table is missing; \
                 delete the index and re-run ingest",
                index_dir.display()
            )));
        }

        debug!(
            "Opened collection at {} ({} chunks, dimension {})",
            index_dir.display(),
            manifest.chunk_count,
            manifest.dimension
        );

        Ok(Some(Self {
            connection,
            dimension: manifest.dimension,
            embedding_model: manifest.embedding_model,
        }))
    }

    /// Destroy the collection at `index_dir`; idempotent.
    #[inline]
    pub async fn delete_collection(index_dir: &Path) -> Result<()> {
        if !index_dir.exists() {
            debug!("No collection at {}, nothing to delete", index_dir.display());
            return Ok(());
        }

        let _guard = RebuildGuard::acquire(index_dir)?;

        let connection = connect(index_dir).await?;
        drop_table_if_exists(&connection).await?;
        CollectionManifest::delete(index_dir)?;

        info!("Deleted collection at {}", index_dir.display());
        Ok(())
    }

    /// Model id recorded for this collection
    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Search for the `k` nearest records by vector similarity. An empty
    /// collection yields an empty result, not an error.
    #[inline]
    pub async fn query(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query_vector.len() != self.dimension {
            return Err(AssistantError::Database(format!(
                "query vector has dimension {} but the collection holds {}-dimensional vectors",
                query_vector.len(),
                self.dimension
            )));
        }

        debug!("Searching for similar vectors with limit: {}", k);

        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };

        let results = table
            .vector_search(query_vector)
            .map_err(|e| AssistantError::Database(format!("failed to create vector search: {e}")))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("failed to execute search: {e}")))?;

        let mut search_results = Vec::new();
        let mut stream = results;
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| AssistantError::Database(format!("failed to read result stream: {e}")))?
        {
            search_results.extend(parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results", search_results.len());
        Ok(search_results)
    }

    /// Collection statistics; `EmptyIndex` when the collection holds zero
    /// records (dimensionality is undefined then).
    #[inline]
    pub async fn stats(&self) -> Result<IndexStats> {
        let Some(table) = self.open_table().await? else {
            return Err(AssistantError::EmptyIndex);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| AssistantError::Database(format!("failed to count rows: {e}")))?;

        if count == 0 {
            return Err(AssistantError::EmptyIndex);
        }

        Ok(IndexStats {
            chunk_count: count as u64,
            dimension: self.dimension,
        })
    }

    /// Open the collection table; `None` when the table has been dropped
    /// out from under the handle (the collection is then empty).
    async fn open_table(&self) -> Result<Option<lancedb::Table>> {
        match self.connection.open_table(TABLE_NAME).execute().await {
            Ok(table) => Ok(Some(table)),
            Err(lancedb::Error::TableNotFound { .. }) => Ok(None),
            Err(e) => Err(AssistantError::Database(format!("failed to open table: {e}"))),
        }
    }

    async fn insert_records(&self, records: &[EmbeddingRecord]) -> Result<()> {
        debug!("Storing batch of {} embeddings", records.len());

        let record_batch = create_record_batch(records, self.dimension)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let table = self.open_table().await?.ok_or_else(|| {
            AssistantError::Database("collection table vanished during build".to_string())
        })?;
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("failed to insert embeddings: {e}")))?;

        Ok(())
    }
}

async fn connect(index_dir: &Path) -> Result<Connection> {
    let uri = format!("file://{}", index_dir.display());
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| AssistantError::Database(format!("failed to connect to LanceDB: {e}")))
}

async fn drop_table_if_exists(connection: &Connection) -> Result<()> {
    let table_names = connection
        .table_names()
        .execute()
        .await
        .map_err(|e| AssistantError::Database(format!("failed to list tables: {e}")))?;

    if table_names.contains(&TABLE_NAME.to_string()) {
        info!("Dropping existing collection table");
        connection
            .drop_table(TABLE_NAME)
            .await
            .map_err(|e| AssistantError::Database(format!("failed to drop table: {e}")))?;
    }

    Ok(())
}

fn create_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("author", DataType::Utf8, false),
        Field::new("book", DataType::Utf8, false),
        Field::new("source_path", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(records: &[EmbeddingRecord], dimension: usize) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut authors = Vec::with_capacity(len);
    let mut books = Vec::with_capacity(len);
    let mut source_paths = Vec::with_capacity(len);
    let mut contents = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * dimension);

    for record in records {
        ids.push(record.id.as_str());
        authors.push(record.metadata.author.as_str());
        books.push(record.metadata.book.as_str());
        source_paths.push(record.metadata.source_path.as_str());
        contents.push(record.metadata.content.as_str());
        chunk_indices.push(record.metadata.chunk_index);
        created_ats.push(record.metadata.created_at.as_str());
        flat_values.extend_from_slice(&record.vector);
    }

    let values_array = Float32Array::from(flat_values);
    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(item_field, dimension as i32, Arc::new(values_array), None)
            .map_err(|e| AssistantError::Database(format!("failed to create vector array: {e}")))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(authors)),
        Arc::new(StringArray::from(books)),
        Arc::new(StringArray::from(source_paths)),
        Arc::new(StringArray::from(contents)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(create_schema(dimension), arrays)
        .map_err(|e| AssistantError::Database(format!("failed to create record batch: {e}")))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let authors = string_column(batch, "author")?;
    let books = string_column(batch, "book")?;
    let source_paths = string_column(batch, "source_path")?;
    let contents = string_column(batch, "content")?;
    let created_ats = string_column(batch, "created_at")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| AssistantError::Database("missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| AssistantError::Database("invalid chunk_index column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .map(|col| col.as_any().downcast_ref::<Float32Array>());
    if distances.is_none() && batch.num_rows() > 0 {
        warn!("Search result batch is missing the _distance column");
    }

    let mut search_results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let metadata = ChunkMetadata {
            author: authors.value(row).to_string(),
            book: books.value(row).to_string(),
            source_path: source_paths.value(row).to_string(),
            content: contents.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            created_at: created_ats.value(row).to_string(),
        };

        let distance = distances
            .flatten()
            .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        // Convert distance to similarity score (higher is better)
        search_results.push(SearchResult {
            metadata,
            similarity_score: 1.0 - distance,
            distance,
        });
    }

    Ok(search_results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AssistantError::Database(format!("missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AssistantError::Database(format!("invalid {name} column type")))
}
