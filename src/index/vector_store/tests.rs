use super::*;
use crate::corpus::DocumentMetadata;
use std::path::PathBuf;
use tempfile::TempDir;

/// Deterministic embedder for tests: the vector is a pure function of the
/// text, so identical text always lands on the same point.
struct StubEmbedder {
    model: String,
    dimension: usize,
}

impl StubEmbedder {
    fn new(dimension: usize) -> Self {
        Self {
            model: "stub-embedder".to_string(),
            dimension,
        }
    }
}

impl Embedder for StubEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut hash = 0u64;
        for byte in text.bytes() {
            hash = hash.wrapping_mul(31).wrapping_add(u64::from(byte));
        }
        Ok((0..self.dimension)
            .map(|i| {
                let lane = hash.rotate_left(i as u32 * 7) & 0xFFFF;
                lane as f32 / 65536.0
            })
            .collect())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Embedder that always fails, for exercising build failure paths
struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing-embedder"
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AssistantError::Embedding("simulated outage".to_string()))
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AssistantError::Embedding("simulated outage".to_string()))
    }
}

fn test_chunk(author: &str, book: &str, text: &str) -> Chunk {
    Chunk {
        text: text.to_string(),
        metadata: DocumentMetadata {
            author: author.to_string(),
            book: book.to_string(),
            source_path: PathBuf::from(format!("/library/{author}/{book}.pdf")),
        },
    }
}

fn test_chunks() -> Vec<Chunk> {
    vec![
        test_chunk("Jane Smith", "Grip Strength Mastery", "Dead hangs build grip endurance."),
        test_chunk("Jane Smith", "Grip Strength Mastery", "Farmer's carries target the forearms."),
        test_chunk("John Doe", "Calisthenics Fundamentals", "Pull-ups train the upper back."),
    ]
}

#[tokio::test]
async fn build_and_query_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);
    let chunks = test_chunks();

    let store = VectorStore::build(temp_dir.path(), &embedder, &chunks)
        .await
        .expect("build should succeed");

    // Querying with a chunk's own vector must return that chunk with the
    // maximal similarity in the collection.
    let query_vector = embedder.embed(&chunks[0].text).expect("embed should succeed");
    let results = store
        .query(&query_vector, 3)
        .await
        .expect("query should succeed");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].metadata.content, chunks[0].text);
    assert_eq!(results[0].metadata.author, "Jane Smith");
    for other in &results[1..] {
        assert!(results[0].similarity_score >= other.similarity_score);
    }
}

#[tokio::test]
async fn load_reopens_a_persisted_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);
    let chunks = test_chunks();

    {
        VectorStore::build(temp_dir.path(), &embedder, &chunks)
            .await
            .expect("build should succeed");
    }

    let store = VectorStore::load(temp_dir.path(), &embedder)
        .await
        .expect("load should succeed")
        .expect("collection should exist");

    let query_vector = embedder.embed(&chunks[2].text).expect("embed should succeed");
    let results = store
        .query(&query_vector, 1)
        .await
        .expect("query should succeed");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.book, "Calisthenics Fundamentals");
}

#[tokio::test]
async fn load_returns_none_without_a_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);

    let store = VectorStore::load(temp_dir.path(), &embedder)
        .await
        .expect("load should succeed");

    assert!(store.is_none());
}

#[tokio::test]
async fn load_rejects_a_different_embedding_model() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);

    VectorStore::build(temp_dir.path(), &embedder, &test_chunks())
        .await
        .expect("build should succeed");

    let other = StubEmbedder {
        model: "a-different-model".to_string(),
        dimension: 8,
    };
    let result = VectorStore::load(temp_dir.path(), &other).await;

    assert!(matches!(result, Err(AssistantError::Config(_))));
}

#[tokio::test]
async fn rebuild_fully_replaces_the_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);

    VectorStore::build(temp_dir.path(), &embedder, &test_chunks())
        .await
        .expect("first build should succeed");

    let replacement = vec![test_chunk("New Author", "New Book", "replacement content")];
    let store = VectorStore::build(temp_dir.path(), &embedder, &replacement)
        .await
        .expect("second build should succeed");

    let stats = store.stats().await.expect("stats should succeed");
    assert_eq!(stats.chunk_count, 1);
    assert_eq!(stats.dimension, 8);
}

#[tokio::test]
async fn failed_build_preserves_the_previous_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);
    let chunks = test_chunks();

    VectorStore::build(temp_dir.path(), &embedder, &chunks)
        .await
        .expect("first build should succeed");

    let result = VectorStore::build(temp_dir.path(), &FailingEmbedder, &chunks).await;
    assert!(matches!(result, Err(AssistantError::IndexBuild(_))));

    // The original collection is untouched by the failed rebuild.
    let store = VectorStore::load(temp_dir.path(), &embedder)
        .await
        .expect("load should succeed")
        .expect("collection should still exist");
    let stats = store.stats().await.expect("stats should succeed");
    assert_eq!(stats.chunk_count, chunks.len() as u64);
}

#[tokio::test]
async fn build_from_zero_chunks_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let result = VectorStore::build(temp_dir.path(), &StubEmbedder::new(8), &[]).await;
    assert!(matches!(result, Err(AssistantError::IndexBuild(_))));
}

#[tokio::test]
async fn query_on_a_deleted_collection_is_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);

    let store = VectorStore::build(temp_dir.path(), &embedder, &test_chunks())
        .await
        .expect("build should succeed");

    VectorStore::delete_collection(temp_dir.path())
        .await
        .expect("delete should succeed");

    let query_vector = embedder.embed("anything").expect("embed should succeed");
    let results = store
        .query(&query_vector, 5)
        .await
        .expect("query should not error on an empty collection");
    assert!(results.is_empty());

    let stats = store.stats().await;
    assert!(matches!(stats, Err(AssistantError::EmptyIndex)));
}

#[tokio::test]
async fn delete_collection_is_idempotent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);

    VectorStore::build(temp_dir.path(), &embedder, &test_chunks())
        .await
        .expect("build should succeed");

    VectorStore::delete_collection(temp_dir.path())
        .await
        .expect("first delete should succeed");
    VectorStore::delete_collection(temp_dir.path())
        .await
        .expect("second delete should succeed");

    let store = VectorStore::load(temp_dir.path(), &embedder)
        .await
        .expect("load should succeed");
    assert!(store.is_none());
}

#[tokio::test]
async fn query_rejects_wrong_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);

    let store = VectorStore::build(temp_dir.path(), &embedder, &test_chunks())
        .await
        .expect("build should succeed");

    let result = store.query(&[0.0; 4], 3).await;
    assert!(matches!(result, Err(AssistantError::Database(_))));
}

#[tokio::test]
async fn held_rebuild_lock_blocks_a_second_writer() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = StubEmbedder::new(8);

    let _guard = RebuildGuard::acquire(temp_dir.path()).expect("should acquire lock");

    let result = VectorStore::build(temp_dir.path(), &embedder, &test_chunks()).await;
    assert!(matches!(result, Err(AssistantError::Database(_))));
}
