use super::*;
use tempfile::TempDir;

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn load_without_a_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("load should succeed");

    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.index.top_k, 25);
    assert_eq!(config.embedding.provider, EmbeddingProvider::Openai);
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.corpus.root = PathBuf::from("/books");
    config.chunking.chunk_size = 1200;
    config.chunking.chunk_overlap = 150;
    config.embedding.provider = EmbeddingProvider::Ollama;
    config.embedding.model = "nomic-embed-text:latest".to_string();
    config.chat.temperature = 0.2;

    config.save().expect("save should succeed");
    let loaded = Config::load(temp_dir.path()).expect("load should succeed");

    assert_eq!(loaded, config);
}

#[test]
fn partial_file_fills_in_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 500\n",
    )
    .expect("should write config");

    let config = Config::load(temp_dir.path()).expect("load should succeed");

    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.chat.model, "gpt-4o");
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    let mut config = Config::default();
    config.chunking.chunk_size = 100;
    config.chunking.chunk_overlap = 100;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::ChunkOverlapTooLarge(100, 100))
    ));
}

#[test]
fn top_k_bounds_are_enforced() {
    let mut config = Config::default();

    config.index.top_k = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK(0))));

    config.index.top_k = 500;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK(500))));
}

#[test]
fn embedding_validation_rejects_bad_values() {
    let mut embedding = EmbeddingConfig::default();

    embedding.protocol = "ftp".to_string();
    assert!(matches!(
        embedding.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    embedding = EmbeddingConfig {
        batch_size: 0,
        ..EmbeddingConfig::default()
    };
    assert!(matches!(
        embedding.validate(),
        Err(ConfigError::InvalidBatchSize(0))
    ));

    embedding = EmbeddingConfig {
        model: "  ".to_string(),
        ..EmbeddingConfig::default()
    };
    assert!(matches!(
        embedding.validate(),
        Err(ConfigError::InvalidModel(_))
    ));
}

#[test]
fn chat_validation_rejects_bad_values() {
    let mut chat = ChatConfig {
        temperature: 3.0,
        ..ChatConfig::default()
    };
    assert!(matches!(
        chat.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));

    chat = ChatConfig {
        max_tokens: 0,
        ..ChatConfig::default()
    };
    assert!(matches!(chat.validate(), Err(ConfigError::InvalidMaxTokens(0))));

    chat = ChatConfig {
        timeout_secs: 0,
        ..ChatConfig::default()
    };
    assert!(matches!(chat.validate(), Err(ConfigError::InvalidTimeout(0))));
}

#[test]
fn invalid_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn relative_index_path_resolves_against_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("load should succeed");

    assert_eq!(config.index_path(), temp_dir.path().join("vectors"));
}

#[test]
fn absolute_index_path_is_used_verbatim() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("load should succeed");
    config.index.path = PathBuf::from("/var/lib/bookmind/vectors");

    assert_eq!(config.index_path(), PathBuf::from("/var/lib/bookmind/vectors"));
}

#[test]
fn ollama_url_is_built_from_parts() {
    let embedding = EmbeddingConfig {
        protocol: "https".to_string(),
        host: "embeddings.local".to_string(),
        port: 443,
        ..EmbeddingConfig::default()
    };

    let url = embedding.ollama_url().expect("url should build");
    assert_eq!(url.as_str(), "https://embeddings.local/");
}
