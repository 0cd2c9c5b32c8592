use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, EmbeddingProvider};
use crate::embeddings::OllamaEmbeddings;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 BookMind Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Corpus").bold().yellow());
    configure_corpus(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Embeddings").bold().yellow());
    configure_embedding(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Chat Model").bold().yellow());
    configure_chat(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    configure_retrieval(&mut config)?;

    if config.embedding.provider == EmbeddingProvider::Ollama {
        eprintln!();
        eprintln!("{}", style("Testing Ollama connection...").yellow());
        if test_ollama_connection(&config) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!("{}", style("⚠ Warning: Could not connect to Ollama").yellow());
            eprintln!("You can continue, but make sure Ollama is running before ingesting.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Corpus:").bold().yellow());
    eprintln!("  Root: {}", style(config.corpus.root.display()).cyan());

    eprintln!();
    eprintln!("{}", style("Index:").bold().yellow());
    eprintln!("  Path: {}", style(config.index_path().display()).cyan());
    eprintln!("  Top K: {}", style(config.index.top_k).cyan());
    eprintln!(
        "  Chunk Size / Overlap: {} / {}",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Embeddings:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    match config.embedding.provider {
        EmbeddingProvider::Openai => {
            eprintln!("  API Base: {}", style(&config.embedding.api_base).cyan());
        }
        EmbeddingProvider::Ollama => match config.embedding.ollama_url() {
            Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
            Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
        },
    }

    eprintln!();
    eprintln!("{}", style("Chat:").bold().yellow());
    eprintln!("  Model: {}", style(&config.chat.model).cyan());
    eprintln!("  Max Tokens: {}", style(config.chat.max_tokens).cyan());
    eprintln!("  Temperature: {}", style(config.chat.temperature).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if config_dir.join("config.toml").exists() {
        eprintln!("{}", style("Found existing configuration.").green());
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
    }
    Config::load(config_dir)
}

fn configure_corpus(config: &mut Config) -> Result<()> {
    let root: String = Input::new()
        .with_prompt("Corpus root directory (author folders with PDFs inside)")
        .default(config.corpus.root.display().to_string())
        .interact_text()?;
    config.corpus.root = PathBuf::from(root);
    Ok(())
}

fn configure_embedding(config: &mut Config) -> Result<()> {
    let providers = &["openai", "ollama"];
    let default_index = match config.embedding.provider {
        EmbeddingProvider::Openai => 0,
        EmbeddingProvider::Ollama => 1,
    };

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(providers)
        .interact()?;

    config.embedding.provider = if provider_index == 0 {
        EmbeddingProvider::Openai
    } else {
        EmbeddingProvider::Ollama
    };

    // Changing providers almost always means a different model family too;
    // Ollama model ids carry a ":tag" suffix, hosted ids do not.
    let model_default = match config.embedding.provider {
        EmbeddingProvider::Openai if config.embedding.model.contains(':') => {
            "text-embedding-3-small".to_string()
        }
        EmbeddingProvider::Ollama if !config.embedding.model.contains(':') => {
            "nomic-embed-text:latest".to_string()
        }
        _ => config.embedding.model.clone(),
    };

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(model_default)
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    config.embedding.model = model;

    match config.embedding.provider {
        EmbeddingProvider::Openai => {
            let api_base: String = Input::new()
                .with_prompt("OpenAI API base URL")
                .default(config.embedding.api_base.clone())
                .interact_text()?;
            config.embedding.api_base = api_base;
        }
        EmbeddingProvider::Ollama => {
            let host: String = Input::new()
                .with_prompt("Ollama host")
                .default(config.embedding.host.clone())
                .interact_text()?;
            config.embedding.host = host;

            let port: u16 = Input::new()
                .with_prompt("Ollama port")
                .default(config.embedding.port)
                .validate_with(|input: &u16| -> Result<(), &str> {
                    if *input == 0 {
                        Err("Port must be greater than 0")
                    } else {
                        Ok(())
                    }
                })
                .interact_text()?;
            config.embedding.port = port;

            let batch_size: u32 = Input::new()
                .with_prompt("Batch size for embedding generation")
                .default(config.embedding.batch_size)
                .validate_with(|input: &u32| -> Result<(), &str> {
                    if *input == 0 {
                        Err("Batch size must be greater than 0")
                    } else if *input > 1000 {
                        Err("Batch size must be 1000 or less")
                    } else {
                        Ok(())
                    }
                })
                .interact_text()?;
            config.embedding.batch_size = batch_size;
        }
    }

    Ok(())
}

fn configure_chat(config: &mut Config) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(config.chat.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    config.chat.model = model;

    let temperature: f32 = Input::new()
        .with_prompt("Temperature")
        .default(config.chat.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;
    config.chat.temperature = temperature;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per question (top K)")
        .default(config.index.top_k)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            if (1..=200).contains(input) {
                Ok(())
            } else {
                Err(ConfigError::InvalidTopK(*input))
            }
        })
        .interact_text()?;
    config.index.top_k = top_k;

    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(config.chunking.chunk_size)
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(config.chunking.chunk_overlap)
        .validate_with(move |input: &usize| -> Result<(), ConfigError> {
            if *input < chunk_size {
                Ok(())
            } else {
                Err(ConfigError::ChunkOverlapTooLarge(*input, chunk_size))
            }
        })
        .interact_text()?;

    config.chunking.chunk_size = chunk_size;
    config.chunking.chunk_overlap = chunk_overlap;

    Ok(())
}

fn test_ollama_connection(config: &Config) -> bool {
    OllamaEmbeddings::new(&config.embedding)
        .and_then(|client| client.with_retry_attempts(1).ping())
        .is_ok()
}
