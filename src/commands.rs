use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::chat::{ChatSession, OpenAiChatClient};
use crate::chunking::split_documents;
use crate::config::{Config, EmbeddingProvider};
use crate::corpus::{CorpusStats, load_corpus};
use crate::embeddings::{OllamaEmbeddings, embedder_from_config};
use crate::index::VectorStore;
use crate::retriever::Retriever;

/// Load the corpus, chunk it, and build a fresh vector collection,
/// replacing any existing one
#[inline]
pub async fn ingest(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;

    let spinner = start_spinner("Loading corpus...");
    let documents = load_corpus(&config.corpus.root)?;
    spinner.finish_and_clear();

    let stats = CorpusStats::from_documents(&documents);
    println!("Loaded {} documents (pages)", stats.document_count);
    println!("  Authors: {}", stats.authors.iter().cloned().collect::<Vec<_>>().join(", "));
    println!("  Books: {}", stats.books.iter().cloned().collect::<Vec<_>>().join(", "));

    let chunks = split_documents(&documents, &config.chunking);
    println!(
        "Split into {} chunks ({} chars, {} overlap)",
        chunks.len(),
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );

    if config.embedding.provider == EmbeddingProvider::Ollama {
        OllamaEmbeddings::new(&config.embedding)?
            .health_check()
            .context("Ollama is not reachable; start it or switch the embedding provider")?;
    }

    let embedder = embedder_from_config(&config)?;
    info!(
        "Embedding {} chunks with model {}",
        chunks.len(),
        embedder.model_id()
    );

    let spinner = start_spinner(&format!("Embedding {} chunks...", chunks.len()));
    let store = VectorStore::build(&config.index_path(), embedder.as_ref(), &chunks).await?;
    spinner.finish_and_clear();

    let index_stats = store.stats().await?;
    println!(
        "{} Index built: {} vectors, {} dimensions, stored at {}",
        style("✓").green(),
        index_stats.chunk_count,
        index_stats.dimension,
        config.index_path().display()
    );

    Ok(())
}

/// Print statistics about the persisted vector collection
#[inline]
pub async fn show_stats(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    let embedder = embedder_from_config(&config)?;

    let Some(store) = VectorStore::load(&config.index_path(), embedder.as_ref()).await? else {
        println!(
            "No index found at {}. Run `bookmind ingest` first.",
            config.index_path().display()
        );
        return Ok(());
    };

    let stats = store.stats().await?;
    println!("Index location: {}", config.index_path().display());
    println!("  Embedding model: {}", store.embedding_model());
    println!("  Vectors: {}", stats.chunk_count);
    println!("  Dimensionality: {}", stats.dimension);

    Ok(())
}

/// Answer a single question and exit
#[inline]
pub async fn ask(config_dir: &Path, question: &str) -> Result<()> {
    let mut session = open_session(config_dir).await?;

    println!("{} {}", style("Question:").bold(), question);
    print!("{} ", style("Answer:").bold());
    stream_answer(&mut session, question).await?;

    Ok(())
}

/// Interactive chat loop; the conversation memory lives for the duration of
/// the loop and is dropped on exit
#[inline]
pub async fn chat(config_dir: &Path) -> Result<()> {
    let mut session = open_session(config_dir).await?;

    println!("{}", style("📚 BookMind").bold().cyan());
    println!("Ask questions about your library. Type 'exit' to quit, 'clear' to start over.");
    println!();

    loop {
        let line = match Input::<String>::new()
            .with_prompt(style("You").bold().to_string())
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            // interrupted (e.g. Ctrl-C / closed stdin)
            Err(e) => {
                info!("Input ended: {}", e);
                break;
            }
        };

        let question = line.trim();
        match question {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                session.reset();
                println!("{}", style("Conversation cleared.").dim());
                continue;
            }
            _ => {}
        }

        print!("{} ", style("BookMind:").bold().green());
        if let Err(e) = stream_answer(&mut session, question).await {
            warn!("Turn failed: {}", e);
            println!("{} {}", style("Error:").bold().red(), e);
        }
        println!();
    }

    println!("{}", style("Goodbye!").dim());
    Ok(())
}

/// Delete the persisted vector collection; idempotent
#[inline]
pub async fn delete_index(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;

    VectorStore::delete_collection(&config.index_path()).await?;
    println!(
        "{} Deleted index at {}",
        style("✓").green(),
        config.index_path().display()
    );

    Ok(())
}

async fn open_session(config_dir: &Path) -> Result<ChatSession> {
    let config = Config::load(config_dir)?;
    let embedder = embedder_from_config(&config)?;

    let Some(store) = VectorStore::load(&config.index_path(), embedder.as_ref()).await? else {
        bail!(
            "no index found at {}; run `bookmind ingest` first",
            config.index_path().display()
        );
    };

    let retriever = Retriever::new(store, embedder, config.index.top_k);
    let client = OpenAiChatClient::new(&config.chat)?;

    Ok(ChatSession::new(retriever, Box::new(client)))
}

/// Stream one answer to stdout, flushing after each delta
async fn stream_answer(session: &mut ChatSession, question: &str) -> Result<()> {
    let stream = session.ask_stream(question).await?;

    let mut stdout = std::io::stdout();
    for delta in stream {
        let delta = delta?;
        print!("{delta}");
        stdout.flush()?;
    }
    println!();

    Ok(())
}

fn start_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
