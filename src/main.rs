use std::path::PathBuf;

use bookmind::commands::{ask, chat, delete_index, ingest, show_stats};
use bookmind::config::{default_config_dir, run_interactive_config, show_config};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bookmind")]
#[command(about = "Conversational question-answering over a personal library of PDF books")]
#[command(version)]
struct Cli {
    /// Override the configuration directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure corpus location, models, and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load the corpus, chunk it, and (re)build the vector index
    Ingest,
    /// Show statistics about the vector index
    Stats,
    /// Ask a single question and exit
    Ask {
        /// The question to ask
        question: String,
    },
    /// Start an interactive chat session
    Chat,
    /// Delete the vector index
    Delete,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ingest => {
            ingest(&config_dir).await?;
        }
        Commands::Stats => {
            show_stats(&config_dir).await?;
        }
        Commands::Ask { question } => {
            ask(&config_dir, &question).await?;
        }
        Commands::Chat => {
            chat(&config_dir).await?;
        }
        Commands::Delete => {
            delete_index(&config_dir).await?;
        }
    }

    Ok(())
}
