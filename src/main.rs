use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use proofmark::cache::AnalysisCache;
use proofmark::cache::storage::{FileStore, KeyValueStore};
use proofmark::clock::{Clock, SystemClock};
use proofmark::config::Config;
use proofmark::engine::AnalysisEngine;
use proofmark::models::AnalysisOptions;
use proofmark::provider::TextCompletionProvider;
use proofmark::provider::http::HttpProvider;
use proofmark::provider::mock::MockProvider;

#[derive(Parser)]
#[command(name = "proofmark", version, about = "Grammar, spelling and style checks for free text")]
struct Cli {
    /// Path to the JSON config file (defaults to ./proofmark.json)
    #[arg(long, global = true, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a text file and print the result as JSON
    Check {
        file: PathBuf,

        /// Use the built-in pattern provider instead of the HTTP endpoint
        #[arg(long)]
        mock: bool,

        /// Language hint passed to the provider
        #[arg(long)]
        language: Option<String>,
    },
    /// Inspect or clear the persisted analysis cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    Stats,
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = FileStore::default_location();
    info!("cache directory: {}", store.dir().display());
    let store: Arc<dyn KeyValueStore> = Arc::new(store);

    match cli.command {
        Command::Check { file, mock, language } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;

            let provider: Arc<dyn TextCompletionProvider> = if mock {
                Arc::new(MockProvider::default())
            } else {
                Arc::new(HttpProvider::new(&config.provider).context("failed to build HTTP provider")?)
            };

            let engine = AnalysisEngine::new(config, provider, clock, Some(store));
            let options = AnalysisOptions {
                language,
                ..AnalysisOptions::default()
            };
            let result = engine.analyze(&text, &options).await?;
            info!(
                "{} issue(s) in {} chunk(s){}",
                result.issues.len(),
                result.metadata.chunk_count,
                if result.metadata.from_cache { " (cached)" } else { "" }
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
            engine.destroy();
        }
        Command::Cache { action } => {
            let mut cache = AnalysisCache::open(&config.cache, clock, store);
            match action {
                CacheAction::Stats => {
                    println!("{}", serde_json::to_string_pretty(&cache.stats())?);
                }
                CacheAction::Clear => {
                    let removed = cache.len();
                    cache.clear();
                    info!("cleared {removed} cached result(s)");
                }
            }
        }
    }

    Ok(())
}
