//! # Stash CLI
//!
//! The `stash` binary serves the HTTP facade and offers direct vault
//! operations for local use.
//!
//! ```bash
//! stash --config ./config/stash.toml serve
//! stash add --user 42 --url https://example.com/post
//! stash add --user 42 --text "# Meeting\nDiscuss #roadmap today"
//! stash add --user 42 --image ./shot.png --caption "Dashboard #metrics"
//! stash search --user 42 "concurrency"
//! stash export --user 42 --output vault.zip
//! stash stats --user 42
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use stash::config::{load_config, Config};
use stash::detect;
use stash::export::export_vault;
use stash::extract::WebExtractor;
use stash::llm::{LanguageModel, LlmClient};
use stash::manager::VaultManager;
use stash::models::{ContentKind, RawContent};
use stash::pipeline::Pipeline;
use stash::server::run_server;
use stash::websearch::DuckDuckGoClient;

/// Stash — a multi-tenant personal knowledge-capture backend.
#[derive(Parser)]
#[command(
    name = "stash",
    about = "Multi-tenant personal knowledge-capture backend",
    version,
    long_about = "Stash ingests links, notes, images and short topic queries into \
    per-owner searchable vaults with tags and a knowledge graph, exposes them over \
    an HTTP API, and exports Obsidian-style markdown archives."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/stash.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// Submit one piece of content through the ingestion pipeline.
    ///
    /// Exactly one of --url, --text, or --image selects the submission
    /// kind. Short text that looks like a topic query (1-3 words, no
    /// question mark) is routed to the web-search stage.
    Add {
        /// Owner id of the target vault.
        #[arg(long)]
        user: i64,
        /// Ingest a web link.
        #[arg(long)]
        url: Option<String>,
        /// Ingest a text note (or short topic).
        #[arg(long)]
        text: Option<String>,
        /// Ingest an image file.
        #[arg(long)]
        image: Option<PathBuf>,
        /// Caption for --image.
        #[arg(long, default_value = "")]
        caption: String,
        /// Language hint, e.g. "en" or "ru".
        #[arg(long, default_value = "")]
        lang: String,
    },

    /// Full-text search in one owner's vault.
    Search {
        #[arg(long)]
        user: i64,
        query: String,
    },

    /// Export a vault as an Obsidian-style zip archive.
    Export {
        #[arg(long)]
        user: i64,
        /// Output file; defaults to stash-export.zip.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Item and tag counts for one owner's vault.
    Stats {
        #[arg(long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let (manager, pipeline, llm) = build_backend(&config)?;
            run_server(&config.server.bind, manager, pipeline, llm).await?;
        }
        Commands::Add {
            user,
            url,
            text,
            image,
            caption,
            lang,
        } => {
            let (_, pipeline, _) = build_backend(&config)?;
            let raw = build_submission(user, url, text, image, caption, lang)?;
            let item = pipeline.process(raw).await?;
            println!("stored {} \"{}\"", item.id, item.title);
            if !item.tags.is_empty() {
                println!("  tags: {}", item.tags.join(", "));
            }
        }
        Commands::Search { user, query } => {
            let manager = VaultManager::new(&config.data.dir)?;
            let vault = manager.vault(user).await?;
            let results = vault.search(&query, 20).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for r in results {
                println!("{}  {}", r.item.id, r.item.title);
                if !r.snippet.is_empty() {
                    println!("  {}", r.snippet);
                }
            }
            manager.close().await;
        }
        Commands::Export { user, output } => {
            let manager = VaultManager::new(&config.data.dir)?;
            let vault = manager.vault(user).await?;
            let archive = export_vault(&vault).await?;
            let path = output.unwrap_or_else(|| PathBuf::from("stash-export.zip"));
            std::fs::write(&path, &archive)
                .with_context(|| format!("write {}", path.display()))?;
            println!("exported {} bytes to {}", archive.len(), path.display());
            manager.close().await;
        }
        Commands::Stats { user } => {
            let manager = VaultManager::new(&config.data.dir)?;
            let vault = manager.vault(user).await?;
            let items = vault.item_count().await?;
            let tags = vault.all_tags().await?;
            println!("items: {items}");
            println!("tags:  {}", tags.len());
            manager.close().await;
        }
    }

    Ok(())
}

fn build_backend(config: &Config) -> Result<(Arc<VaultManager>, Arc<Pipeline>, Arc<dyn LanguageModel>)> {
    let manager = Arc::new(VaultManager::new(&config.data.dir)?);

    let api_key = config
        .llm
        .resolved_api_key()
        .context("llm api key missing: set llm.api_key or STASH_LLM_API_KEY")?;

    let llm: Arc<dyn LanguageModel> = Arc::new(LlmClient::new(
        api_key,
        &config.llm.model,
        &config.llm.base_url,
        config.llm.timeout_secs,
    )?);

    let extractor = Arc::new(WebExtractor::new(config.fetch.timeout_secs)?);
    let search = Arc::new(DuckDuckGoClient::new(config.search.timeout_secs)?);

    let pipeline = Arc::new(
        Pipeline::new(manager.clone(), extractor, llm.clone(), search)
            .with_relation_suggestions(config.llm.relationship_suggestions),
    );

    Ok((manager, pipeline, llm))
}

fn build_submission(
    user: i64,
    url: Option<String>,
    text: Option<String>,
    image: Option<PathBuf>,
    caption: String,
    lang: String,
) -> Result<RawContent> {
    let mut raw = RawContent {
        owner_id: user,
        language: lang,
        ..Default::default()
    };

    match (url, text, image) {
        (Some(url), None, None) => {
            raw.kind = ContentKind::Link;
            raw.url = url;
        }
        (None, Some(text), None) => {
            raw.kind = if detect::is_short_topic(&text) {
                ContentKind::Topic
            } else {
                ContentKind::Note
            };
            raw.text = text;
        }
        (None, None, Some(path)) => {
            raw.kind = ContentKind::Image;
            raw.image_data =
                std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            raw.image_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin")
                .to_lowercase();
            raw.caption = caption;
        }
        _ => anyhow::bail!("pass exactly one of --url, --text, or --image"),
    }

    Ok(raw)
}
