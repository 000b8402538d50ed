//! # Lawdex CLI
//!
//! Command-line entry point for the offline jobs and a one-shot ask
//! driver.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lawdex index` | (Re)index the statute corpus idempotently |
//! | `lawdex backfill` | Regenerate derived citation metadata |
//! | `lawdex ask "<question>"` | Answer a question with numbered sources |
//! | `lawdex status` | Show the indexing manifest |
//!
//! All commands accept `--config` pointing to a TOML configuration file;
//! API keys come from the environment (`OPENAI_API_KEY`,
//! `PINECONE_API_KEY`), with `.env` loaded when present.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use lawdex::answer::Assistant;
use lawdex::backfill::{run_backfill, BackfillOptions};
use lawdex::completion::OpenAiChat;
use lawdex::config::load_config;
use lawdex::embedding::OpenAiEmbedder;
use lawdex::history::{HistoryProvider, InMemoryHistory, Role};
use lawdex::manifest;
use lawdex::pipeline::{run_index, IndexOptions};
use lawdex::retrieve::Retriever;
use lawdex::store::PineconeStore;

#[derive(Parser)]
#[command(
    name = "lawdex",
    about = "Retrieval-augmented legal assistance backend for jeonse-fraud counseling",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lawdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the statute corpus.
    ///
    /// Unchanged documents (by content hash) are skipped entirely;
    /// changed documents have their old vectors deleted before
    /// re-upserting. One document's failure does not abort the run.
    Index {
        /// Dry run — log mutating store calls without issuing them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Regenerate derived citation metadata for indexed vectors.
    ///
    /// Reconstructs vector IDs from the manifest, parses 조/항/호
    /// references out of the stored chunk text, and writes the enriched
    /// metadata back without re-embedding.
    Backfill {
        /// Dry run — count intended updates without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask a question and print the answer with its sources.
    Ask {
        /// The question to answer.
        question: String,

        /// Session identifier for conversation continuity.
        #[arg(long)]
        session: Option<String>,
    },

    /// Show the indexing manifest.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lawdex=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Index { dry_run } => {
            let store = PineconeStore::new(&config.store)?;
            let embedder = OpenAiEmbedder::new(&config.embedding)?;

            let report = run_index(&config, &store, &embedder, IndexOptions { dry_run }).await?;

            println!("index{}", if dry_run { " (dry-run)" } else { "" });
            println!("  indexed: {}", report.indexed);
            println!("  skipped unchanged: {}", report.skipped);
            if report.no_chunks > 0 {
                println!("  empty after processing: {}", report.no_chunks);
            }
            if !report.failed.is_empty() {
                println!("  failed: {}", report.failed.len());
                for (source, error) in &report.failed {
                    println!("    {}: {}", source, error);
                }
            }
            println!("ok");
        }

        Commands::Backfill { dry_run } => {
            let store = PineconeStore::new(&config.store)?;

            let report = run_backfill(&config, &store, BackfillOptions { dry_run }).await?;

            println!("backfill{}", if dry_run { " (dry-run)" } else { "" });
            println!("  updated: {}", report.updated);
            println!("  missing: {}", report.missing);
            if report.skipped_sources > 0 {
                println!("  skipped sources: {}", report.skipped_sources);
            }
            println!("ok");
        }

        Commands::Ask { question, session } => {
            let store = Arc::new(PineconeStore::new(&config.store)?);
            let embedder = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
            let completion = Arc::new(OpenAiChat::new(&config.chat)?);
            let history = Arc::new(InMemoryHistory::new());

            let retriever = Arc::new(Retriever::new(
                embedder,
                store,
                config.retrieval.top_k,
            ));
            let assistant = Assistant::new(retriever, completion, history.clone(), &config.chat);

            let session_id = session.unwrap_or_default();
            if !session_id.is_empty() {
                history
                    .append(&session_id, Role::User, &question)
                    .await?;
            }
            let response = assistant
                .ask(
                    &question,
                    (!session_id.is_empty()).then_some(session_id.as_str()),
                )
                .await?;

            println!("{}", response.answer);
            if !response.sources.is_empty() {
                println!();
                println!("출처:");
                for source in &response.sources {
                    println!("  [{}] {}", source.id, source.citation);
                    if !source.snippet.is_empty() {
                        println!("      {}", source.snippet.replace('\n', " "));
                    }
                }
            }
            println!();
            println!("session: {}", response.session_id);
        }

        Commands::Status => {
            let manifest = manifest::load(&config.corpus.manifest_path)?;
            if manifest.is_empty() {
                println!("manifest empty: {}", config.corpus.manifest_path.display());
            } else {
                println!("manifest: {}", config.corpus.manifest_path.display());
                for (source, entry) in &manifest {
                    println!(
                        "  {} sha={} chunks={} indexed_at={}",
                        source,
                        &entry.sha256[..12.min(entry.sha256.len())],
                        entry.chunks,
                        entry.indexed_at
                    );
                }
            }
        }
    }

    Ok(())
}
