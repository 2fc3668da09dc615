//! # docqa CLI
//!
//! The `docqa` binary drives the full pipeline: index initialization,
//! document ingestion, one-shot questions, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite index and run schema migrations |
//! | `docqa ingest` | Load, deduplicate, chunk, embed, and index documents |
//! | `docqa ask "<question>"` | Answer one question and print it as JSON |
//! | `docqa serve` | Start the HTTP server (`POST /ask`, `GET /health`) |

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use docqa::completion::create_completion;
use docqa::config;
use docqa::embedding::create_embedder;
use docqa::index::VectorIndex;
use docqa::ingest::{run_ingest, IngestOptions};
use docqa::qa::QaEngine;
use docqa::server::run_server;

/// docqa CLI — retrieval-augmented question answering over a local
/// document collection.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/docqa.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Question answering over a private document collection",
    version,
    long_about = "docqa ingests a directory of documents (txt, md, pdf, docx), chunks and \
    embeds them into a SQLite vector index, and answers questions against the indexed \
    content via a CLI or an HTTP API. Every answer cites the source passages it used."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database.
    ///
    /// Creates the SQLite file and all required tables. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Ingest documents from the configured root directory.
    ///
    /// Loads eligible files, skips duplicates by content hash, chunks
    /// and embeds new documents, and writes them to the index.
    /// Incremental by default: re-running over an unchanged corpus is
    /// a no-op.
    Ingest {
        /// Clear the collection and reindex everything from scratch.
        #[arg(long)]
        full: bool,

        /// Show document and chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a single question and print the result as JSON.
    ///
    /// The output has the same shape as the HTTP API response:
    /// `{"answer": ..., "sources": [...]}`.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// `POST /ask` and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            VectorIndex::open(&cfg.index.path, &cfg.index.collection).await?;
            println!("Index initialized at {}", cfg.index.path.display());
        }
        Commands::Ingest { full, dry_run } => {
            let embedder = create_embedder(&cfg.embedding)?;
            let index = VectorIndex::open(&cfg.index.path, &cfg.index.collection).await?;
            let stats = run_ingest(
                &cfg,
                embedder.as_ref(),
                &index,
                IngestOptions { full, dry_run },
            )
            .await?;

            if dry_run {
                println!(
                    "Dry run: {} documents would be indexed ({} chunks), {} skipped, {} duplicates",
                    stats.documents_loaded,
                    stats.chunks_indexed,
                    stats.documents_skipped,
                    stats.duplicates
                );
            } else {
                println!(
                    "Indexed {} documents ({} chunks), {} skipped, {} duplicates, {} chunks dropped",
                    stats.documents_loaded,
                    stats.chunks_indexed,
                    stats.documents_skipped,
                    stats.duplicates,
                    stats.chunks_dropped
                );
            }
        }
        Commands::Ask { question } => {
            let engine = build_engine(&cfg).await?;
            let answer = engine.answer(&question).await;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
        Commands::Serve => {
            let engine = build_engine(&cfg).await?;
            run_server(&cfg, engine).await?;
        }
    }

    Ok(())
}

async fn build_engine(cfg: &config::Config) -> anyhow::Result<QaEngine> {
    let embedder = create_embedder(&cfg.embedding)?;
    let completion = create_completion(&cfg.completion)?;
    let index = VectorIndex::open(&cfg.index.path, &cfg.index.collection).await?;

    Ok(QaEngine::new(
        Arc::from(embedder),
        Arc::from(completion),
        index,
        cfg.retrieval.clone(),
        &cfg.completion,
    ))
}
