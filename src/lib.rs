//! # docqa
//!
//! A retrieval-augmented question answering service for private
//! document collections.
//!
//! Documents are loaded from a local directory, deduplicated by
//! content hash, split into overlapping chunks, embedded, and stored
//! in a SQLite-backed vector index. Questions are answered by
//! retrieving the most similar chunks, assembling them into a prompt,
//! and calling a completion model; every answer cites the passages it
//! was grounded on.
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌──────────┐
//! │  Loader  │──▶│ Dedup+Chunk+Embed │──▶│  SQLite  │
//! │ txt/md/  │   │     (ingest)      │   │  vectors │
//! │ pdf/docx │   └───────────────────┘   └────┬─────┘
//! └──────────┘                                │
//!                            ┌────────────────┤
//!                            ▼                ▼
//!                       ┌─────────┐      ┌─────────┐
//!                       │   CLI   │      │  HTTP   │
//!                       │ (docqa) │      │  /ask   │
//!                       └─────────┘      └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa init                    # create the index database
//! docqa ingest                  # load, chunk, embed, and index documents
//! docqa ask "What is our refund policy?"
//! docqa serve                   # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`loader`] | Filesystem document loading |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`chunk`] | Recursive text chunking with overlap |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`completion`] | Completion provider abstraction |
//! | [`index`] | SQLite vector index |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`qa`] | Retrieval and answer composition |
//! | [`cache`] | TTL answer cache |
//! | [`ratelimit`] | Per-client fixed-window rate limiting |
//! | [`server`] | HTTP API |

pub mod cache;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod qa;
pub mod ratelimit;
pub mod server;
