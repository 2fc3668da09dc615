//! Ingestion pipeline: load, deduplicate, chunk, embed, index.
//!
//! A run is incremental by default: documents whose content hash is
//! already in the collection (or appeared earlier in the same run) are
//! skipped, so re-running over an unchanged corpus is a no-op. `full`
//! clears the collection first; `dry_run` stops before embedding and
//! reports what would be indexed.

use std::collections::HashSet;

use anyhow::{bail, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::split_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::loader::{load_documents, LoadOutcome};
use crate::models::{Chunk, ChunkMetadata, Document};

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub documents_loaded: usize,
    pub documents_skipped: usize,
    pub duplicates: usize,
    pub chunks_indexed: usize,
    pub chunks_dropped: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestOptions {
    /// Clear the collection before indexing.
    pub full: bool,
    /// Load, deduplicate, and chunk, but do not embed or write.
    pub dry_run: bool,
}

/// Run one ingestion pass over the configured root.
///
/// Fails when no usable documents are found, or when not a single
/// chunk could be embedded (an unreachable embedding service must not
/// silently produce an empty index). Individual batch failures only
/// drop the affected chunks.
pub async fn run_ingest(
    config: &Config,
    embedder: &dyn Embedder,
    index: &VectorIndex,
    options: IngestOptions,
) -> Result<IngestStats> {
    if options.full && !options.dry_run {
        info!("clearing collection before full ingest");
        index.clear().await?;
    }

    let outcomes = load_documents(&config.ingestion).await?;

    let mut stats = IngestStats::default();
    let mut documents = Vec::new();
    for outcome in outcomes {
        match outcome {
            LoadOutcome::Loaded(doc) => documents.push(doc),
            LoadOutcome::Skipped { path, reason } => {
                warn!(path = %path.display(), %reason, "skipping file");
                stats.documents_skipped += 1;
            }
        }
    }

    if documents.is_empty() {
        bail!(
            "no usable documents found under {}",
            config.ingestion.root.display()
        );
    }

    // Hashes already indexed plus hashes seen earlier in this run. A
    // dry run still consults the index so its counts match what the
    // real incremental run would do; only --full starts from scratch.
    let mut seen = if options.full {
        HashSet::new()
    } else {
        index.known_hashes().await?
    };

    for document in documents {
        if !seen.insert(document.content_hash.clone()) {
            info!(path = %document.path.display(), "duplicate content, skipping");
            stats.duplicates += 1;
            continue;
        }

        let chunks = chunk_document(&document, config);
        if chunks.is_empty() {
            warn!(path = %document.path.display(), "document produced no chunks");
            stats.documents_skipped += 1;
            continue;
        }

        stats.documents_loaded += 1;

        if options.dry_run {
            stats.chunks_indexed += chunks.len();
            continue;
        }

        let (kept, vectors, dropped) =
            embed_chunks(embedder, chunks, config.embedding.batch_size).await;
        stats.chunks_dropped += dropped;

        if kept.is_empty() {
            warn!(path = %document.path.display(), "all chunks dropped, document not indexed");
            continue;
        }

        index.add(&document, &kept, &vectors).await?;
        stats.chunks_indexed += kept.len();
    }

    // A run where every attempted chunk failed to embed means the
    // embedding service is down; a run where everything was a
    // duplicate is a normal no-op.
    if !options.dry_run && stats.chunks_indexed == 0 && stats.chunks_dropped > 0 {
        bail!("embedding failed for every chunk; nothing was indexed");
    }

    info!(
        documents = stats.documents_loaded,
        skipped = stats.documents_skipped,
        duplicates = stats.duplicates,
        chunks = stats.chunks_indexed,
        dropped = stats.chunks_dropped,
        "ingestion complete"
    );

    Ok(stats)
}

/// Split a document and attach its metadata to every chunk.
fn chunk_document(document: &Document, config: &Config) -> Vec<Chunk> {
    let texts = split_text(
        &document.body,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    );

    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            chunk_index: i as i64,
            text,
            metadata: ChunkMetadata {
                source_path: document.path.to_string_lossy().to_string(),
                format: document.format.as_str().to_string(),
                size_bytes: document.size_bytes,
                created_at: Some(document.created_at),
                extra: Default::default(),
            },
        })
        .collect()
}

/// Embed chunks batch by batch. A failed batch is dropped with a
/// warning; surviving chunks stay aligned with their vectors.
async fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: Vec<Chunk>,
    batch_size: usize,
) -> (Vec<Chunk>, Vec<Vec<f32>>, usize) {
    let mut kept = Vec::with_capacity(chunks.len());
    let mut vectors = Vec::with_capacity(chunks.len());
    let mut dropped = 0;

    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        match embedder.embed_batch(&texts).await {
            Ok(embeddings) if embeddings.len() == batch.len() => {
                kept.extend(batch.iter().cloned());
                vectors.extend(embeddings);
            }
            Ok(embeddings) => {
                warn!(
                    expected = batch.len(),
                    got = embeddings.len(),
                    "embedding batch returned wrong count, dropping batch"
                );
                dropped += batch.len();
            }
            Err(e) => {
                warn!(error = %e, batch = batch.len(), "embedding batch failed, dropping batch");
                dropped += batch.len();
            }
        }
    }

    (kept, vectors, dropped)
}
