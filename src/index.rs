//! SQLite-backed vector index.
//!
//! Persists chunk text, metadata, and embedding vectors so a process
//! restart can reopen the same named collection and serve queries
//! without re-embedding anything. Queries are brute-force cosine
//! similarity over the collection, which is exact and fast enough for
//! private corpora of this size.
//!
//! The pool is read-mostly after ingestion: concurrent readers need no
//! locking, and ingestion writes go through transactions.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, ChunkMetadata, Document, StoredChunk};

/// A named collection of chunk vectors inside one SQLite database.
#[derive(Clone)]
pub struct VectorIndex {
    pool: SqlitePool,
    collection: String,
}

impl VectorIndex {
    /// Open (or create) the database at `path` and scope all operations
    /// to `collection`. Runs migrations; safe to call repeatedly.
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let index = Self {
            pool,
            collection: collection.to_string(),
        };
        index.migrate().await?;
        Ok(index)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                source_path TEXT NOT NULL,
                format TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                UNIQUE(collection, content_hash)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                source_path TEXT NOT NULL,
                format TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                created_at INTEGER,
                extra_json TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                UNIQUE(document_id, chunk_index),
                FOREIGN KEY (document_id) REFERENCES documents(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist one document with its chunks and vectors in a single
    /// transaction. `chunks` and `vectors` must be the same length.
    pub async fn add(
        &self,
        document: &Document,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "chunk/vector count mismatch: {} vs {}",
            chunks.len(),
            vectors.len()
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, collection, source_path, format, size_bytes, created_at, content_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&self.collection)
        .bind(document.path.to_string_lossy().as_ref())
        .bind(document.format.as_str())
        .bind(document.size_bytes as i64)
        .bind(document.created_at.timestamp())
        .bind(&document.content_hash)
        .execute(&mut *tx)
        .await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            let extra_json = serde_json::to_string(&chunk.metadata.extra)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, collection, document_id, chunk_index, text,
                                    source_path, format, size_bytes, created_at, extra_json, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&self.collection)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.metadata.source_path)
            .bind(&chunk.metadata.format)
            .bind(chunk.metadata.size_bytes as i64)
            .bind(chunk.metadata.created_at.map(|t| t.timestamp()))
            .bind(extra_json)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Nearest-neighbor query: over-fetch `fetch_k` candidates by cosine
    /// similarity, drop exact-content duplicates preserving rank order,
    /// and truncate to `k`. Scores are non-increasing.
    pub async fn query(
        &self,
        vector: &[f32],
        k: usize,
        fetch_k: usize,
    ) -> Result<Vec<(StoredChunk, f32)>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, chunk_index, text, source_path, format,
                   size_bytes, created_at, extra_json, embedding
            FROM chunks
            WHERE collection = ?
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(StoredChunk, f32)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let candidate = blob_to_vec(&blob);
            let score = cosine_similarity(vector, &candidate);
            scored.push((row_to_chunk(row)?, score));
        }

        // Descending score; document/index tie-break keeps ordering
        // deterministic across runs.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.document_id.cmp(&b.0.document_id))
                .then_with(|| a.0.chunk_index.cmp(&b.0.chunk_index))
        });
        scored.truncate(fetch_k.max(k));

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(k);
        for (chunk, score) in scored {
            if !seen.insert(chunk.text.clone()) {
                continue;
            }
            results.push((chunk, score));
            if results.len() == k {
                break;
            }
        }

        Ok(results)
    }

    /// Delete every document and chunk in this collection.
    pub async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn document_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Content hashes of all documents already in the collection.
    pub async fn known_hashes(&self) -> Result<HashSet<String>> {
        let hashes: Vec<String> =
            sqlx::query_scalar("SELECT content_hash FROM documents WHERE collection = ?")
                .bind(&self.collection)
                .fetch_all(&self.pool)
                .await?;
        Ok(hashes.into_iter().collect())
    }
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<StoredChunk> {
    let extra_json: String = row.get("extra_json");
    let extra: BTreeMap<String, String> = serde_json::from_str(&extra_json).unwrap_or_default();
    let created_at: Option<i64> = row.get("created_at");

    Ok(StoredChunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        metadata: ChunkMetadata {
            source_path: row.get("source_path"),
            format: row.get("format"),
            size_bytes: row.get::<i64, _>("size_bytes") as u64,
            created_at: created_at.and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
            extra,
        },
    })
}
