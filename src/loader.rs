//! Filesystem document loader.
//!
//! Walks the ingestion root, filters by extension and size, and parses
//! each candidate file into a [`Document`]. Parsing runs on a bounded
//! pool of blocking workers so large PDF corpora do not serialize the
//! whole scan. Every file produces an explicit outcome: either a
//! loaded document or a skip with a reason the caller can log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::IngestionConfig;
use crate::extract::{extract_docx, extract_pdf};
use crate::models::{Document, DocumentFormat};

/// The fate of one file seen during a scan. Skips carry a
/// human-readable reason so callers can report them without guessing.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Document),
    Skipped { path: PathBuf, reason: String },
}

/// Scan `config.root` recursively and parse every eligible file.
///
/// Files whose extension is outside the configured allow-list or the
/// supported format set, or whose size exceeds the ceiling, are
/// skipped up front. Parse failures and empty extractions become
/// skips too; a single bad file never aborts the scan. Outcomes
/// arrive in completion order.
pub async fn load_documents(config: &IngestionConfig) -> Result<Vec<LoadOutcome>> {
    anyhow::ensure!(
        config.root.is_dir(),
        "ingestion root is not a directory: {}",
        config.root.display()
    );

    let mut outcomes = Vec::new();
    let mut candidates: Vec<(PathBuf, DocumentFormat)> = Vec::new();

    for entry in WalkDir::new(&config.root).follow_links(false) {
        let entry = entry.with_context(|| "Failed to walk ingestion root")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if !config.allowed_extensions.iter().any(|a| a == &ext) {
            debug!(path = %path.display(), "extension not allowed, skipping");
            outcomes.push(LoadOutcome::Skipped {
                path,
                reason: format!("extension '{}' not in allow-list", ext),
            });
            continue;
        }

        let Some(format) = DocumentFormat::from_extension(&ext) else {
            outcomes.push(LoadOutcome::Skipped {
                path,
                reason: format!("unsupported format '{}'", ext),
            });
            continue;
        };

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > config.max_file_size_bytes {
            outcomes.push(LoadOutcome::Skipped {
                path,
                reason: format!(
                    "file size {} exceeds limit {}",
                    size, config.max_file_size_bytes
                ),
            });
            continue;
        }

        candidates.push((path, format));
    }

    let semaphore = Arc::new(Semaphore::new(config.workers));
    let mut set = JoinSet::new();

    for (path, format) in candidates {
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            // The semaphore is never closed while tasks are running.
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            tokio::task::spawn_blocking(move || parse_file(&path, format)).await
        });
    }

    while let Some(result) = set.join_next().await {
        let outcome = result
            .context("load task failed")?
            .context("parse task panicked")?;
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

/// Read and parse a single file. Runs on a blocking worker.
fn parse_file(path: &Path, format: DocumentFormat) -> LoadOutcome {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return LoadOutcome::Skipped {
                path: path.to_path_buf(),
                reason: format!("read failed: {}", e),
            }
        }
    };

    let content_hash = format!("{:x}", Sha256::digest(&bytes));

    let body = match format {
        DocumentFormat::Text | DocumentFormat::Markdown => {
            match String::from_utf8(bytes.clone()) {
                Ok(text) => text,
                Err(e) => {
                    return LoadOutcome::Skipped {
                        path: path.to_path_buf(),
                        reason: format!("not valid UTF-8: {}", e),
                    }
                }
            }
        }
        DocumentFormat::Pdf => match extract_pdf(&bytes) {
            Ok(text) => text,
            Err(e) => {
                return LoadOutcome::Skipped {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        },
        DocumentFormat::Docx => match extract_docx(&bytes) {
            Ok(text) => text,
            Err(e) => {
                return LoadOutcome::Skipped {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        },
    };

    if body.trim().is_empty() {
        return LoadOutcome::Skipped {
            path: path.to_path_buf(),
            reason: "no extractable text".to_string(),
        };
    }

    let created_at = file_timestamp(path).unwrap_or_else(Utc::now);

    LoadOutcome::Loaded(Document {
        id: Uuid::new_v4().to_string(),
        path: path.to_path_buf(),
        size_bytes: bytes.len() as u64,
        body,
        format,
        created_at,
        content_hash,
    })
}

fn file_timestamp(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}
