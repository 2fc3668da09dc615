//! Question answering: retrieve, assemble, complete, cite.
//!
//! [`QaEngine::answer`] is the one entry point and it never fails:
//! every internal error (embedding, index, completion) is logged with
//! the stage it came from and converted into a fixed fallback answer
//! with no sources. Callers can always serialize the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::completion::CompletionClient;
use crate::config::{CompletionConfig, RetrievalConfig};
use crate::embedding::{embed_query, Embedder};
use crate::index::VectorIndex;
use crate::models::{Answer, Source, StoredChunk};

/// Returned whenever any stage of answering fails, and for questions
/// with no usable content. Deliberately generic: internal failure
/// detail stays in the logs.
pub const FALLBACK_ANSWER: &str =
    "I'm sorry, I couldn't process your request at the moment. Please try again later.";

/// Chunk metadata fields exposed to clients. Everything else stays
/// internal.
const SOURCE_METADATA_FIELDS: [&str; 2] = ["source_path", "format"];

/// Joins context chunks inside the prompt. Counted against the
/// context budget.
const CONTEXT_SEPARATOR: &str = "\n\n";

pub struct QaEngine {
    embedder: Arc<dyn Embedder>,
    completion: Arc<dyn CompletionClient>,
    index: VectorIndex,
    retrieval: RetrievalConfig,
    max_context_chars: usize,
}

impl QaEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionClient>,
        index: VectorIndex,
        retrieval: RetrievalConfig,
        completion_config: &CompletionConfig,
    ) -> Self {
        Self {
            embedder,
            completion,
            index,
            retrieval,
            max_context_chars: completion_config.max_context_chars,
        }
    }

    /// Number of chunks visible to this engine's collection. Used by
    /// the readiness check.
    pub async fn chunk_count(&self) -> Result<i64> {
        self.index.chunk_count().await
    }

    /// Answer a question. Infallible by contract: failures degrade to
    /// [`FALLBACK_ANSWER`] with empty sources.
    pub async fn answer(&self, question: &str) -> Answer {
        let question = question.trim();
        if question.is_empty() {
            return fallback();
        }

        match self.try_answer(question).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "answering failed, returning fallback");
                fallback()
            }
        }
    }

    async fn try_answer(&self, question: &str) -> Result<Answer> {
        let query_vector = embed_query(self.embedder.as_ref(), question)
            .await
            .context("embedding the question")?;

        let retrieved = self
            .index
            .query(
                &query_vector,
                self.retrieval.max_results,
                self.retrieval.fetch_k,
            )
            .await
            .context("querying the index")?;

        if retrieved.is_empty() {
            debug!("no chunks retrieved, returning fallback");
            return Ok(fallback());
        }

        let chunks: Vec<StoredChunk> = retrieved.into_iter().map(|(c, _)| c).collect();
        let context_chunks = fit_to_budget(&chunks, self.max_context_chars);

        let prompt = build_prompt(question, &context_chunks);
        let answer_text = self
            .completion
            .complete(&prompt)
            .await
            .context("generating the completion")?;

        let sources = build_sources(&context_chunks, self.retrieval.max_sources);

        Ok(Answer {
            answer: answer_text,
            sources,
        })
    }
}

fn fallback() -> Answer {
    Answer {
        answer: FALLBACK_ANSWER.to_string(),
        sources: Vec::new(),
    }
}

/// Keep retrieved chunks in rank order while the assembled context —
/// chunk texts plus the separators between them — stays within the
/// character budget; lower-ranked chunks are dropped first. When even
/// the top chunk is over budget, its text is truncated so the context
/// never exceeds the limit.
fn fit_to_budget(chunks: &[StoredChunk], max_chars: usize) -> Vec<StoredChunk> {
    let mut out = Vec::new();
    let mut used = 0usize;

    for chunk in chunks {
        let sep = if out.is_empty() {
            0
        } else {
            CONTEXT_SEPARATOR.len()
        };
        let len = sep + chunk.text.chars().count();
        if used + len <= max_chars {
            out.push(chunk.clone());
            used += len;
        } else if out.is_empty() {
            let mut truncated = chunk.clone();
            truncated.text = chunk.text.chars().take(max_chars).collect();
            out.push(truncated);
            break;
        } else {
            break;
        }
    }

    out
}

fn build_prompt(question: &str, chunks: &[StoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try \
         to make up an answer.\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        context, question
    )
}

/// Map context chunks to citable sources, exposing only allow-listed
/// metadata and capping the count.
fn build_sources(chunks: &[StoredChunk], max_sources: usize) -> Vec<Source> {
    chunks
        .iter()
        .take(max_sources)
        .map(|chunk| {
            let mut metadata = BTreeMap::new();
            for field in SOURCE_METADATA_FIELDS {
                let value = match field {
                    "source_path" => Some(chunk.metadata.source_path.clone()),
                    "format" => Some(chunk.metadata.format.clone()),
                    _ => None,
                };
                if let Some(value) = value {
                    metadata.insert(field.to_string(), value);
                }
            }
            Source {
                content: chunk.text.clone(),
                metadata,
            }
        })
        .collect()
}
