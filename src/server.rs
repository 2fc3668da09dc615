//! HTTP server exposing the QA engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question against the indexed corpus |
//! | `GET`  | `/health` | Readiness check (ready once the index has chunks) |
//!
//! # Error Contract
//!
//! `/ask` never returns a 5xx for engine failures: those degrade to the
//! fallback answer inside the engine. Boundary errors are:
//!
//! ```json
//! { "error": "rate limit exceeded, try again later" }
//! ```
//!
//! with `429` for rate limiting and `400` for malformed input.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based clients.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::AskError;
use crate::models::Answer;
use crate::qa::QaEngine;
use crate::ratelimit::RateLimiter;

/// Client identifier used when a request does not supply one. All
/// anonymous callers then share a single rate-limit budget.
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor. The cache and limiter live exactly as long as
/// the server task that owns this state.
#[derive(Clone)]
struct AppState {
    engine: Arc<QaEngine>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
}

/// Start the HTTP server on `[server].bind` and run until the process
/// is terminated.
pub async fn run_server(config: &Config, engine: QaEngine) -> anyhow::Result<()> {
    let state = AppState {
        engine: Arc::new(engine),
        cache: Arc::new(ResponseCache::new(Duration::from_secs(config.cache.ttl_secs))),
        limiter: Arc::new(RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        )),
    };

    let app = build_router(state);

    info!(bind = %config.server.bind, "server listening");

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
    /// Optional caller identity for rate limiting.
    client_id: Option<String>,
}

/// Handler for `POST /ask`.
///
/// Rate limiting happens before the cache lookup, so hammering a
/// cached question still consumes budget. Cache hits skip the engine
/// entirely.
async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Answer>, AskError> {
    let client_id = request
        .client_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT);

    if !state.limiter.check(client_id) {
        return Err(AskError::RateLimited);
    }

    if request.question.trim().is_empty() {
        return Err(AskError::InvalidRequest("question must not be empty".to_string()));
    }

    let engine = state.engine.clone();
    let question = request.question.clone();
    let answer = state
        .cache
        .get_or_compute(&request.question, || async move {
            engine.answer(&question).await
        })
        .await;

    Ok(Json(answer))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    chunks: i64,
}

/// Handler for `GET /health`.
///
/// `200 ok` once the collection has at least one chunk, `503 empty`
/// before any ingestion has run. Load balancers can use this to hold
/// traffic until the corpus is ready.
async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let chunks = state.engine.chunk_count().await.unwrap_or(0);
    let (status_code, status) = if chunks > 0 {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "empty")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            chunks,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::EchoCompletion;
    use crate::config::{CompletionConfig, RetrievalConfig};
    use crate::embedding::{Embedder, HashEmbedder};
    use crate::index::VectorIndex;
    use crate::models::{Chunk, ChunkMetadata, Document, DocumentFormat};
    use chrono::Utc;
    use tempfile::TempDir;

    async fn state_with_corpus(dir: &TempDir, texts: &[&str], max_requests: u32) -> AppState {
        let index = VectorIndex::open(&dir.path().join("index.sqlite"), "test")
            .await
            .unwrap();
        let embedder = Arc::new(HashEmbedder::new(128));

        for (i, text) in texts.iter().enumerate() {
            let doc = Document {
                id: format!("doc-{i}"),
                path: format!("/corpus/{i}.txt").into(),
                body: text.to_string(),
                format: DocumentFormat::Text,
                size_bytes: text.len() as u64,
                created_at: Utc::now(),
                content_hash: format!("hash-{i}"),
            };
            let chunk = Chunk {
                id: uuid::Uuid::new_v4().to_string(),
                document_id: doc.id.clone(),
                chunk_index: 0,
                text: text.to_string(),
                metadata: ChunkMetadata {
                    source_path: doc.path.to_string_lossy().to_string(),
                    format: "text".to_string(),
                    size_bytes: doc.size_bytes,
                    created_at: Some(doc.created_at),
                    extra: Default::default(),
                },
            };
            let vectors = embedder.embed_batch(&[text.to_string()]).await.unwrap();
            index.add(&doc, &[chunk], &vectors).await.unwrap();
        }

        let engine = QaEngine::new(
            embedder,
            Arc::new(EchoCompletion),
            index,
            RetrievalConfig {
                max_results: 4,
                fetch_k: 12,
                max_sources: 4,
            },
            &CompletionConfig::default(),
        );

        AppState {
            engine: Arc::new(engine),
            cache: Arc::new(ResponseCache::new(Duration::from_secs(60))),
            limiter: Arc::new(RateLimiter::new(max_requests, Duration::from_secs(60))),
        }
    }

    fn ask(question: &str, client_id: Option<&str>) -> AskRequest {
        AskRequest {
            question: question.to_string(),
            client_id: client_id.map(|s| s.to_string()),
        }
    }

    #[tokio::test]
    async fn test_ask_returns_answer_with_sources() {
        let dir = TempDir::new().unwrap();
        let state = state_with_corpus(&dir, &["Paris is the capital of France."], 30).await;

        let Json(answer) = handle_ask(State(state), Json(ask("capital of France?", None)))
            .await
            .unwrap();
        assert!(answer.answer.contains("Paris"));
        assert_eq!(answer.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let dir = TempDir::new().unwrap();
        let state = state_with_corpus(&dir, &["content"], 30).await;

        let result = handle_ask(State(state), Json(ask("   ", None))).await;
        assert!(matches!(result, Err(AskError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_enforced_per_client() {
        let dir = TempDir::new().unwrap();
        let state = state_with_corpus(&dir, &["content here"], 2).await;

        for _ in 0..2 {
            handle_ask(State(state.clone()), Json(ask("content?", Some("alice"))))
                .await
                .unwrap();
        }
        let third = handle_ask(State(state.clone()), Json(ask("content?", Some("alice")))).await;
        assert!(matches!(third, Err(AskError::RateLimited)));

        // Another client still has budget.
        let other = handle_ask(State(state), Json(ask("content?", Some("bob")))).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_missing_client_id_shares_anonymous_budget() {
        let dir = TempDir::new().unwrap();
        let state = state_with_corpus(&dir, &["content here"], 1).await;

        handle_ask(State(state.clone()), Json(ask("content?", None)))
            .await
            .unwrap();
        let second = handle_ask(State(state), Json(ask("other question?", None))).await;
        assert!(matches!(second, Err(AskError::RateLimited)));
    }

    #[tokio::test]
    async fn test_health_reports_ready_and_empty() {
        let dir = TempDir::new().unwrap();
        let empty = state_with_corpus(&dir, &[], 30).await;
        let (status, _) = handle_health(State(empty)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let dir2 = TempDir::new().unwrap();
        let ready = state_with_corpus(&dir2, &["some content"], 30).await;
        let (status, Json(body)) = handle_health(State(ready)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.chunks, 1);
    }

    #[tokio::test]
    async fn test_router_builds() {
        let dir = TempDir::new().unwrap();
        let state = state_with_corpus(&dir, &["content"], 30).await;
        let _router = build_router(state);
    }
}
