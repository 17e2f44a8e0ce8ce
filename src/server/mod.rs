// HTTP API surface
//
// - `GET  /api/health` — advisory diagnostic, `{ok: bool}`
// - `POST /api/chat`   — `{question, k, rebuild}` -> `{answer}`
//
// The vector index handle is built lazily on the first chat request and
// shared across requests. A rebuild racing concurrent queries is not
// serialized beyond swapping the handle; this is a known limitation
// accepted for single-user traffic.


use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::commands::run_health_check;
use crate::config::Config;
use crate::index::BookIndex;
use crate::openai::OpenAiClient;
use crate::rag::Librarian;
use crate::Result;

pub const DEFAULT_K: usize = 3;
pub const MAX_K: usize = 8;

pub struct AppState {
    config: Config,
    catalog: Catalog,
    client: OpenAiClient,
    index: tokio::sync::RwLock<Option<Arc<BookIndex>>>,
}

impl AppState {
    #[inline]
    pub fn new(config: Config, catalog: Catalog, client: OpenAiClient) -> Self {
        Self {
            config,
            catalog,
            client,
            index: tokio::sync::RwLock::new(None),
        }
    }

    /// Get the shared index handle, building it on first use or when a
    /// rebuild was requested.
    async fn get_index(&self, rebuild: bool) -> Result<Arc<BookIndex>> {
        if !rebuild {
            let guard = self.index.read().await;
            if let Some(index) = guard.as_ref() {
                return Ok(Arc::clone(index));
            }
        }

        let index = BookIndex::open(&self.config).await?;
        index
            .build_or_load(&self.client, &self.catalog, rebuild)
            .await?;

        let index = Arc::new(index);
        let mut guard = self.index.write().await;
        *guard = Some(Arc::clone(&index));
        Ok(index)
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub rebuild: bool,
}

fn default_k() -> usize {
    DEFAULT_K
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[inline]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api_health))
        .route("/api/chat", post(api_chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn api_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ok = run_health_check(&state.config);
    Json(HealthResponse { ok })
}

/// Validate a chat request body before touching any external service.
fn validate_chat_request(request: &ChatRequest) -> std::result::Result<(), String> {
    if request.question.trim().is_empty() {
        return Err("question must be a non-empty string".to_string());
    }
    if request.k < 1 || request.k > MAX_K {
        return Err(format!("k must be between 1 and {}", MAX_K));
    }
    Ok(())
}

async fn api_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<ChatResponse>, (StatusCode, Json<ErrorDetail>)> {
    if let Err(detail) = validate_chat_request(&request) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorDetail { detail }),
        ));
    }

    info!("Chat request (k={}, rebuild={})", request.k, request.rebuild);

    match answer_question(&state, &request).await {
        Ok(answer) => Ok(Json(ChatResponse { answer })),
        Err(e) => {
            error!("Chat request failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorDetail {
                    detail: e.to_string(),
                }),
            ))
        }
    }
}

async fn answer_question(state: &AppState, request: &ChatRequest) -> Result<String> {
    let index = state.get_index(request.rebuild).await?;
    let retrieved = index
        .search(&state.client, &request.question, request.k)
        .await?;
    let librarian = Librarian::new(&state.client, &state.catalog);
    librarian.answer(&request.question, &retrieved)
}
