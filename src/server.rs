//! HTTP facade over the vault.
//!
//! Thin JSON wrappers around the store and pipeline, one route per query
//! surface operation. Tenancy is selected by the `X-User-Id` header;
//! authenticating that header is the front door's job, not ours.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/items` | Submit a link, note, or topic for ingestion |
//! | `GET`  | `/items` | List items (`limit`, `offset`, optional `tag`) |
//! | `GET`  | `/items/{id}` | Fetch one item |
//! | `DELETE` | `/items/{id}` | Delete an item (cascades tags + edges) |
//! | `GET`  | `/search?q=` | Full-text search, 20 hits max |
//! | `GET`  | `/tags` | All tag names |
//! | `GET`  | `/graph` | Bounded graph snapshot `{nodes, edges}` |
//! | `POST` | `/ask` | Retrieval-augmented answer over the vault |
//! | `GET`  | `/stats` | `{items, tags}` counts |
//! | `GET`  | `/export` | Obsidian-style zip archive |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! The search expression in `q` is passed to FTS5 verbatim; deployments
//! exposing this to untrusted callers should sanitize operators upstream.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::export::export_vault;
use crate::llm::LanguageModel;
use crate::manager::VaultManager;
use crate::models::{ContentKind, Item, RawContent, Relationship, SearchResult};
use crate::pipeline::Pipeline;
use crate::vault::Vault;

const NO_SOURCES_ANSWER: &str =
    "I couldn't find any relevant items in your vault to answer this question.";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    manager: Arc<VaultManager>,
    pipeline: Arc<Pipeline>,
    llm: Arc<dyn LanguageModel>,
}

/// Starts the HTTP facade and serves until the process is terminated.
pub async fn run_server(
    bind: &str,
    manager: Arc<VaultManager>,
    pipeline: Arc<Pipeline>,
    llm: Arc<dyn LanguageModel>,
) -> anyhow::Result<()> {
    let app = router(manager, pipeline, llm);

    tracing::info!(addr = %bind, "http server listening");

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(
    manager: Arc<VaultManager>,
    pipeline: Arc<Pipeline>,
    llm: Arc<dyn LanguageModel>,
) -> Router {
    let state = AppState {
        manager,
        pipeline,
        llm,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/items", post(handle_submit).get(handle_list))
        .route("/items/{id}", get(handle_get).delete(handle_delete))
        .route("/search", get(handle_search))
        .route("/tags", get(handle_tags))
        .route("/graph", get(handle_graph))
        .route("/ask", post(handle_ask))
        .route("/stats", get(handle_stats))
        .route("/export", get(handle_export))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ Tenancy ============

fn owner_id(headers: &HeaderMap) -> Result<i64, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| bad_request("X-User-Id header required"))
}

async fn owner_vault(state: &AppState, headers: &HeaderMap) -> Result<Vault, AppError> {
    let owner = owner_id(headers)?;
    state
        .manager
        .vault(owner)
        .await
        .map_err(|e| internal_error(format!("failed to access vault: {e}")))
}

// ============ POST /items ============

#[derive(Deserialize)]
struct SubmitRequest {
    kind: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: String,
}

async fn handle_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<Item>, AppError> {
    let owner = owner_id(&headers)?;

    let kind = match req.kind.as_str() {
        "link" => ContentKind::Link,
        "note" => ContentKind::Note,
        "topic" | "search" => ContentKind::Topic,
        // Image bytes need a real upload surface; JSON is not it.
        other => return Err(bad_request(format!("unknown content type: {other}"))),
    };

    match kind {
        ContentKind::Link if req.url.trim().is_empty() => {
            return Err(bad_request("url required for link submissions"))
        }
        ContentKind::Note | ContentKind::Topic if req.text.trim().is_empty() => {
            return Err(bad_request("text required"))
        }
        _ => {}
    }

    let raw = RawContent {
        kind,
        owner_id: owner,
        url: req.url,
        text: req.text,
        language: req.language,
        ..Default::default()
    };

    let item = state
        .pipeline
        .process(raw)
        .await
        .map_err(|e| internal_error(format!("ingestion failed: {e}")))?;

    Ok(Json(item))
}

// ============ GET /items ============

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
    #[serde(default)]
    tag: Option<String>,
}

async fn handle_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Item>>, AppError> {
    let vault = owner_vault(&state, &headers).await?;

    let mut limit = params.limit.unwrap_or(20);
    if limit <= 0 || limit > 100 {
        limit = 20;
    }
    let offset = params.offset.unwrap_or(0).max(0);

    let items = match params.tag.as_deref().filter(|t| !t.is_empty()) {
        Some(tag) => vault.list_items_by_tag(tag, limit, offset).await,
        None => vault.list_items(limit, offset).await,
    }
    .map_err(|e| internal_error(format!("failed to list items: {e}")))?;

    Ok(Json(items))
}

// ============ GET/DELETE /items/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    let vault = owner_vault(&state, &headers).await?;

    let item = vault
        .get_item(&id)
        .await
        .map_err(|e| internal_error(format!("failed to get item: {e}")))?;

    match item {
        Some(item) => Ok(Json(item)),
        None => Err(not_found("item not found")),
    }
}

async fn handle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let vault = owner_vault(&state, &headers).await?;

    vault
        .delete_item(&id)
        .await
        .map_err(|e| internal_error(format!("failed to delete item: {e}")))?;

    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn handle_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchResult>>, AppError> {
    if params.q.trim().is_empty() {
        return Err(bad_request("query required"));
    }

    let vault = owner_vault(&state, &headers).await?;

    let results = vault
        .search(&params.q, 20)
        .await
        .map_err(|e| internal_error(format!("search failed: {e}")))?;

    Ok(Json(results))
}

// ============ GET /tags ============

async fn handle_tags(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, AppError> {
    let vault = owner_vault(&state, &headers).await?;

    let tags = vault
        .all_tags()
        .await
        .map_err(|e| internal_error(format!("failed to get tags: {e}")))?;

    Ok(Json(tags))
}

// ============ GET /graph ============

#[derive(Serialize)]
struct GraphResponse {
    nodes: Vec<Item>,
    edges: Vec<Relationship>,
}

async fn handle_graph(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GraphResponse>, AppError> {
    let vault = owner_vault(&state, &headers).await?;

    let (nodes, edges) = vault
        .graph()
        .await
        .map_err(|e| internal_error(format!("failed to get graph: {e}")))?;

    Ok(Json(GraphResponse { nodes, edges }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SearchResult>,
}

async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question required"));
    }

    let vault = owner_vault(&state, &headers).await?;

    let results = vault
        .search(&req.question, 5)
        .await
        .map_err(|e| internal_error(format!("search failed: {e}")))?;

    if results.is_empty() {
        return Ok(Json(AskResponse {
            answer: NO_SOURCES_ANSWER.to_string(),
            sources: Vec::new(),
        }));
    }

    let blocks: Vec<String> = results
        .iter()
        .map(|r| {
            format!(
                "Title: {}\nSummary: {}\nContent: {}",
                r.item.title,
                r.item.summary.as_deref().unwrap_or(""),
                r.item.content.as_deref().unwrap_or(""),
            )
        })
        .collect();

    let answer = state
        .llm
        .answer(&req.question, &blocks)
        .await
        .map_err(|e| internal_error(format!("failed to generate answer: {e}")))?;

    Ok(Json(AskResponse {
        answer,
        sources: results,
    }))
}

// ============ GET /stats ============

#[derive(Serialize)]
struct StatsResponse {
    items: i64,
    tags: usize,
}

async fn handle_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, AppError> {
    let vault = owner_vault(&state, &headers).await?;

    let items = vault.item_count().await.unwrap_or(0);
    let tags = vault.all_tags().await.unwrap_or_default();

    Ok(Json(StatsResponse {
        items,
        tags: tags.len(),
    }))
}

// ============ GET /export ============

async fn handle_export(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let vault = owner_vault(&state, &headers).await?;

    let archive = export_vault(&vault)
        .await
        .map_err(|e| internal_error(format!("failed to export: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=stash-export.zip",
            ),
        ],
        archive,
    )
        .into_response())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
