//! JSON HTTP API.
//!
//! Every pipeline operation is a named tool behind `POST /tools/{name}`,
//! taking a JSON object and answering `{ "result": … }`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//!
//! # Tools
//!
//! | Name | Parameters | Result |
//! |------|------------|--------|
//! | `index_chunk` | `content, file_path, line_start, line_end` | `{ id }` |
//! | `similarity_search` | `query, top_k?, min_score?` | code matches |
//! | `search_documentation` | `query, top_k?, min_score?` | doc matches |
//! | `search_commits` | `query, top_k?, min_score?` | commit matches |
//! | `get_commit_context` | `file_path, max_commits?` | commits, newest first |
//! | `build_rag_context` | `target_code, file_path` | the assembled context |
//! | `format_prompt` | `target_code, file_path` | `{ prompt, degraded }` |
//! | `explain` | `target_code, file_path` | `{ model, explanation, prompt, context }` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid input: target_code must not be empty" } }
//! ```
//!
//! A body that is not a JSON object (or lacks the JSON content type) is a
//! `bad_request` too.
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `not_found` | 404 |
//! | `embedding_error`, `query_error`, `generation_error` | 502 |
//! | `store_error` | 500 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser editors can
//! call the API directly.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use code_lens_core::models::Collection;

use crate::config::Config;
use crate::error::LensError;
use crate::service::Lens;

/// Open the configured database and serve until the process is stopped.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let lens = Lens::open(config).await?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("code-lens listening on http://{}", bind_addr);
    axum::serve(listener, router(lens)).await?;

    Ok(())
}

/// Build the application router around an opened [`Lens`].
pub fn router(lens: Lens) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/{name}", post(handle_tool_call))
        .layer(cors)
        .with_state(lens)
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

impl From<LensError> for AppError {
    fn from(err: LensError) -> Self {
        let status = match err.code() {
            "bad_request" => StatusCode::BAD_REQUEST,
            "store_error" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        if status != StatusCode::BAD_REQUEST {
            warn!(code = err.code(), error = %err, "tool call failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
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

// ============ POST /tools/{name} ============

#[derive(Deserialize)]
struct IndexChunkParams {
    content: String,
    file_path: String,
    line_start: u32,
    line_end: u32,
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    top_k: Option<usize>,
    min_score: Option<f32>,
}

#[derive(Deserialize)]
struct CommitContextParams {
    file_path: String,
    max_commits: Option<usize>,
}

#[derive(Deserialize)]
struct TargetParams {
    target_code: String,
    file_path: String,
}

fn parse_params<T: DeserializeOwned>(tool: &str, params: Value) -> Result<T, AppError> {
    serde_json::from_value(params)
        .map_err(|e| bad_request(format!("{}: invalid parameters: {}", tool, e)))
}

fn to_result<T: Serialize>(value: T) -> Result<Json<Value>, AppError> {
    let result = serde_json::to_value(value).map_err(|e| AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: e.to_string(),
    })?;
    Ok(Json(json!({ "result": result })))
}

async fn handle_tool_call(
    State(lens): State<Lens>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(params) =
        body.map_err(|e| bad_request(format!("{}: invalid request body: {}", name, e.body_text())))?;
    let retrieval = &lens.config().retrieval;

    match name.as_str() {
        "index_chunk" => {
            let p: IndexChunkParams = parse_params(&name, params)?;
            let id = lens
                .index_chunk(&p.content, &p.file_path, p.line_start, p.line_end)
                .await?;
            info!(id = %id, "indexed chunk via api");
            to_result(json!({ "id": id }))
        }
        "similarity_search" | "search_documentation" | "search_commits" => {
            let (collection, default_k) = match name.as_str() {
                "similarity_search" => (Collection::Code, retrieval.code_top_k),
                "search_documentation" => (Collection::Docs, retrieval.docs_top_k),
                _ => (Collection::Commits, retrieval.commit_limit),
            };
            let p: SearchParams = parse_params(&name, params)?;
            let matches = lens
                .search(collection, &p.query, p.top_k.unwrap_or(default_k), p.min_score)
                .await?;
            to_result(matches)
        }
        "get_commit_context" => {
            let p: CommitContextParams = parse_params(&name, params)?;
            let commits = lens
                .commit_history(&p.file_path, p.max_commits.unwrap_or(retrieval.commit_limit))
                .await?;
            to_result(commits)
        }
        "build_rag_context" => {
            let p: TargetParams = parse_params(&name, params)?;
            to_result(lens.build_context(&p.target_code, &p.file_path).await?)
        }
        "format_prompt" => {
            let p: TargetParams = parse_params(&name, params)?;
            let context = lens.build_context(&p.target_code, &p.file_path).await?;
            let prompt = lens.format_prompt(&context);
            to_result(json!({ "prompt": prompt, "degraded": context.degraded }))
        }
        "explain" => {
            let p: TargetParams = parse_params(&name, params)?;
            to_result(lens.explain(&p.target_code, &p.file_path).await?)
        }
        _ => Err(not_found(format!("no tool registered with name: {}", name))),
    }
}
