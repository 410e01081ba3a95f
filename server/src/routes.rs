//! HTTP surface: route table, error envelope, and the inbound throttle.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use sift_core::{
    Document, IndexRequest, SearchEngine, SearchError, SearchRequest,
};

/// Token-bucket throttle for inbound requests; overflow answers 429 with
/// `Retry-After`.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    per_sec: f64,
    burst: f64,
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl RateLimiter {
    pub fn new(per_sec: u32) -> Self {
        let per_sec = f64::from(per_sec.max(1));
        Self {
            bucket: Mutex::new(Bucket {
                tokens: per_sec,
                refilled_at: Instant::now(),
            }),
            per_sec,
            burst: per_sec,
        }
    }

    fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_sec).min(self.burst);
        bucket.refilled_at = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub limiter: RateLimiter,
}

/// Error envelope shared by every failing endpoint:
/// `{ success: false, error: { code, message, request_id } }`.
struct ApiError {
    error: SearchError,
    request_id: String,
}

impl ApiError {
    fn new(error: SearchError, request_id: impl Into<String>) -> Self {
        Self {
            error,
            request_id: request_id.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::error!(
            request_id = %self.request_id,
            code = self.error.code(),
            error = %self.error,
            "request failed"
        );
        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.error.code(),
                "message": self.error.to_string(),
                "request_id": self.request_id,
            }
        }));
        let mut response = (status, body).into_response();
        if let SearchError::RateLimited { retry_after_secs } = self.error {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(search))
        .route("/index", post(index))
        .route("/index-single", post(index_single))
        .route("/document/:id", get(get_document).delete(delete_document))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/suggest", get(suggest))
        .layer(cors)
        .with_state(state)
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.engine.new_context();
    if !state.limiter.try_acquire() {
        return Err(ApiError::new(
            SearchError::RateLimited {
                retry_after_secs: 1,
            },
            ctx.request_id(),
        ));
    }
    state
        .engine
        .search(&ctx, request)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, ctx.request_id()))
}

async fn index(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IndexRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.engine.new_context();
    state
        .engine
        .index_documents(request.types, request.force_full)
        .await
        .map(|report| Json(json!({ "success": true, "indexed": report.indexed, "skipped": report.skipped, "failed": report.failed, "duration_ms": report.duration_ms, "errors": report.errors })))
        .map_err(|e| ApiError::new(e, ctx.request_id()))
}

async fn index_single(
    State(state): State<Arc<AppState>>,
    Json(document): Json<Document>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.engine.new_context();
    state
        .engine
        .index_single(document)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, ctx.request_id()))
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.engine.new_context();
    state
        .engine
        .get_document(&id)
        .map(Json)
        .map_err(|e| ApiError::new(e, ctx.request_id()))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.engine.new_context();
    state
        .engine
        .delete_document(&id)
        .await
        .map(|()| Json(json!({ "success": true, "id": id })))
        .map_err(|e| ApiError::new(e, ctx.request_id()))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.engine.health().await;
    let status = if report.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.stats().await)
}

#[derive(Debug, Deserialize)]
struct SuggestParams {
    #[serde(default)]
    query: String,
    #[serde(default = "default_suggest_limit")]
    limit: usize,
}

fn default_suggest_limit() -> usize {
    5
}

async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestParams>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = state.engine.new_context();
    if params.query.trim().is_empty() {
        return Err(ApiError::new(
            SearchError::Validation("query parameter is required".into()),
            ctx.request_id(),
        ));
    }
    let suggestions = state.engine.suggest(&params.query, params.limit);
    Ok(Json(json!({ "suggestions": suggestions })))
}
