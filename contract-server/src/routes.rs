//! HTTP routes.
//!
//! - `POST /execute` runs one contract-checked execution
//! - `GET /health` reports liveness and the configured roots
//! - `GET /templates` lists discoverable template ids

use std::path::PathBuf;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use contract_kernel::ContractExecutor;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

/// State shared by every route.
#[derive(Clone, Debug)]
pub struct AppState {
    executor: ContractExecutor,
    templates_dir: PathBuf,
    schemas_dir: PathBuf,
}

impl AppState {
    /// Creates route state around `executor`.
    ///
    /// The directories are only reported by `/health`.
    #[must_use]
    pub fn new(
        executor: ContractExecutor,
        templates_dir: impl Into<PathBuf>,
        schemas_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            templates_dir: templates_dir.into(),
            schemas_dir: schemas_dir.into(),
        }
    }
}

/// Errors from routes other than `/execute`, which reports its own failures.
#[derive(Debug)]
pub enum ApiError {
    /// No route matched.
    NotFound(String),
    /// The service could not complete the request.
    Internal(String),
}

impl ApiError {
    /// Machine-readable code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "SERVER_MISCONFIGURATION",
        }
    }

    /// HTTP status.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = match self {
            ApiError::NotFound(message) | ApiError::Internal(message) => message,
        };
        (status, Json(json!({ "message": message, "code": code }))).into_response()
    }
}

/// Builds the router with request tracing.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(execute))
        .route("/health", get(health_check))
        .route("/templates", get(list_templates))
        .fallback(unknown_route)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /execute
///
/// The body is read raw so that a missing or malformed body is reported in
/// the same shape as every other execution failure.
async fn execute(State(state): State<AppState>, body: Bytes) -> Response {
    let body = (!body.is_empty()).then_some(&body[..]);
    let outcome = state.executor.execute_body(body).await;
    let status =
        StatusCode::from_u16(outcome.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome.body())).into_response()
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "templates_dir": state.templates_dir.display().to_string(),
        "schemas_dir": state.schemas_dir.display().to_string(),
    }))
}

/// GET /templates
async fn list_templates(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let templates = state.executor.templates().discover().await.map_err(|err| {
        error!(%err, "template discovery failed");
        ApiError::Internal(err.to_string())
    })?;
    Ok(Json(json!({ "templates": templates })))
}

async fn unknown_route() -> ApiError {
    ApiError::NotFound("no such route".to_owned())
}
