use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use scanner_core::AnalysisReport;
use scanner_engine::{Analyzer, EngineError, ModelClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub scenario: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Engine(EngineError::EmptyScenario) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub fn router<C: ModelClient + 'static>(analyzer: Arc<Analyzer<C>>) -> Router {
    Router::new()
        .route("/analyze", post(analyze::<C>))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(analyzer)
}

pub async fn serve(app: Router, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("audit scanner API listening on http://{}", listener.local_addr()?);
    info!("  POST /analyze - analyze a scenario");
    info!("  GET  /health  - health check");
    axum::serve(listener, app).await
}

async fn analyze<C: ModelClient>(
    State(analyzer): State<Arc<Analyzer<C>>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let report = analyzer.analyze(&req.scenario).await.inspect_err(|e| {
        tracing::error!(error = %e, "analysis failed");
    })?;
    Ok(Json(report))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
