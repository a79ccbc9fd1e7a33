//! Route handler functions for all API endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use apothecary_augment::{AugmentedResponse, IndexInfo, ProductDescription, RecommendResponse};
use apothecary_core::error::ApothecaryError;
use apothecary_core::query::validate_top_k;
use apothecary_vector::store;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

/// Body of `POST /recommend` and `POST /rag_recommend`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
    /// Defaults to the configured `retrieval.default_top_k`.
    #[serde(default)]
    pub top_k: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub index: IndexInfo,
    pub generation_enabled: bool,
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /recommend - nearest products for a free-text query.
pub async fn recommend(
    State(state): State<AppState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let req = parse_body(payload)?;
    let k = resolve_top_k(&state, req.top_k)?;
    let response = state.orchestrator.recommend(&req.query, k).await?;
    Ok(Json(response))
}

/// POST /rag_recommend - recommendations plus a best-effort explanation.
pub async fn rag_recommend(
    State(state): State<AppState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<AugmentedResponse>, ApiError> {
    let req = parse_body(payload)?;
    let k = resolve_top_k(&state, req.top_k)?;
    let response = state.orchestrator.recommend_augmented(&req.query, k).await?;
    Ok(Json(response))
}

/// GET /products/{id}/description - generated description for one product.
pub async fn describe_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductDescription>, ApiError> {
    match state.orchestrator.describe_product(id).await {
        Ok(described) => Ok(Json(described)),
        Err(ApothecaryError::Input(msg)) => Err(ApiError::NotFound(msg)),
        Err(e) => Err(e.into()),
    }
}

/// GET /health - liveness plus the served index version.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        index: state.orchestrator.index_info(),
        generation_enabled: state.config.generation.enabled,
    })
}

/// POST /index/reload - load the persisted index pair and swap it in.
///
/// If loading fails the currently served index stays in place.
pub async fn reload_index(State(state): State<AppState>) -> Result<Json<IndexInfo>, ApiError> {
    let index_path = state.config.paths.index.clone();
    let metadata_path = state.config.paths.metadata.clone();

    let catalog = tokio::task::spawn_blocking(move || store::load(&index_path, &metadata_path))
        .await
        .map_err(|e| ApiError::Internal(format!("index load task failed: {}", e)))?
        .map_err(|e| {
            warn!(error = %e, "Index reload rejected, keeping current index");
            ApiError::from(e)
        })?;

    let info = state.orchestrator.swap_index(std::sync::Arc::new(catalog))?;
    info!(version = info.version, products = info.products, "Index reloaded");
    Ok(Json(info))
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Apply the configured default and bounds to a requested `top_k`.
fn resolve_top_k(state: &AppState, requested: Option<i64>) -> Result<usize, ApiError> {
    let retrieval = &state.config.retrieval;
    let k = validate_top_k(requested.unwrap_or(retrieval.default_top_k as i64))?;
    if k > retrieval.max_top_k {
        return Err(ApiError::BadRequest(format!(
            "top_k {} exceeds the maximum of {}",
            k, retrieval.max_top_k
        )));
    }
    Ok(k)
}
