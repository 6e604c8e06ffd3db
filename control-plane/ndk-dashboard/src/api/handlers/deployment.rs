use crate::{
    cache::CacheKey,
    errors::ApiError,
    server::AppState,
    services::{DeployRequest, DeployResult},
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use tracing::{error, info};

pub async fn deploy(
    State(state): State<AppState>,
    Json(req): Json<DeployRequest>,
) -> Result<(StatusCode, Json<DeployResult>), ApiError> {
    info!(
        "API: Deploying {} application {}/{}",
        req.app_type, req.namespace, req.name
    );
    let result = state.deployment.deploy(req).await.map_err(|e| {
        error!("Deployment failed: {}", e);
        ApiError::from(e)
    })?;
    state
        .cache
        .invalidate(&[CacheKey::Applications, CacheKey::ProtectionPlans])
        .await;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn list_namespaces(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.deployment.list_namespaces().await?))
}

pub async fn list_worker_pools(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.deployment.list_worker_pools().await?))
}
