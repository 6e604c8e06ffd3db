use crate::{
    api::views::{ForceQuery, MessageResponse},
    cache::CacheKey,
    errors::ApiError,
    server::AppState,
    services::{
        TriggerResult,
        protection_plans::{CreatePlanRequest, PlanCreated, PlanDeleteResult, PlanSummary},
        snapshots::SnapshotSummary,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::info;

pub async fn list_protection_plans(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlanSummary>>, ApiError> {
    let plans = state
        .cache
        .get_or_fetch(CacheKey::ProtectionPlans, || {
            state.protection_plans.list_protection_plans()
        })
        .await?;
    Ok(Json(plans))
}

pub async fn create_protection_plan(
    State(state): State<AppState>,
    Json(req): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<PlanCreated>), ApiError> {
    info!(
        "API: Creating protection plan {}/{}",
        req.namespace, req.name
    );
    let created = state.protection_plans.create_protection_plan(req).await?;
    state.cache.invalidate(&[CacheKey::ProtectionPlans]).await;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn enable_protection_plan(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("API: Enabling protection plan {}/{}", ns, name);
    state.protection_plans.set_suspended(&ns, &name, false).await?;
    state.cache.invalidate(&[CacheKey::ProtectionPlans]).await;
    Ok(Json(MessageResponse::new(format!(
        "Protection plan {} enabled",
        name
    ))))
}

pub async fn disable_protection_plan(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("API: Disabling protection plan {}/{}", ns, name);
    state.protection_plans.set_suspended(&ns, &name, true).await?;
    state.cache.invalidate(&[CacheKey::ProtectionPlans]).await;
    Ok(Json(MessageResponse::new(format!(
        "Protection plan {} disabled",
        name
    ))))
}

pub async fn delete_protection_plan(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
    Query(q): Query<ForceQuery>,
) -> Result<Json<PlanDeleteResult>, ApiError> {
    info!(
        "API: Deleting protection plan {}/{} (force={})",
        ns, name, q.force
    );
    let result = state
        .protection_plans
        .delete_protection_plan(&ns, &name, q.force)
        .await?;
    state.cache.invalidate(&[CacheKey::ProtectionPlans]).await;
    Ok(Json(result))
}

pub async fn plan_history(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<Vec<SnapshotSummary>>, ApiError> {
    Ok(Json(state.protection_plans.plan_history(&ns, &name).await?))
}

/// 207 when some snapshots failed.
pub async fn trigger_protection_plan(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<(StatusCode, Json<TriggerResult>), ApiError> {
    info!("API: Triggering protection plan {}/{}", ns, name);
    let result = state.protection_plans.trigger(&ns, &name).await?;
    state
        .cache
        .invalidate(&[CacheKey::Snapshots, CacheKey::ProtectionPlans])
        .await;
    let status = if result.failed_snapshots.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(result)))
}
