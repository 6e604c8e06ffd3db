use crate::{
    api::views::{DeleteAppQuery, LabelUpdate, LabelsResponse},
    cache::CacheKey,
    errors::ApiError,
    server::AppState,
    services::{
        DeleteResult,
        applications::{ApplicationSummary, PodSummary, PvcSummary},
        restore::RestoreProgress,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::info;

pub async fn list_applications(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApplicationSummary>>, ApiError> {
    let apps = state
        .cache
        .get_or_fetch(CacheKey::Applications, || {
            state.applications.list_applications()
        })
        .await?;
    Ok(Json(apps))
}

pub async fn get_application(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<ApplicationSummary>, ApiError> {
    Ok(Json(state.applications.get_application(&ns, &name).await?))
}

pub async fn application_pods(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<Vec<PodSummary>>, ApiError> {
    Ok(Json(state.applications.application_pods(&ns, &name).await?))
}

pub async fn application_pvcs(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<Vec<PvcSummary>>, ApiError> {
    Ok(Json(state.applications.application_pvcs(&ns, &name).await?))
}

pub async fn update_labels(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
    Json(update): Json<LabelUpdate>,
) -> Result<Json<LabelsResponse>, ApiError> {
    info!(
        "API: Updating labels on {}/{} (set={}, remove={})",
        ns,
        name,
        update.set.len(),
        update.remove.len()
    );
    let labels = state
        .applications
        .update_labels(&ns, &name, &update.set, &update.remove)
        .await?;
    state.cache.invalidate(&[CacheKey::Applications]).await;
    Ok(Json(LabelsResponse { labels }))
}

pub async fn delete_application(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
    Query(q): Query<DeleteAppQuery>,
) -> Result<Json<DeleteResult>, ApiError> {
    info!(
        "API: Deleting application {}/{} (force={}, appOnly={})",
        ns, name, q.force, q.app_only
    );
    let result = state
        .applications
        .delete_application(&ns, &name, q.force, q.app_only)
        .await?;
    state
        .cache
        .invalidate(&[
            CacheKey::Applications,
            CacheKey::Snapshots,
            CacheKey::ProtectionPlans,
        ])
        .await;
    Ok(Json(result))
}

pub async fn application_restore_progress(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<RestoreProgress>, ApiError> {
    Ok(Json(
        state.restores.application_restore_progress(&ns, &name).await?,
    ))
}
