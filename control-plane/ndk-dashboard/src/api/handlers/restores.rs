use crate::{
    api::views::{MessageResponse, NamespaceQuery},
    cache::CacheKey,
    errors::ApiError,
    server::AppState,
    services::{
        RestoreRequest, RestoreResult,
        restore::{CleanupSummary, RestoreJobSummary, RestoreProgress, RestoreStatusView},
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{error, info};

pub async fn restore_snapshot(
    State(state): State<AppState>,
    Json(req): Json<RestoreRequest>,
) -> Result<(StatusCode, Json<RestoreResult>), ApiError> {
    info!(
        "API: Restoring snapshot {}/{} (target={:?}, newName={:?})",
        req.source_namespace, req.snapshot_name, req.target_namespace, req.new_app_name
    );
    let result = state.restores.restore_snapshot(req).await.map_err(|e| {
        error!("Restore failed: {}", e);
        ApiError::from(e)
    })?;
    state
        .cache
        .invalidate(&[CacheKey::Applications, CacheKey::RestoreJobs])
        .await;
    Ok((StatusCode::ACCEPTED, Json(result)))
}

pub async fn list_restore_jobs(
    State(state): State<AppState>,
    Query(q): Query<NamespaceQuery>,
) -> Result<Json<Vec<RestoreJobSummary>>, ApiError> {
    let jobs = match q.namespace.as_deref().filter(|n| !n.is_empty()) {
        Some(ns) => state.restores.list_restore_jobs(Some(ns)).await?,
        None => {
            state
                .cache
                .get_or_fetch(CacheKey::RestoreJobs, || {
                    state.restores.list_restore_jobs(None)
                })
                .await?
        }
    };
    Ok(Json(jobs))
}

pub async fn restore_status(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<RestoreStatusView>, ApiError> {
    Ok(Json(state.restores.restore_status(&ns, &name).await?))
}

pub async fn restore_progress(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<RestoreProgress>, ApiError> {
    Ok(Json(state.restores.restore_progress(&ns, &name).await?))
}

pub async fn delete_restore_job(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("API: Deleting restore job {}/{}", ns, name);
    let deleted = state.restores.delete_restore_job(&ns, &name).await?;
    state.cache.invalidate(&[CacheKey::RestoreJobs]).await;
    let message = if deleted {
        format!("Restore job {} deleted", name)
    } else {
        format!("Restore job {} was already deleted", name)
    };
    Ok(Json(MessageResponse::new(message)))
}

pub async fn delete_completed_restore_jobs(
    State(state): State<AppState>,
    Query(q): Query<NamespaceQuery>,
) -> Result<Json<CleanupSummary>, ApiError> {
    info!("API: Deleting completed restore jobs (namespace={:?})", q.namespace);
    let ns = q.namespace.as_deref().filter(|n| !n.is_empty());
    let summary = state.restores.delete_completed_restore_jobs(ns).await?;
    state.cache.invalidate(&[CacheKey::RestoreJobs]).await;
    Ok(Json(summary))
}
