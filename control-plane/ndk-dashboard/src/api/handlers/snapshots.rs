use crate::{
    api::views::{BulkSnapshotRequest, CreateSnapshotRequest, MessageResponse},
    cache::CacheKey,
    errors::ApiError,
    server::AppState,
    services::snapshots::{BulkResult, SnapshotRef, SnapshotSummary},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

pub async fn list_snapshots(
    State(state): State<AppState>,
) -> Result<Json<Vec<SnapshotSummary>>, ApiError> {
    let snaps = state
        .cache
        .get_or_fetch(CacheKey::Snapshots, || state.snapshots.list_snapshots())
        .await?;
    Ok(Json(snaps))
}

pub async fn create_snapshot(
    State(state): State<AppState>,
    Json(req): Json<CreateSnapshotRequest>,
) -> Result<(StatusCode, Json<SnapshotRef>), ApiError> {
    info!(
        "API: Creating snapshot of {}/{}",
        req.namespace, req.application_name
    );
    let snap = state
        .snapshots
        .create_snapshot(
            &req.namespace,
            &req.application_name,
            req.expires_after.as_deref(),
        )
        .await?;
    state.cache.invalidate(&[CacheKey::Snapshots]).await;
    Ok((StatusCode::CREATED, Json(snap)))
}

/// 207 when any item failed.
pub async fn bulk_create_snapshots(
    State(state): State<AppState>,
    Json(req): Json<BulkSnapshotRequest>,
) -> Result<(StatusCode, Json<BulkResult>), ApiError> {
    if req.applications.is_empty() {
        return Err(ApiError::BadRequest(
            "No applications specified".to_string(),
        ));
    }
    info!("API: Creating {} snapshots", req.applications.len());
    let result = state
        .snapshots
        .bulk_create_snapshots(&req.applications, req.expires_after.as_deref())
        .await;
    state.cache.invalidate(&[CacheKey::Snapshots]).await;
    let status = if result.failed.is_empty() {
        StatusCode::CREATED
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(result)))
}

pub async fn delete_snapshot(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!("API: Deleting snapshot {}/{}", ns, name);
    let deleted = state.snapshots.delete_snapshot(&ns, &name).await?;
    state.cache.invalidate(&[CacheKey::Snapshots]).await;
    let message = if deleted {
        format!("Snapshot {} deleted", name)
    } else {
        format!("Snapshot {} was already deleted", name)
    };
    Ok(Json(MessageResponse::new(message)))
}
