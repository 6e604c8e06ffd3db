use crate::{
    cache::CacheKey, errors::ApiError, server::AppState,
    services::storage::StorageClusterView,
};
use axum::{Json, extract::State};

pub async fn list_storage_clusters(
    State(state): State<AppState>,
) -> Result<Json<Vec<StorageClusterView>>, ApiError> {
    let clusters = state
        .cache
        .get_or_fetch(CacheKey::StorageClusters, || {
            state.storage.list_storage_clusters()
        })
        .await?;
    Ok(Json(clusters))
}
