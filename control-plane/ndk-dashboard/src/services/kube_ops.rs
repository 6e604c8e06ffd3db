use chrono::Utc;
use ndk_k8s::{
    ClientResult, ClientResultExt, ResourceClient, ResourceKind, decode, encode,
    object_name,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::debug;

use crate::errors::DashboardResult;
use crate::services::deployment::manifests;

/// Suffix used in generated snapshot and restore names.
pub fn timestamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Create `ns` when a read returns 404. Returns whether it was created.
pub async fn ensure_namespace(client: &dyn ResourceClient, ns: &str) -> DashboardResult<bool> {
    if client
        .get(ResourceKind::Namespace, None, ns)
        .await
        .or_not_found()?
        .is_some()
    {
        return Ok(false);
    }
    let created = create_tolerant(client, ResourceKind::Namespace, None, &manifests::namespace(ns))
        .await?;
    if created {
        debug!(%ns, "created namespace");
    }
    Ok(created)
}

/// Create an object, absorbing 409. Returns whether it was created.
pub async fn create_tolerant<K: Serialize>(
    client: &dyn ResourceClient,
    kind: ResourceKind,
    ns: Option<&str>,
    obj: &K,
) -> DashboardResult<bool> {
    let body = encode(obj)?;
    let name = object_name(&body).to_string();
    match client.create(kind, ns, body).await.or_conflict()? {
        Some(_) => Ok(true),
        None => {
            debug!(%kind, ns = ns.unwrap_or_default(), %name, "already exists");
            Ok(false)
        }
    }
}

/// Clear `metadata.finalizers`. `None` when the object is already gone.
pub async fn strip_finalizers(
    client: &dyn ResourceClient,
    kind: ResourceKind,
    ns: Option<&str>,
    name: &str,
) -> ClientResult<Option<Value>> {
    client
        .patch(kind, ns, name, json!({"metadata": {"finalizers": []}}))
        .await
        .or_not_found()
}

/// Delete absorbing 404. Returns whether something was deleted.
pub async fn delete_tolerant(
    client: &dyn ResourceClient,
    kind: ResourceKind,
    ns: Option<&str>,
    name: &str,
) -> ClientResult<bool> {
    Ok(client.delete(kind, ns, name).await.or_not_found()?.is_some())
}

pub async fn get_typed<K: DeserializeOwned>(
    client: &dyn ResourceClient,
    kind: ResourceKind,
    ns: Option<&str>,
    name: &str,
) -> DashboardResult<K> {
    Ok(decode(client.get(kind, ns, name).await?)?)
}

pub async fn list_typed<K: DeserializeOwned>(
    client: &dyn ResourceClient,
    kind: ResourceKind,
    ns: Option<&str>,
    label_selector: Option<&str>,
) -> DashboardResult<Vec<K>> {
    client
        .list(kind, ns, label_selector)
        .await?
        .into_iter()
        .map(|v| decode(v).map_err(Into::into))
        .collect()
}
