use ndk_k8s::{ResourceClient, ResourceKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::crd::{ApplicationSnapshot, SnapshotState};
use crate::errors::DashboardResult;
use crate::services::kube_ops::{delete_tolerant, list_typed, timestamp};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub name: String,
    pub namespace: String,
    pub application: String,
    pub state: SnapshotState,
    pub created: Option<String>,
    pub expires_after: Option<String>,
    pub expiration_time: Option<String>,
    pub consistency_type: Option<String>,
    pub protection_plan: Option<String>,
}

impl SnapshotSummary {
    pub fn from_snapshot(s: &ApplicationSnapshot) -> Self {
        let status = s.status.as_ref();
        Self {
            name: s.metadata.name.clone().unwrap_or_default(),
            namespace: s.metadata.namespace.clone().unwrap_or_default(),
            application: s.app_name().to_string(),
            state: s.state(),
            created: s.creation_time(),
            expires_after: s.spec.expires_after.clone(),
            expiration_time: status.and_then(|st| st.expiration_time.clone()),
            consistency_type: status.and_then(|st| st.consistency_type.clone()),
            protection_plan: s.plan_name().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRef {
    pub name: String,
    pub namespace: String,
    pub application: String,
}

/// Target of one bulk snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct AppTarget {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedItem {
    pub name: String,
    pub namespace: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BulkResult {
    pub successful: Vec<SnapshotRef>,
    pub failed: Vec<FailedItem>,
}

pub struct SnapshotService {
    client: Arc<dyn ResourceClient>,
    default_expires_after: String,
}

impl SnapshotService {
    pub fn new(client: Arc<dyn ResourceClient>, default_expires_after: String) -> Self {
        Self {
            client,
            default_expires_after,
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn create_snapshot(
        &self,
        ns: &str,
        app: &str,
        expires_after: Option<&str>,
    ) -> DashboardResult<SnapshotRef> {
        let name = format!("{}-snapshot-{}", app, timestamp());
        let expires = expires_after
            .filter(|e| !e.is_empty())
            .unwrap_or(self.default_expires_after.as_str());
        let snap = ApplicationSnapshot::for_app(&name, ns, app, expires);
        self.client
            .create(
                ResourceKind::ApplicationSnapshot,
                Some(ns),
                ndk_k8s::encode(&snap)?,
            )
            .await?;
        info!(%ns, %app, snapshot = %name, "snapshot created");
        Ok(SnapshotRef {
            name,
            namespace: ns.to_string(),
            application: app.to_string(),
        })
    }

    /// One snapshot per target; a failure never stops the batch.
    pub async fn bulk_create_snapshots(
        &self,
        targets: &[AppTarget],
        expires_after: Option<&str>,
    ) -> BulkResult {
        let mut result = BulkResult::default();
        for t in targets {
            match self.create_snapshot(&t.namespace, &t.name, expires_after).await {
                Ok(r) => result.successful.push(r),
                Err(e) => {
                    warn!(ns = %t.namespace, app = %t.name, error = %e, "bulk snapshot failed");
                    result.failed.push(FailedItem {
                        name: t.name.clone(),
                        namespace: t.namespace.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            successful = result.successful.len(),
            failed = result.failed.len(),
            "bulk snapshot finished"
        );
        result
    }

    pub async fn list_snapshots(&self) -> DashboardResult<Vec<SnapshotSummary>> {
        let snaps: Vec<ApplicationSnapshot> = list_typed(
            self.client.as_ref(),
            ResourceKind::ApplicationSnapshot,
            None,
            None,
        )
        .await?;
        Ok(snaps.iter().map(SnapshotSummary::from_snapshot).collect())
    }

    /// Returns whether the snapshot still existed.
    pub async fn delete_snapshot(&self, ns: &str, name: &str) -> DashboardResult<bool> {
        let deleted = delete_tolerant(
            self.client.as_ref(),
            ResourceKind::ApplicationSnapshot,
            Some(ns),
            name,
        )
        .await?;
        info!(%ns, %name, deleted, "snapshot delete");
        Ok(deleted)
    }
}
