use ndk_k8s::{
    ClientResultExt, ResourceClient, ResourceKind, decode, has_finalizers, object_name,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::TimingConfig;
use crate::crd::{AppProtectionPlan, Application, ApplicationSnapshot};
use crate::errors::{DashboardError, DashboardResult};
use crate::labels::{build_label_selector, is_system_label, user_labels};
use crate::services::kube_ops::{delete_tolerant, list_typed, strip_finalizers};

/// Namespaces whose Applications are never listed.
pub const SYSTEM_NAMESPACES: &[&str] =
    &["kube-system", "kube-public", "kube-node-lease", "ntnx-system"];

const NUTANIX_CSI_DRIVER: &str = "csi.nutanix.com";
const VOLUME_GROUP_PREFIX: &str = "NutanixVolumes-";

/// Workload kinds removed by selector on a full delete, in order.
const CASCADE_KINDS: [ResourceKind; 6] = [
    ResourceKind::StatefulSet,
    ResourceKind::Deployment,
    ResourceKind::Service,
    ResourceKind::PersistentVolumeClaim,
    ResourceKind::Secret,
    ResourceKind::ConfigMap,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub name: String,
    pub namespace: String,
    pub state: String,
    pub message: String,
    pub created: Option<String>,
    pub last_snapshot: Option<String>,
    pub selector: String,
    pub labels: BTreeMap<String, String>,
}

impl ApplicationSummary {
    fn from_app(app: &Application) -> Self {
        let name = app.metadata.name.clone().unwrap_or_default();
        let (state, message) = app.state();
        Self {
            selector: build_label_selector(app.spec.application_selector.as_ref(), &name),
            namespace: app.metadata.namespace.clone().unwrap_or_default(),
            state: state.to_string(),
            message,
            created: app
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|t| t.0.to_rfc3339()),
            last_snapshot: app
                .status
                .as_ref()
                .and_then(|s| s.last_snapshot_time.clone()),
            labels: app
                .metadata
                .labels
                .as_ref()
                .map(user_labels)
                .unwrap_or_default(),
            name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub name: String,
    pub phase: String,
    pub ready: String,
    pub restarts: u64,
    pub node: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PvcSummary {
    pub name: String,
    pub phase: String,
    pub capacity: Option<String>,
    pub storage_class: Option<String>,
    pub volume_name: Option<String>,
    pub volume_group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub message: String,
    pub cleanup_log: Vec<String>,
}

/// Ordered, human-readable record of a delete.
#[derive(Default)]
struct CleanupLog(Vec<String>);

impl CleanupLog {
    fn step(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{}", msg);
        self.0.push(msg);
    }

    fn warn(&mut self, msg: impl Into<String>) {
        let msg = format!("Warning: {}", msg.into());
        warn!("{}", msg);
        self.0.push(msg);
    }
}

pub struct ApplicationService {
    client: Arc<dyn ResourceClient>,
    timing: TimingConfig,
}

impl ApplicationService {
    pub fn new(client: Arc<dyn ResourceClient>, timing: TimingConfig) -> Self {
        Self { client, timing }
    }

    pub async fn list_applications(&self) -> DashboardResult<Vec<ApplicationSummary>> {
        let apps: Vec<Application> =
            list_typed(self.client.as_ref(), ResourceKind::Application, None, None).await?;
        Ok(apps
            .iter()
            .filter(|a| {
                !SYSTEM_NAMESPACES.contains(&a.metadata.namespace.as_deref().unwrap_or_default())
            })
            .map(ApplicationSummary::from_app)
            .collect())
    }

    pub async fn get_application(
        &self,
        ns: &str,
        name: &str,
    ) -> DashboardResult<ApplicationSummary> {
        Ok(ApplicationSummary::from_app(&self.fetch(ns, name).await?))
    }

    async fn fetch(&self, ns: &str, name: &str) -> DashboardResult<Application> {
        match self
            .client
            .get(ResourceKind::Application, Some(ns), name)
            .await
            .or_not_found()?
        {
            Some(v) => Ok(decode(v)?),
            None => Err(DashboardError::NotFound(format!(
                "Application {}/{} not found",
                ns, name
            ))),
        }
    }

    async fn selector_of(&self, ns: &str, name: &str) -> DashboardResult<String> {
        let app = self.fetch(ns, name).await?;
        Ok(build_label_selector(app.spec.application_selector.as_ref(), name))
    }

    pub async fn application_pods(&self, ns: &str, name: &str) -> DashboardResult<Vec<PodSummary>> {
        let selector = self.selector_of(ns, name).await?;
        let pods = self
            .client
            .list(ResourceKind::Pod, Some(ns), Some(&selector))
            .await?;
        Ok(pods.iter().map(pod_summary).collect())
    }

    pub async fn application_pvcs(&self, ns: &str, name: &str) -> DashboardResult<Vec<PvcSummary>> {
        let selector = self.selector_of(ns, name).await?;
        let pvcs = self
            .client
            .list(ResourceKind::PersistentVolumeClaim, Some(ns), Some(&selector))
            .await?;
        let mut out = Vec::with_capacity(pvcs.len());
        for pvc in &pvcs {
            let volume_name = str_at(pvc, "/spec/volumeName");
            let volume_group_id = match &volume_name {
                Some(pv) => self.volume_group_of(pv).await?,
                None => None,
            };
            out.push(PvcSummary {
                name: object_name(pvc).to_string(),
                phase: str_at(pvc, "/status/phase").unwrap_or_else(|| "Unknown".into()),
                capacity: str_at(pvc, "/status/capacity/storage"),
                storage_class: str_at(pvc, "/spec/storageClassName"),
                volume_name,
                volume_group_id,
            });
        }
        Ok(out)
    }

    async fn volume_group_of(&self, pv: &str) -> DashboardResult<Option<String>> {
        let Some(pv) = self
            .client
            .get(ResourceKind::PersistentVolume, None, pv)
            .await
            .or_not_found()?
        else {
            return Ok(None);
        };
        if pv.pointer("/spec/csi/driver").and_then(Value::as_str) != Some(NUTANIX_CSI_DRIVER) {
            return Ok(None);
        }
        Ok(pv
            .pointer("/spec/csi/volumeHandle")
            .and_then(Value::as_str)
            .and_then(|h| h.strip_prefix(VOLUME_GROUP_PREFIX))
            .map(str::to_string))
    }

    /// Merge user labels into an Application. Protected keys in `set` are
    /// skipped; keys in `remove` are always removed.
    #[instrument(level = "debug", skip(self, set, remove))]
    pub async fn update_labels(
        &self,
        ns: &str,
        name: &str,
        set: &BTreeMap<String, String>,
        remove: &[String],
    ) -> DashboardResult<BTreeMap<String, String>> {
        let mut patch = Map::new();
        for (k, v) in set {
            if is_system_label(k) {
                warn!(%ns, %name, key = %k, "ignoring protected label");
                continue;
            }
            patch.insert(k.clone(), json!(v));
        }
        for k in remove {
            patch.insert(k.clone(), Value::Null);
        }
        if patch.is_empty() {
            return Ok(self.get_application(ns, name).await?.labels);
        }
        let updated = self
            .client
            .patch(
                ResourceKind::Application,
                Some(ns),
                name,
                json!({"metadata": {"labels": patch}}),
            )
            .await
            .or_not_found()?
            .ok_or_else(|| {
                DashboardError::NotFound(format!("Application {}/{} not found", ns, name))
            })?;
        let app: Application = decode(updated)?;
        info!(%ns, %name, "labels updated");
        Ok(app.metadata.labels.as_ref().map(user_labels).unwrap_or_default())
    }

    /// Remove an Application and, unless `app_only`, everything it owns.
    #[instrument(level = "info", skip(self))]
    pub async fn delete_application(
        &self,
        ns: &str,
        name: &str,
        force: bool,
        app_only: bool,
    ) -> DashboardResult<DeleteResult> {
        let existing = self
            .client
            .get(ResourceKind::Application, Some(ns), name)
            .await
            .or_not_found()?;
        let mut log = CleanupLog::default();

        if app_only {
            return self.delete_app_only(ns, name, existing, log).await;
        }

        let selector = match &existing {
            Some(v) => {
                let app: Application = decode(v.clone())?;
                build_label_selector(app.spec.application_selector.as_ref(), name)
            }
            None => build_label_selector(None, name),
        };

        // 1. Snapshots
        let deleted_snapshots = self.delete_snapshots(ns, name, force, &mut log).await;
        log.step(format!("✓ Deleted {} snapshots", deleted_snapshots));

        // 2. Protection plan links
        let deleted_links = self.delete_links(ns, name, force, &mut log).await;
        log.step(format!("✓ Deleted {} AppProtectionPlans", deleted_links));

        // 3. Let snapshot finalizers run before the Application goes
        if deleted_snapshots > 0 {
            self.wait_for_snapshots(ns, name, &mut log).await;
        }

        // 4. Workloads owned through the selector
        self.delete_workloads(ns, &selector, &mut log).await;

        // 5. The Application itself
        self.delete_app_resource(ns, name, force, existing.is_some(), &mut log)
            .await?;

        Ok(DeleteResult {
            message: format!(
                "Application {} and all associated resources deleted successfully",
                name
            ),
            cleanup_log: log.0,
        })
    }

    async fn delete_app_only(
        &self,
        ns: &str,
        name: &str,
        existing: Option<Value>,
        mut log: CleanupLog,
    ) -> DashboardResult<DeleteResult> {
        let client = self.client.as_ref();
        match existing {
            Some(app) => {
                if has_finalizers(&app) {
                    match strip_finalizers(client, ResourceKind::Application, Some(ns), name)
                        .await
                    {
                        Ok(Some(_)) => log.step("Removed finalizers from Application"),
                        Ok(None) => {}
                        Err(e) => log.warn(format!(
                            "Could not remove finalizers from Application {}: {}",
                            name, e
                        )),
                    }
                }
                if delete_tolerant(client, ResourceKind::Application, Some(ns), name).await? {
                    log.step(format!("✓ Deleted Application CRD: {}", name));
                } else {
                    log.step(format!("Application {} was already deleted", name));
                }
            }
            None => log.step(format!("Application {} was already deleted", name)),
        }
        log.step("✓ Preserved all snapshots");
        log.step("✓ Preserved all PVCs and data");
        log.step("✓ Preserved protection plans");
        Ok(DeleteResult {
            message: "Application deleted (snapshots & data preserved)".to_string(),
            cleanup_log: log.0,
        })
    }

    async fn delete_snapshots(
        &self,
        ns: &str,
        name: &str,
        force: bool,
        log: &mut CleanupLog,
    ) -> usize {
        let client = self.client.as_ref();
        let snapshots: Vec<ApplicationSnapshot> =
            match list_typed(client, ResourceKind::ApplicationSnapshot, Some(ns), None).await {
                Ok(s) => s,
                Err(e) => {
                    log.warn(format!("Could not list snapshots: {}", e));
                    return 0;
                }
            };
        let mut deleted = 0;
        for snap in snapshots.iter().filter(|s| s.app_name() == name) {
            let snap_name = snap.metadata.name.as_deref().unwrap_or_default();
            let has_fin = snap
                .metadata
                .finalizers
                .as_ref()
                .is_some_and(|f| !f.is_empty());
            if force && has_fin {
                if let Err(e) =
                    strip_finalizers(client, ResourceKind::ApplicationSnapshot, Some(ns), snap_name)
                        .await
                {
                    log.warn(format!("Failed to remove finalizers from snapshot {}: {}", snap_name, e));
                }
            }
            match delete_tolerant(client, ResourceKind::ApplicationSnapshot, Some(ns), snap_name)
                .await
            {
                Ok(true) => {
                    deleted += 1;
                    log.step(format!("Deleted snapshot: {}", snap_name));
                }
                Ok(false) => log.step(format!("Snapshot {} was already deleted", snap_name)),
                Err(e) => log.warn(format!("Failed to delete snapshot {}: {}", snap_name, e)),
            }
        }
        deleted
    }

    async fn delete_links(
        &self,
        ns: &str,
        name: &str,
        force: bool,
        log: &mut CleanupLog,
    ) -> usize {
        let client = self.client.as_ref();
        let links: Vec<AppProtectionPlan> =
            match list_typed(client, ResourceKind::AppProtectionPlan, Some(ns), None).await {
                Ok(l) => l,
                Err(e) => {
                    log.warn(format!("Could not list AppProtectionPlans: {}", e));
                    return 0;
                }
            };
        let mut deleted = 0;
        for link in links.iter().filter(|l| l.spec.application_name == name) {
            let link_name = link.metadata.name.as_deref().unwrap_or_default();
            let has_fin = link
                .metadata
                .finalizers
                .as_ref()
                .is_some_and(|f| !f.is_empty());
            if force && has_fin {
                if let Err(e) =
                    strip_finalizers(client, ResourceKind::AppProtectionPlan, Some(ns), link_name)
                        .await
                {
                    log.warn(format!(
                        "Failed to remove finalizers from AppProtectionPlan {}: {}",
                        link_name, e
                    ));
                }
            }
            match delete_tolerant(client, ResourceKind::AppProtectionPlan, Some(ns), link_name)
                .await
            {
                Ok(true) => {
                    deleted += 1;
                    log.step(format!("Deleted AppProtectionPlan: {}", link_name));
                }
                Ok(false) => {
                    log.step(format!("AppProtectionPlan {} was already deleted", link_name))
                }
                Err(e) => log.warn(format!(
                    "Failed to delete AppProtectionPlan {}: {}",
                    link_name, e
                )),
            }
        }
        deleted
    }

    async fn wait_for_snapshots(&self, ns: &str, name: &str, log: &mut CleanupLog) {
        log.step("Waiting for snapshots to be deleted...");
        let mut remaining = 0;
        for attempt in 0..self.timing.delete_wait_attempts {
            remaining = match list_typed::<ApplicationSnapshot>(
                self.client.as_ref(),
                ResourceKind::ApplicationSnapshot,
                Some(ns),
                None,
            )
            .await
            {
                Ok(snaps) => snaps.iter().filter(|s| s.app_name() == name).count(),
                Err(e) => {
                    warn!(%ns, %name, attempt, error = %e, "snapshot poll failed");
                    remaining.max(1)
                }
            };
            if remaining == 0 {
                log.step("✓ All snapshots deleted");
                return;
            }
            tokio::time::sleep(self.timing.delete_wait_interval()).await;
        }
        log.warn(format!(
            "Timed out waiting for snapshots to be deleted ({} remaining)",
            remaining
        ));
    }

    async fn delete_workloads(&self, ns: &str, selector: &str, log: &mut CleanupLog) {
        let client = self.client.as_ref();
        let mut deleted = 0;
        for kind in CASCADE_KINDS {
            let objects = match client.list(kind, Some(ns), Some(selector)).await {
                Ok(o) => o,
                Err(e) => {
                    log.warn(format!("Could not list {}s: {}", kind, e));
                    continue;
                }
            };
            for obj in &objects {
                let obj_name = object_name(obj);
                match delete_tolerant(client, kind, Some(ns), obj_name).await {
                    Ok(true) => {
                        deleted += 1;
                        log.step(format!("Deleted {}: {}", kind, obj_name));
                    }
                    Ok(false) => {}
                    Err(e) => log.warn(format!("Failed to delete {} {}: {}", kind, obj_name, e)),
                }
            }
        }
        log.step(format!("✓ Deleted {} workload resources ({})", deleted, selector));
    }

    async fn delete_app_resource(
        &self,
        ns: &str,
        name: &str,
        force: bool,
        existed: bool,
        log: &mut CleanupLog,
    ) -> DashboardResult<()> {
        let client = self.client.as_ref();
        if !existed {
            log.step(format!("Application {} was already deleted", name));
            return Ok(());
        }
        if force {
            let current = client
                .get(ResourceKind::Application, Some(ns), name)
                .await
                .or_not_found()?;
            if current.as_ref().is_some_and(has_finalizers) {
                match strip_finalizers(client, ResourceKind::Application, Some(ns), name).await {
                    Ok(_) => {
                        log.step("Removed finalizers from Application");
                        // a terminating Application is collected as soon as its finalizers go
                        let after = client
                            .get(ResourceKind::Application, Some(ns), name)
                            .await
                            .or_not_found()?;
                        if after.is_none() {
                            log.step(format!("✓ Deleted Application: {}", name));
                            return Ok(());
                        }
                    }
                    Err(e) => log.warn(format!(
                        "Could not remove finalizers from Application {}: {}",
                        name, e
                    )),
                }
            }
        }
        if delete_tolerant(client, ResourceKind::Application, Some(ns), name).await? {
            log.step(format!("✓ Deleted Application: {}", name));
        } else {
            log.step(format!("Application {} was already deleted", name));
        }
        Ok(())
    }
}

fn str_at(v: &Value, pointer: &str) -> Option<String> {
    v.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

fn pod_summary(pod: &Value) -> PodSummary {
    let statuses = pod
        .pointer("/status/containerStatuses")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let ready = statuses
        .iter()
        .filter(|s| s.get("ready").and_then(Value::as_bool).unwrap_or(false))
        .count();
    let total = pod
        .pointer("/spec/containers")
        .and_then(Value::as_array)
        .map_or(statuses.len(), Vec::len);
    PodSummary {
        name: object_name(pod).to_string(),
        phase: str_at(pod, "/status/phase").unwrap_or_else(|| "Unknown".into()),
        ready: format!("{}/{}", ready, total),
        restarts: statuses
            .iter()
            .filter_map(|s| s.get("restartCount").and_then(Value::as_u64))
            .sum(),
        node: str_at(pod, "/spec/nodeName"),
    }
}
