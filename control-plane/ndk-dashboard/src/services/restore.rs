use ndk_k8s::{ClientResultExt, ResourceClient, ResourceKind, decode, encode, object_name};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::crd::{
    Application, ApplicationSelector, ApplicationSnapshot, ApplicationSnapshotRestore,
    ApplicationSnapshotRestoreSpec, Condition, ReferenceGrant,
};
use crate::errors::{DashboardError, DashboardResult};
use crate::labels::{MANAGED_BY, MANAGED_BY_LABEL, RESTORED_FROM_LABEL};
use crate::services::deployment::manifests;
use crate::services::kube_ops::{
    create_tolerant, delete_tolerant, ensure_namespace, list_typed, timestamp,
};

const SKIPPED_CONFIGMAP_PREFIXES: &[&str] = &["kube-", "istio-"];
const SKIPPED_SECRET_PREFIXES: &[&str] = &["default-token-", "kube-"];
const SERVICE_ACCOUNT_TOKEN: &str = "kubernetes.io/service-account-token";

/// Progress stages, lowest first, with the keywords that place a condition
/// in each.
const STAGES: &[(u8, &str, &[&str])] = &[
    (10, "Initializing", &["precheck", "pending", "init"]),
    (30, "Restoring data", &["restoring", "data", "snapshot"]),
    (50, "Creating resources", &["resource", "creating", "application"]),
    (70, "Restoring volumes", &["volume", "pvc"]),
    (90, "Starting workloads", &["workload", "pod", "statefulset", "starting"]),
];
const COMPLETE_STAGE: &str = "Restore complete";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    pub source_namespace: String,
    pub snapshot_name: String,
    #[serde(default)]
    pub target_namespace: Option<String>,
    #[serde(default)]
    pub new_app_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub name: String,
    pub namespace: String,
    pub snapshot: String,
    pub original_application: String,
    pub restore_name: String,
    pub is_clone: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStatusView {
    pub name: String,
    pub namespace: String,
    pub snapshot: String,
    pub completed: bool,
    pub phase: String,
    pub conditions: Vec<Condition>,
    pub failed_conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressState {
    Successful,
    Failed,
    InProgress,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreProgress {
    pub name: String,
    pub namespace: String,
    pub status: ProgressState,
    pub percentage: u8,
    pub stage: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreJobSummary {
    pub name: String,
    pub namespace: String,
    pub created: Option<String>,
    pub snapshot_name: String,
    pub completed: bool,
    pub status: String,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CleanupSummary {
    pub success: usize,
    pub failed: usize,
    pub messages: Vec<String>,
}

/// Heuristic progress of one restore job.
pub fn progress_of(job: &ApplicationSnapshotRestore) -> RestoreProgress {
    let name = job.metadata.name.clone().unwrap_or_default();
    let namespace = job.metadata.namespace.clone().unwrap_or_default();
    if job.completed() {
        return RestoreProgress {
            name,
            namespace,
            status: ProgressState::Successful,
            percentage: 100,
            stage: COMPLETE_STAGE.to_string(),
            message: None,
        };
    }
    let (percentage, stage) = job
        .conditions()
        .iter()
        .filter_map(stage_of)
        .max_by_key(|(p, _)| *p)
        .unwrap_or((STAGES[0].0, STAGES[0].1));
    match job.failure() {
        Some(failed) => RestoreProgress {
            name,
            namespace,
            status: ProgressState::Failed,
            percentage,
            stage: stage.to_string(),
            message: failed.message.clone().or_else(|| failed.reason.clone()),
        },
        None => RestoreProgress {
            name,
            namespace,
            status: ProgressState::InProgress,
            percentage,
            stage: stage.to_string(),
            message: job
                .conditions()
                .last()
                .and_then(|c| c.message.clone()),
        },
    }
}

fn stage_of(c: &Condition) -> Option<(u8, &'static str)> {
    let text = format!(
        "{} {} {}",
        c.type_,
        c.reason.as_deref().unwrap_or_default(),
        c.message.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    STAGES
        .iter()
        .rev()
        .find(|(_, _, words)| words.iter().any(|w| text.contains(w)))
        .map(|(p, s, _)| (*p, *s))
}

pub struct RestoreService {
    client: Arc<dyn ResourceClient>,
    settle: Duration,
}

impl RestoreService {
    pub fn new(client: Arc<dyn ResourceClient>, settle: Duration) -> Self {
        Self { client, settle }
    }

    /// Submit a restore of `snapshot_name`. Returns once the job is accepted;
    /// progress is read separately.
    #[instrument(level = "info", skip(self, req), fields(ns = %req.source_namespace, snapshot = %req.snapshot_name))]
    pub async fn restore_snapshot(&self, req: RestoreRequest) -> DashboardResult<RestoreResult> {
        let client = self.client.as_ref();
        let source_ns = req.source_namespace.as_str();

        // 1. Source snapshot and its application
        let snapshot: ApplicationSnapshot = match client
            .get(ResourceKind::ApplicationSnapshot, Some(source_ns), &req.snapshot_name)
            .await
            .or_not_found()?
        {
            Some(v) => decode(v)?,
            None => {
                return Err(DashboardError::NotFound(format!(
                    "Snapshot {}/{} not found",
                    source_ns, req.snapshot_name
                )));
            }
        };
        let original_app = snapshot.app_name().to_string();
        if original_app.is_empty() {
            return Err(DashboardError::validation(format!(
                "Snapshot {} does not reference an application",
                req.snapshot_name
            )));
        }

        // 2. Target identity
        let restore_ns = req
            .target_namespace
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| source_ns.to_string());
        let new_name = req.new_app_name.clone().filter(|n| !n.is_empty());
        let is_clone = new_name.as_ref().is_some_and(|n| *n != original_app);
        let restored_name = new_name.unwrap_or_else(|| original_app.clone());
        info!(
            source = %source_ns, target = %restore_ns, app = %original_app,
            restored = %restored_name, is_clone, "starting restore"
        );

        // 3. Target namespace
        ensure_namespace(client, &restore_ns).await?;

        // 4. Cross-namespace plumbing
        if restore_ns != source_ns {
            self.ensure_reference_grant(source_ns, &restore_ns).await?;
            self.copy_config(source_ns, &restore_ns, &original_app).await?;
        }

        // 5. Restore job
        let restore_name = format!("{}-restore-{}", restored_name, timestamp());
        let mut job = ApplicationSnapshotRestore::new(
            &restore_name,
            ApplicationSnapshotRestoreSpec {
                application_snapshot_name: req.snapshot_name.clone(),
                application_snapshot_namespace: Some(source_ns.to_string()),
            },
        );
        job.metadata.namespace = Some(restore_ns.clone());
        client
            .create(
                ResourceKind::ApplicationSnapshotRestore,
                Some(&restore_ns),
                encode(&job)?,
            )
            .await?;
        info!(ns = %restore_ns, restore = %restore_name, "restore job submitted");

        // 6. Surface early failures only
        tokio::time::sleep(self.settle).await;
        self.check_early_failure(&restore_ns, &restore_name).await?;

        // 7. Application that claims the restored workload
        self.ensure_restored_application(source_ns, &restore_ns, &original_app, &restored_name)
            .await?;

        Ok(RestoreResult {
            name: restored_name,
            namespace: restore_ns,
            snapshot: req.snapshot_name,
            original_application: original_app,
            restore_name,
            is_clone,
        })
    }

    async fn ensure_reference_grant(&self, source_ns: &str, target_ns: &str) -> DashboardResult<()> {
        let client = self.client.as_ref();
        let name = ReferenceGrant::name_for(target_ns);
        if client
            .get(ResourceKind::ReferenceGrant, Some(source_ns), &name)
            .await
            .or_not_found()?
            .is_some()
        {
            debug!(ns = %source_ns, %name, "reference grant present");
            return Ok(());
        }
        let grant = ReferenceGrant::for_restore(source_ns, target_ns);
        create_tolerant(client, ResourceKind::ReferenceGrant, Some(source_ns), &grant).await?;
        info!(ns = %source_ns, %name, "created reference grant");
        Ok(())
    }

    /// Copy user ConfigMaps and Secrets into the target namespace, labelled
    /// with the source application.
    async fn copy_config(&self, source_ns: &str, target_ns: &str, app: &str) -> DashboardResult<()> {
        let client = self.client.as_ref();
        let mut copied = 0;
        for kind in [ResourceKind::ConfigMap, ResourceKind::Secret] {
            let objects = match client.list(kind, Some(source_ns), None).await {
                Ok(objects) => objects,
                Err(e) => {
                    warn!(%kind, ns = %source_ns, error = %e, "could not list for copy");
                    continue;
                }
            };
            for obj in objects {
                if skip_copy(kind, &obj) {
                    continue;
                }
                let name = object_name(&obj).to_string();
                let copy = copy_of(&obj, target_ns, app);
                match create_tolerant(client, kind, Some(target_ns), &copy).await {
                    Ok(true) => {
                        copied += 1;
                        debug!(%kind, %name, ns = %target_ns, "copied");
                    }
                    Ok(false) => {}
                    Err(e) => warn!(%kind, %name, ns = %target_ns, error = %e, "copy failed"),
                }
            }
        }
        info!(source = %source_ns, target = %target_ns, copied, "copied configuration");
        Ok(())
    }

    async fn check_early_failure(&self, ns: &str, name: &str) -> DashboardResult<()> {
        let job = match self
            .client
            .get(ResourceKind::ApplicationSnapshotRestore, Some(ns), name)
            .await
            .or_not_found()?
        {
            Some(v) => decode::<ApplicationSnapshotRestore>(v)?,
            None => {
                warn!(%ns, restore = %name, "restore job not found on read-back");
                return Ok(());
            }
        };
        for c in job.false_conditions() {
            if crate::crd::is_in_progress(c) {
                debug!(%ns, restore = %name, reason = ?c.reason, "restore in progress");
            }
        }
        if let Some(failed) = job.failure() {
            let reason = failed.reason.as_deref().unwrap_or("Unknown");
            let message = failed.message.as_deref().unwrap_or_default();
            warn!(%ns, restore = %name, %reason, %message, "restore failed");
            return Err(DashboardError::RestoreFailed(format!("{}: {}", reason, message)));
        }
        Ok(())
    }

    async fn ensure_restored_application(
        &self,
        source_ns: &str,
        target_ns: &str,
        original_app: &str,
        restored_name: &str,
    ) -> DashboardResult<()> {
        let client = self.client.as_ref();
        if client
            .get(ResourceKind::Application, Some(target_ns), restored_name)
            .await
            .or_not_found()?
            .is_some()
        {
            debug!(ns = %target_ns, app = %restored_name, "application already present");
            return Ok(());
        }
        let selector = match client
            .get(ResourceKind::Application, Some(source_ns), original_app)
            .await
            .or_not_found()?
        {
            Some(v) => decode::<Application>(v)?.spec.application_selector,
            None => None,
        }
        .unwrap_or_else(|| ApplicationSelector::for_app(original_app));

        let labels = BTreeMap::from([
            (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
            (RESTORED_FROM_LABEL.to_string(), source_ns.to_string()),
        ]);
        let mut app = manifests::application(restored_name, target_ns, &labels);
        app.spec.application_selector = Some(selector);
        create_tolerant(client, ResourceKind::Application, Some(target_ns), &app).await?;
        info!(ns = %target_ns, app = %restored_name, "created restored application");
        Ok(())
    }

    pub async fn restore_status(&self, ns: &str, name: &str) -> DashboardResult<RestoreStatusView> {
        let job = self.fetch(ns, name).await?;
        Ok(RestoreStatusView {
            name: name.to_string(),
            namespace: ns.to_string(),
            snapshot: job.spec.application_snapshot_name.clone(),
            completed: job.completed(),
            phase: job.phase().to_string(),
            conditions: job.conditions().to_vec(),
            failed_conditions: job.false_conditions().cloned().collect(),
        })
    }

    pub async fn restore_progress(&self, ns: &str, name: &str) -> DashboardResult<RestoreProgress> {
        Ok(progress_of(&self.fetch(ns, name).await?))
    }

    /// Progress of the newest `<app>-restore-*` job.
    pub async fn application_restore_progress(
        &self,
        ns: &str,
        app: &str,
    ) -> DashboardResult<RestoreProgress> {
        let prefix = format!("{}-restore-", app);
        let jobs: Vec<ApplicationSnapshotRestore> = list_typed(
            self.client.as_ref(),
            ResourceKind::ApplicationSnapshotRestore,
            Some(ns),
            None,
        )
        .await?;
        jobs.iter()
            .filter(|j| j.metadata.name.as_deref().is_some_and(|n| n.starts_with(&prefix)))
            .max_by_key(|j| {
                (
                    j.metadata.creation_timestamp.as_ref().map(|t| t.0),
                    j.metadata.name.clone(),
                )
            })
            .map(progress_of)
            .ok_or_else(|| {
                DashboardError::NotFound(format!("No restore jobs found for application {}", app))
            })
    }

    async fn fetch(&self, ns: &str, name: &str) -> DashboardResult<ApplicationSnapshotRestore> {
        match self
            .client
            .get(ResourceKind::ApplicationSnapshotRestore, Some(ns), name)
            .await
            .or_not_found()?
        {
            Some(v) => Ok(decode(v)?),
            None => Err(DashboardError::NotFound(format!(
                "Restore job {}/{} not found",
                ns, name
            ))),
        }
    }

    pub async fn list_restore_jobs(&self, ns: Option<&str>) -> DashboardResult<Vec<RestoreJobSummary>> {
        let jobs: Vec<ApplicationSnapshotRestore> = list_typed(
            self.client.as_ref(),
            ResourceKind::ApplicationSnapshotRestore,
            ns,
            None,
        )
        .await?;
        Ok(jobs
            .iter()
            .map(|j| RestoreJobSummary {
                name: j.metadata.name.clone().unwrap_or_default(),
                namespace: j.metadata.namespace.clone().unwrap_or_default(),
                created: j.metadata.creation_timestamp.as_ref().map(|t| t.0.to_rfc3339()),
                snapshot_name: j.spec.application_snapshot_name.clone(),
                completed: j.completed(),
                status: if j.completed() { "Completed" } else { "In Progress" }.to_string(),
                conditions: j.conditions().to_vec(),
            })
            .collect())
    }

    pub async fn delete_restore_job(&self, ns: &str, name: &str) -> DashboardResult<bool> {
        let deleted = delete_tolerant(
            self.client.as_ref(),
            ResourceKind::ApplicationSnapshotRestore,
            Some(ns),
            name,
        )
        .await?;
        info!(%ns, restore = %name, deleted, "restore job delete");
        Ok(deleted)
    }

    pub async fn delete_completed_restore_jobs(
        &self,
        ns: Option<&str>,
    ) -> DashboardResult<CleanupSummary> {
        let mut summary = CleanupSummary::default();
        for job in self.list_restore_jobs(ns).await?.iter().filter(|j| j.completed) {
            let id = format!("{}/{}", job.namespace, job.name);
            match delete_tolerant(
                self.client.as_ref(),
                ResourceKind::ApplicationSnapshotRestore,
                Some(&job.namespace),
                &job.name,
            )
            .await
            {
                Ok(_) => {
                    summary.success += 1;
                    summary.messages.push(format!("✓ {}", id));
                }
                Err(e) => {
                    summary.failed += 1;
                    summary.messages.push(format!("✗ {}: {}", id, e));
                }
            }
        }
        info!(success = summary.success, failed = summary.failed, "completed restore jobs cleaned");
        Ok(summary)
    }
}

fn skip_copy(kind: ResourceKind, obj: &Value) -> bool {
    let name = object_name(obj);
    match kind {
        ResourceKind::ConfigMap => SKIPPED_CONFIGMAP_PREFIXES.iter().any(|p| name.starts_with(p)),
        ResourceKind::Secret => {
            SKIPPED_SECRET_PREFIXES.iter().any(|p| name.starts_with(p))
                || obj.get("type").and_then(Value::as_str) == Some(SERVICE_ACCOUNT_TOKEN)
        }
        _ => true,
    }
}

/// Fresh object carrying the payload of `obj`, placed in `target_ns`.
fn copy_of(obj: &Value, target_ns: &str, app: &str) -> Value {
    let mut labels = obj
        .pointer("/metadata/labels")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);
    labels.insert("app".to_string(), json!(app));
    let mut copy = json!({
        "metadata": {
            "name": object_name(obj),
            "namespace": target_ns,
            "labels": labels,
        }
    });
    for key in ["data", "binaryData", "stringData", "type", "immutable"] {
        if let Some(v) = obj.get(key) {
            copy[key] = v.clone();
        }
    }
    copy
}
