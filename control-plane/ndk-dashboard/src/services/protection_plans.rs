use ndk_k8s::{ClientResultExt, ResourceClient, ResourceKind, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::crd::{
    AppProtectionPlan, Application, ApplicationSnapshot, JobScheduler, PLAN_LABEL,
    ProtectionPlan, Retention, SelectionMode, TRIGGERED_LABEL,
};
use crate::errors::{DashboardError, DashboardResult};
use crate::services::deployment::RetentionInput;
use crate::services::deployment::manifests;
use crate::services::kube_ops::{
    create_tolerant, delete_tolerant, list_typed, strip_finalizers, timestamp,
};
use crate::services::snapshots::SnapshotSummary;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub schedule: String,
    pub retention: RetentionInput,
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(default)]
    pub selection_mode: Option<String>,
    #[serde(default)]
    pub label_key: Option<String>,
    #[serde(default)]
    pub label_value: Option<String>,
}

impl CreatePlanRequest {
    fn selection(&self) -> DashboardResult<SelectionMode> {
        match self.selection_mode.as_deref() {
            Some("by-label") => {
                let key = self.label_key.clone().filter(|k| !k.is_empty());
                let value = self.label_value.clone().filter(|v| !v.is_empty());
                match (key, value) {
                    (Some(key), Some(value)) => Ok(SelectionMode::ByLabel { key, value }),
                    _ => Err(DashboardError::validation(
                        "Label key and value are required for label-based selection",
                    )),
                }
            }
            None | Some("by-name") | Some("") => Ok(SelectionMode::ByName),
            Some(other) => Err(DashboardError::validation(format!(
                "Unknown selection mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanCreated {
    pub name: String,
    pub namespace: String,
    pub scheduler: String,
    pub selection_mode: String,
    pub linked_applications: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub name: String,
    pub namespace: String,
    pub schedule: String,
    pub retention: Option<String>,
    pub enabled: bool,
    pub selection_mode: String,
    pub label_selector: Option<String>,
    pub applications: Vec<String>,
    pub last_execution: Option<String>,
    pub state: Option<String>,
    pub is_deleting: bool,
    pub has_finalizers: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanDeleteResult {
    pub message: String,
    pub cleanup_log: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResult {
    pub created_snapshots: Vec<String>,
    pub failed_snapshots: Vec<String>,
}

pub struct ProtectionPlanService {
    client: Arc<dyn ResourceClient>,
}

impl ProtectionPlanService {
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }

    async fn fetch(&self, ns: &str, name: &str) -> DashboardResult<ProtectionPlan> {
        match self
            .client
            .get(ResourceKind::ProtectionPlan, Some(ns), name)
            .await
            .or_not_found()?
        {
            Some(v) => Ok(decode(v)?),
            None => Err(DashboardError::NotFound(format!(
                "Protection plan {}/{} not found",
                ns, name
            ))),
        }
    }

    /// Scheduler, plan, then one link per application for by-name plans.
    #[instrument(level = "info", skip(self, req), fields(ns = %req.namespace, name = %req.name))]
    pub async fn create_protection_plan(
        &self,
        req: CreatePlanRequest,
    ) -> DashboardResult<PlanCreated> {
        for (field, v) in [
            ("name", &req.name),
            ("namespace", &req.namespace),
            ("schedule", &req.schedule),
        ] {
            if v.trim().is_empty() {
                return Err(DashboardError::validation(format!(
                    "Missing required field: {}",
                    field
                )));
            }
        }
        let retention = Retention::parse(&req.retention.as_text())?;
        let mode = req.selection()?;
        let client = self.client.as_ref();
        let (ns, name) = (req.namespace.as_str(), req.name.as_str());

        let scheduler_name = format!("{}-scheduler", name);
        let scheduler = manifests::job_scheduler(&scheduler_name, ns, &req.schedule);
        create_tolerant(client, ResourceKind::JobScheduler, Some(ns), &scheduler).await?;

        let mut plan = manifests::protection_plan(name, ns, &scheduler_name, &retention, None);
        plan.metadata.annotations = Some(mode.to_annotations());
        if mode == SelectionMode::ByName {
            plan.spec.applications = req.applications.clone();
        }
        create_tolerant(client, ResourceKind::ProtectionPlan, Some(ns), &plan).await?;

        let mut linked = Vec::new();
        if mode == SelectionMode::ByName {
            for app in &req.applications {
                let link_name = format!("{}-{}", app, name);
                let link = manifests::app_protection_plan(&link_name, ns, app, name);
                create_tolerant(client, ResourceKind::AppProtectionPlan, Some(ns), &link)
                    .await?;
                linked.push(app.clone());
            }
        }
        info!(%ns, %name, mode = mode.as_str(), %retention, linked = linked.len(), "protection plan created");

        Ok(PlanCreated {
            name: name.to_string(),
            namespace: ns.to_string(),
            scheduler: scheduler_name,
            selection_mode: mode.as_str().to_string(),
            linked_applications: linked,
        })
    }

    /// `suspend = true` disables the plan.
    pub async fn set_suspended(&self, ns: &str, name: &str, suspend: bool) -> DashboardResult<()> {
        self.client
            .patch(
                ResourceKind::ProtectionPlan,
                Some(ns),
                name,
                json!({"spec": {"suspend": suspend}}),
            )
            .await
            .or_not_found()?
            .ok_or_else(|| {
                DashboardError::NotFound(format!("Protection plan {}/{} not found", ns, name))
            })?;
        info!(%ns, %name, suspend, "protection plan updated");
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    pub async fn delete_protection_plan(
        &self,
        ns: &str,
        name: &str,
        force: bool,
    ) -> DashboardResult<PlanDeleteResult> {
        let client = self.client.as_ref();
        let mut log = Vec::new();
        let plan: ProtectionPlan = match client
            .get(ResourceKind::ProtectionPlan, Some(ns), name)
            .await
            .or_not_found()?
        {
            Some(v) => decode(v)?,
            None => {
                return Ok(PlanDeleteResult {
                    message: format!("Protection plan {} was already deleted", name),
                    cleanup_log: vec![format!("Protection plan {} was already deleted", name)],
                });
            }
        };

        // schedule first; anything but 404 is reported and skipped
        if let Some(schedule) = plan.spec.schedule_name.as_deref() {
            match delete_tolerant(client, ResourceKind::JobScheduler, Some(ns), schedule).await {
                Ok(true) => log.push(format!("Deleted JobScheduler: {}", schedule)),
                Ok(false) => debug!(%ns, %schedule, "scheduler already gone"),
                Err(e) => {
                    warn!(%ns, %schedule, error = %e, "failed to delete scheduler");
                    log.push(format!("Warning: Failed to delete JobScheduler {}: {}", schedule, e));
                }
            }
        }

        let has_fin = plan
            .metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| !f.is_empty());
        if force && has_fin {
            strip_finalizers(client, ResourceKind::ProtectionPlan, Some(ns), name).await?;
            log.push("Removed finalizers from ProtectionPlan".to_string());
        }
        if delete_tolerant(client, ResourceKind::ProtectionPlan, Some(ns), name).await? {
            log.push(format!("✓ Deleted ProtectionPlan: {}", name));
        }

        if !matches!(plan.selection_mode(), Ok(SelectionMode::ByLabel { .. })) {
            self.unlink(ns, name, &mut log).await;
        }
        info!(%ns, %name, "protection plan deleted");
        Ok(PlanDeleteResult {
            message: format!("Protection plan {} deleted successfully", name),
            cleanup_log: log,
        })
    }

    /// Drop `plan` from every link; links left empty are deleted.
    async fn unlink(&self, ns: &str, plan: &str, log: &mut Vec<String>) {
        let client = self.client.as_ref();
        let links: Vec<AppProtectionPlan> =
            match list_typed(client, ResourceKind::AppProtectionPlan, Some(ns), None).await {
                Ok(l) => l,
                Err(e) => {
                    log.push(format!("Warning: Could not list AppProtectionPlans: {}", e));
                    return;
                }
            };
        for link in links
            .iter()
            .filter(|l| l.spec.protection_plan_names.iter().any(|p| p == plan))
        {
            let link_name = link.metadata.name.as_deref().unwrap_or_default();
            let rest: Vec<&String> = link
                .spec
                .protection_plan_names
                .iter()
                .filter(|p| *p != plan)
                .collect();
            let outcome = if rest.is_empty() {
                delete_tolerant(client, ResourceKind::AppProtectionPlan, Some(ns), link_name)
                    .await
                    .map(|_| format!("Deleted AppProtectionPlan: {}", link_name))
            } else {
                client
                    .patch(
                        ResourceKind::AppProtectionPlan,
                        Some(ns),
                        link_name,
                        json!({"spec": {"protectionPlanNames": rest}}),
                    )
                    .await
                    .or_not_found()
                    .map(|_| format!("Removed {} from AppProtectionPlan: {}", plan, link_name))
            };
            match outcome {
                Ok(msg) => log.push(msg),
                Err(e) => log.push(format!(
                    "Warning: Failed to update AppProtectionPlan {}: {}",
                    link_name, e
                )),
            }
        }
    }

    pub async fn list_protection_plans(&self) -> DashboardResult<Vec<PlanSummary>> {
        let client = self.client.as_ref();
        let plans: Vec<ProtectionPlan> =
            list_typed(client, ResourceKind::ProtectionPlan, None, None).await?;
        let links: Vec<AppProtectionPlan> =
            list_typed(client, ResourceKind::AppProtectionPlan, None, None).await?;
        let snapshots: Vec<ApplicationSnapshot> =
            list_typed(client, ResourceKind::ApplicationSnapshot, None, None).await?;

        // latest snapshot time per (namespace, plan)
        let mut last: HashMap<(String, String), String> = HashMap::new();
        for s in &snapshots {
            let (Some(plan), Some(created)) = (s.plan_name(), s.creation_time()) else {
                continue;
            };
            let key = (
                s.metadata.namespace.clone().unwrap_or_default(),
                plan.to_string(),
            );
            let slot = last.entry(key).or_default();
            if created > *slot {
                *slot = created;
            }
        }

        let mut out = Vec::with_capacity(plans.len());
        for plan in &plans {
            let ns = plan.metadata.namespace.clone().unwrap_or_default();
            let name = plan.metadata.name.clone().unwrap_or_default();
            let mode = plan.selection_mode().unwrap_or(SelectionMode::ByName);
            let (label_selector, applications) = match &mode {
                SelectionMode::ByLabel { key, value } => (Some(format!("{}={}", key, value)), vec![]),
                SelectionMode::ByName => {
                    let mut apps: Vec<String> = links
                        .iter()
                        .filter(|l| {
                            l.metadata.namespace.as_deref() == Some(ns.as_str())
                                && l.spec.protection_plan_names.contains(&name)
                        })
                        .map(|l| l.spec.application_name.clone())
                        .chain(plan.spec.applications.iter().cloned())
                        .collect();
                    apps.sort();
                    apps.dedup();
                    (None, apps)
                }
            };
            out.push(PlanSummary {
                schedule: self.schedule_of(&ns, plan).await,
                retention: plan.retention().map(|r| r.to_string()),
                enabled: !plan.spec.suspend,
                selection_mode: mode.as_str().to_string(),
                label_selector,
                applications,
                last_execution: last.get(&(ns.clone(), name.clone())).cloned(),
                state: plan.status.as_ref().and_then(|s| s.state.clone()),
                is_deleting: plan.metadata.deletion_timestamp.is_some(),
                has_finalizers: plan
                    .metadata
                    .finalizers
                    .as_ref()
                    .is_some_and(|f| !f.is_empty()),
                namespace: ns,
                name,
            });
        }
        Ok(out)
    }

    /// Cron of the plan's scheduler, falling back to the scheduler name.
    async fn schedule_of(&self, ns: &str, plan: &ProtectionPlan) -> String {
        let Some(schedule_name) = plan.spec.schedule_name.as_deref() else {
            return String::new();
        };
        match self
            .client
            .get(ResourceKind::JobScheduler, Some(ns), schedule_name)
            .await
            .map(decode::<JobScheduler>)
        {
            Ok(Ok(s)) => s.spec.cron_schedule,
            _ => schedule_name.to_string(),
        }
    }

    /// Snapshots taken for the plan, newest first.
    pub async fn plan_history(&self, ns: &str, name: &str) -> DashboardResult<Vec<SnapshotSummary>> {
        let snaps: Vec<ApplicationSnapshot> = list_typed(
            self.client.as_ref(),
            ResourceKind::ApplicationSnapshot,
            Some(ns),
            None,
        )
        .await?;
        let mut history: Vec<SnapshotSummary> = snaps
            .iter()
            .filter(|s| s.plan_name() == Some(name))
            .map(SnapshotSummary::from_snapshot)
            .collect();
        history.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(history)
    }

    /// Snapshot every Application the plan protects now.
    #[instrument(level = "info", skip(self))]
    pub async fn trigger(&self, ns: &str, name: &str) -> DashboardResult<TriggerResult> {
        let plan = self.fetch(ns, name).await?;
        let expires_after = plan.expires_after();
        let mode = plan.selection_mode()?;
        let targets = self.resolve_targets(ns, name, &mode).await?;
        if targets.is_empty() {
            let msg = match &mode {
                SelectionMode::ByLabel { key, value } => format!(
                    "No applications found with label {}={} in namespace {}",
                    key, value, ns
                ),
                SelectionMode::ByName => "No applications are protected by this plan. Create AppProtectionPlan resources to link applications to this protection plan.".to_string(),
            };
            return Err(DashboardError::NotFound(msg));
        }
        info!(%ns, plan = %name, mode = mode.as_str(), apps = targets.len(), "triggering plan");

        let mut result = TriggerResult::default();
        let labels = BTreeMap::from([
            (PLAN_LABEL.to_string(), name.to_string()),
            (TRIGGERED_LABEL.to_string(), "true".to_string()),
        ]);
        for (app_ns, app) in &targets {
            let snap_name = format!("{}-{}-{}", app, name, timestamp());
            let mut snap =
                ApplicationSnapshot::for_app(&snap_name, app_ns, app, &expires_after);
            snap.metadata.labels = Some(labels.clone());
            let created = match encode(&snap) {
                Ok(body) => self
                    .client
                    .create(ResourceKind::ApplicationSnapshot, Some(app_ns), body)
                    .await
                    .map(|_| ()),
                Err(e) => Err(e),
            };
            match created {
                Ok(()) => {
                    debug!(ns = %app_ns, %app, snapshot = %snap_name, "snapshot created");
                    result.created_snapshots.push(snap_name);
                }
                Err(e) => {
                    warn!(ns = %app_ns, %app, error = %e, "snapshot failed");
                    result.failed_snapshots.push(format!("{}: {}", app, e));
                }
            }
        }
        info!(
            %ns, plan = %name,
            created = result.created_snapshots.len(),
            failed = result.failed_snapshots.len(),
            "plan triggered"
        );
        Ok(result)
    }

    /// Protected applications as `(namespace, name)`, first occurrence kept.
    async fn resolve_targets(
        &self,
        ns: &str,
        plan: &str,
        mode: &SelectionMode,
    ) -> DashboardResult<Vec<(String, String)>> {
        let client = self.client.as_ref();
        let found: Vec<(String, String)> = match mode {
            SelectionMode::ByLabel { key, value } => {
                let apps: Vec<Application> =
                    list_typed(client, ResourceKind::Application, Some(ns), None).await?;
                apps.into_iter()
                    .filter(|a| {
                        a.metadata
                            .labels
                            .as_ref()
                            .and_then(|l| l.get(key))
                            .is_some_and(|v| v == value)
                    })
                    .map(|a| {
                        (
                            a.metadata.namespace.unwrap_or_else(|| ns.to_string()),
                            a.metadata.name.unwrap_or_default(),
                        )
                    })
                    .collect()
            }
            SelectionMode::ByName => {
                let links: Vec<AppProtectionPlan> =
                    list_typed(client, ResourceKind::AppProtectionPlan, Some(ns), None).await?;
                links
                    .into_iter()
                    .filter(|l| l.spec.protection_plan_names.iter().any(|p| p == plan))
                    .map(|l| {
                        (
                            l.metadata.namespace.unwrap_or_else(|| ns.to_string()),
                            l.spec.application_name,
                        )
                    })
                    .collect()
            }
        };
        let mut seen = HashSet::new();
        Ok(found
            .into_iter()
            .filter(|(_, name)| !name.is_empty())
            .filter(|t| seen.insert(t.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(v: serde_json::Value) -> CreatePlanRequest {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn selection_from_request() {
        let r = req(json!({"retention": 3}));
        assert_eq!(r.selection().unwrap(), SelectionMode::ByName);

        let r = req(json!({"retention": "7d", "selectionMode": "by-label", "labelKey": "tier", "labelValue": "gold"}));
        assert_eq!(
            r.selection().unwrap(),
            SelectionMode::ByLabel { key: "tier".into(), value: "gold".into() }
        );

        let r = req(json!({"retention": 3, "selectionMode": "by-label", "labelKey": "tier"}));
        assert!(r.selection().is_err());
    }
}
