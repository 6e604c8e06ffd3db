pub mod engines;
pub mod manifests;
pub mod worker_pool;

pub use engines::AppType;
pub use worker_pool::NodeInfo;

use ndk_k8s::{ResourceClient, ResourceKind, object_name};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::crd::Retention;
use crate::errors::{DashboardError, DashboardResult};
use crate::services::kube_ops::{create_tolerant, ensure_namespace};

const PASSWORD_LEN: usize = 16;

/// Body of a deploy call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[serde(default)]
    pub app_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub storage_size: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default = "default_port")]
    pub port: i32,
    #[serde(default, rename = "createNDKApp")]
    pub create_ndk_app: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub worker_pool: Option<String>,
    /// Present means a plan should be created.
    #[serde(default)]
    pub protection_plan: Option<ProtectionRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtectionRequest {
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_retention")]
    pub retention: RetentionInput,
}

impl Default for ProtectionRequest {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            retention: default_retention(),
        }
    }
}

/// Retention arrives either as a JSON number or as text like `"7d"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RetentionInput {
    Number(i64),
    Text(String),
}

impl RetentionInput {
    pub fn as_text(&self) -> String {
        match self {
            RetentionInput::Number(n) => n.to_string(),
            RetentionInput::Text(s) => s.clone(),
        }
    }

    /// Deploy form: an integer count, either a JSON number or a digit string.
    fn parse(&self) -> DashboardResult<Retention> {
        Retention::parse_count(&self.as_text())
    }
}

fn default_replicas() -> i32 {
    1
}

fn default_port() -> i32 {
    3306
}

fn default_schedule() -> String {
    "0 2 * * *".to_string()
}

fn default_retention() -> RetentionInput {
    RetentionInput::Number(7)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub app_type: String,
    pub replicas: i32,
    pub password: String,
    pub ndk_enabled: bool,
    pub protection_enabled: bool,
}

pub struct DeploymentService {
    client: Arc<dyn ResourceClient>,
}

impl DeploymentService {
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }

    #[instrument(level = "info", skip(self, req), fields(ns = %req.namespace, name = %req.name))]
    pub async fn deploy(&self, req: DeployRequest) -> DashboardResult<DeployResult> {
        // 1. Validate before touching the cluster
        let (app_type, retention) = validate(&req)?;
        let client = self.client.as_ref();
        let name = req.name.as_str();
        let ns = req.namespace.as_str();
        info!(%ns, %name, %app_type, replicas = req.replicas, "deploying application");

        // 2. Namespace
        ensure_namespace(client, ns).await?;

        // 3. Credentials
        let password = req
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(generate_password);
        let secret =
            manifests::credentials_secret(name, ns, &password, req.database.as_deref());
        create_tolerant(client, ResourceKind::Secret, Some(ns), &secret).await?;

        // 4. Replication config for multi-replica relational engines
        let replication = app_type.is_relational() && req.replicas > 1;
        if replication {
            if let Some(cm) = manifests::replication_config(name, ns, app_type) {
                create_tolerant(client, ResourceKind::ConfigMap, Some(ns), &cm).await?;
            }
        }

        // 5. StatefulSet
        let node_selector = match req.worker_pool.as_deref().filter(|p| !p.is_empty()) {
            Some(pool) => {
                let resolved =
                    worker_pool::resolve_node_selector(&self.nodes().await?, pool);
                match &resolved {
                    Some((k, v)) => info!(%pool, key = %k, value = %v, "resolved worker pool"),
                    None => warn!(%pool, "worker pool not found on any node, scheduling anywhere"),
                }
                resolved
            }
            None => None,
        };
        let storage_class = req
            .storage_class
            .as_deref()
            .filter(|c| !c.is_empty() && *c != "default");
        let sts = manifests::stateful_set(&manifests::WorkloadSpec {
            name,
            namespace: ns,
            app_type,
            replicas: req.replicas,
            image: &req.image,
            port: req.port,
            storage_class,
            storage_size: &req.storage_size,
            database: req.database.as_deref(),
            node_selector,
            replication,
        });
        create_tolerant(client, ResourceKind::StatefulSet, Some(ns), &sts).await?;

        // 6. Headless Service
        let svc = manifests::headless_service(name, ns, app_type, req.port);
        create_tolerant(client, ResourceKind::Service, Some(ns), &svc).await?;

        // 7. NDK Application
        if req.create_ndk_app {
            let mut labels = BTreeMap::from([("app".to_string(), name.to_string())]);
            labels.extend(req.labels.clone());
            let app = manifests::application(name, ns, &labels);
            create_tolerant(client, ResourceKind::Application, Some(ns), &app).await?;
        }

        // 8. Schedule, plan and link
        let protection_enabled = req.create_ndk_app && retention.is_some();
        if let (true, Some(retention), Some(plan)) =
            (req.create_ndk_app, &retention, &req.protection_plan)
        {
            let schedule_name = format!("{}-schedule", name);
            let plan_name = format!("{}-plan", name);
            let link_name = format!("{}-protection", name);

            let scheduler = manifests::job_scheduler(&schedule_name, ns, &plan.schedule);
            create_tolerant(client, ResourceKind::JobScheduler, Some(ns), &scheduler).await?;

            let pp = manifests::protection_plan(
                &plan_name,
                ns,
                &schedule_name,
                retention,
                Some("async"),
            );
            create_tolerant(client, ResourceKind::ProtectionPlan, Some(ns), &pp).await?;

            let link = manifests::app_protection_plan(&link_name, ns, name, &plan_name);
            create_tolerant(client, ResourceKind::AppProtectionPlan, Some(ns), &link)
                .await?;
            info!(%ns, %name, plan = %plan_name, %retention, "protection plan wired");
        } else if retention.is_some() {
            warn!(%ns, %name, "protection plan requested without NDK application, skipping");
        }

        info!(%ns, %name, "deployment submitted");
        Ok(DeployResult {
            name: name.to_string(),
            namespace: ns.to_string(),
            app_type: app_type.to_string(),
            replicas: req.replicas,
            password,
            ndk_enabled: req.create_ndk_app,
            protection_enabled,
        })
    }

    /// Worker pools found across cluster nodes; nodes are scanned on every call.
    pub async fn list_worker_pools(&self) -> DashboardResult<Vec<String>> {
        Ok(worker_pool::list_pools(&self.nodes().await?))
    }

    pub async fn list_namespaces(&self) -> DashboardResult<Vec<String>> {
        let mut names: Vec<String> = self
            .client
            .list(ResourceKind::Namespace, None, None)
            .await?
            .iter()
            .map(|ns| object_name(ns).to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn nodes(&self) -> DashboardResult<Vec<NodeInfo>> {
        Ok(self
            .client
            .list(ResourceKind::Node, None, None)
            .await?
            .iter()
            .map(|n| NodeInfo {
                name: object_name(n).to_string(),
                labels: n
                    .pointer("/metadata/labels")
                    .and_then(Value::as_object)
                    .map(|m| {
                        m.iter()
                            .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect())
    }
}

fn validate(req: &DeployRequest) -> DashboardResult<(AppType, Option<Retention>)> {
    let required = [
        ("appType", &req.app_type),
        ("name", &req.name),
        ("namespace", &req.namespace),
        ("storageSize", &req.storage_size),
        ("image", &req.image),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(DashboardError::validation(format!("Missing required field: {}", field)));
    }
    let app_type: AppType = req.app_type.parse()?;
    if req.replicas < 1 {
        return Err(DashboardError::validation("replicas must be at least 1"));
    }
    let retention = req
        .protection_plan
        .as_ref()
        .map(|p| p.retention.parse())
        .transpose()?;
    Ok((app_type, retention))
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}
