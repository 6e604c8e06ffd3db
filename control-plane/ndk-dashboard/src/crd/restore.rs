use super::application::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "dataservices.nutanix.com",
    version = "v1alpha1",
    kind = "ApplicationSnapshotRestore",
    plural = "applicationsnapshotrestores",
    namespaced,
    status = "RestoreStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSnapshotRestoreSpec {
    #[serde(default)]
    pub application_snapshot_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_snapshot_namespace: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStatus {
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

const IN_PROGRESS_REASONS: &[&str] = &["RunningPrechecks", "Restoring", "Pending"];

const IN_PROGRESS_MESSAGES: &[&str] = &[
    "Waiting for PVCs to get Bound",
    "Waiting for volumes",
    "Restoring volumes",
    "Volumes are being restored",
    "Restoring application",
];

/// A `False` condition that only reports work still under way.
pub fn is_in_progress(c: &Condition) -> bool {
    let reason = c.reason.as_deref().unwrap_or_default();
    let message = c.message.as_deref().unwrap_or_default();
    IN_PROGRESS_REASONS.contains(&reason)
        || IN_PROGRESS_MESSAGES.iter().any(|m| message.contains(m))
}

impl ApplicationSnapshotRestore {
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    pub fn completed(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.completed)
    }

    pub fn phase(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown")
    }

    /// Every `False` condition, in-progress ones included.
    pub fn false_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions().iter().filter(|c| c.is_false())
    }

    /// First `False` condition that is a genuine failure.
    pub fn failure(&self) -> Option<&Condition> {
        self.false_conditions().find(|c| !is_in_progress(c))
    }
}
