use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label NDK puts on snapshots it takes on a plan's schedule.
pub const NDK_PLAN_LABEL: &str = "dataservices.nutanix.com/protection-plan";
/// Label the dashboard puts on snapshots it takes for a plan.
pub const PLAN_LABEL: &str = "protectionplan";
pub const TRIGGERED_LABEL: &str = "triggered-manually";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "dataservices.nutanix.com",
    version = "v1alpha1",
    kind = "ApplicationSnapshot",
    plural = "applicationsnapshots",
    namespaced,
    status = "ApplicationSnapshotStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSnapshotSpec {
    #[serde(default)]
    pub source: SnapshotSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_after: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSource {
    #[serde(default)]
    pub application_ref: ApplicationRef,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct ApplicationRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSnapshotStatus {
    #[serde(default)]
    pub ready_to_use: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotState {
    Creating,
    Ready,
    Deleting,
    Unknown,
}

impl ApplicationSnapshot {
    pub fn for_app(name: &str, ns: &str, app: &str, expires_after: &str) -> Self {
        let mut snap = ApplicationSnapshot::new(
            name,
            ApplicationSnapshotSpec {
                source: SnapshotSource {
                    application_ref: ApplicationRef { name: app.to_string() },
                },
                expires_after: Some(expires_after.to_string()),
            },
        );
        snap.metadata.namespace = Some(ns.to_string());
        snap
    }

    pub fn app_name(&self) -> &str {
        &self.spec.source.application_ref.name
    }

    pub fn state(&self) -> SnapshotState {
        if self.metadata.deletion_timestamp.is_some() {
            return SnapshotState::Deleting;
        }
        match &self.status {
            Some(s) if s.ready_to_use => SnapshotState::Ready,
            Some(_) => SnapshotState::Creating,
            None => SnapshotState::Unknown,
        }
    }

    /// Plan that produced this snapshot, whichever labelling was used.
    pub fn plan_name(&self) -> Option<&str> {
        let labels = self.metadata.labels.as_ref()?;
        labels
            .get(NDK_PLAN_LABEL)
            .or_else(|| labels.get(PLAN_LABEL))
            .map(String::as_str)
    }

    /// `status.creationTime`, falling back to object creation.
    pub fn creation_time(&self) -> Option<String> {
        self.status
            .as_ref()
            .and_then(|s| s.creation_time.clone())
            .or_else(|| {
                self.metadata
                    .creation_timestamp
                    .as_ref()
                    .map(|t| t.0.to_rfc3339())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snap(v: serde_json::Value) -> ApplicationSnapshot {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn state_precedence() {
        let s = snap(json!({
            "metadata": {"name": "s", "deletionTimestamp": "2024-01-01T00:00:00Z"},
            "spec": {"source": {"applicationRef": {"name": "a"}}},
            "status": {"readyToUse": true}
        }));
        assert_eq!(s.state(), SnapshotState::Deleting);

        let s = snap(json!({"metadata": {"name": "s"}, "spec": {}, "status": {"readyToUse": true}}));
        assert_eq!(s.state(), SnapshotState::Ready);

        let s = snap(json!({"metadata": {"name": "s"}, "spec": {}, "status": {}}));
        assert_eq!(s.state(), SnapshotState::Creating);

        let s = snap(json!({"metadata": {"name": "s"}, "spec": {}}));
        assert_eq!(s.state(), SnapshotState::Unknown);
    }

    #[test]
    fn plan_label_either_form() {
        let s = snap(json!({
            "metadata": {"name": "s", "labels": {"protectionplan": "gold"}},
            "spec": {}
        }));
        assert_eq!(s.plan_name(), Some("gold"));
    }
}
