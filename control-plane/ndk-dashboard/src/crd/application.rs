use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "dataservices.nutanix.com",
    version = "v1alpha1",
    kind = "Application",
    plural = "applications",
    namespaced,
    status = "ApplicationStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_selector: Option<ApplicationSelector>,
}

/// Selector over the workloads and PVCs an Application owns.
///
/// Newer NDK releases wrap label selectors in `resourceLabelSelectors`; older
/// ones put `matchLabels`/`matchExpressions` directly on the selector.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSelector {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_label_selectors: Vec<ResourceLabelSelector>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLabelSelector {
    #[serde(default)]
    pub label_selector: LabelSelectorTerms,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorTerms {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct LabelSelectorRequirement {
    pub key: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

fn default_operator() -> String {
    "In".to_string()
}

impl ApplicationSelector {
    /// `resourceLabelSelectors: [{labelSelector: {matchLabels: {app: <name>}}}]`
    pub fn for_app(name: &str) -> Self {
        Self {
            resource_label_selectors: vec![ResourceLabelSelector {
                label_selector: LabelSelectorTerms {
                    match_labels: BTreeMap::from([(
                        "app".to_string(),
                        name.to_string(),
                    )]),
                    match_expressions: vec![],
                },
            }],
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_snapshot_time: Option<String>,
}

/// K8s-style status condition shared by every NDK kind.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }

    pub fn is_false(&self) -> bool {
        self.status == "False"
    }
}

/// Lifecycle state derived from an Application's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// First condition is true; carries its type (e.g. `Active`).
    Condition(String),
    /// First condition is not true.
    Not(String),
    Provisioning,
    Unknown,
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppState::Condition(t) => f.write_str(t),
            AppState::Not(t) => write!(f, "Not {}", t),
            AppState::Provisioning => f.write_str("Provisioning"),
            AppState::Unknown => f.write_str("Unknown"),
        }
    }
}

impl Application {
    /// State plus the message of the condition it came from.
    pub fn state(&self) -> (AppState, String) {
        let Some(status) = &self.status else {
            return (AppState::Unknown, String::new());
        };
        let Some(first) = status.conditions.first() else {
            return (AppState::Provisioning, String::new());
        };
        let ty = if first.type_.is_empty() {
            "Unknown".to_string()
        } else {
            first.type_.clone()
        };
        let state = if first.is_true() {
            AppState::Condition(ty)
        } else {
            AppState::Not(ty)
        };
        (state, first.message.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app(v: serde_json::Value) -> Application {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn state_from_conditions() {
        let a = app(json!({
            "apiVersion": "dataservices.nutanix.com/v1alpha1",
            "kind": "Application",
            "metadata": {"name": "a", "namespace": "n"},
            "spec": {},
            "status": {"conditions": [{"type": "Active", "status": "True", "message": "ok"}]}
        }));
        assert_eq!(a.state(), (AppState::Condition("Active".into()), "ok".into()));

        let a = app(json!({
            "metadata": {"name": "a"},
            "spec": {},
            "status": {"conditions": [{"type": "Active", "status": "False"}]}
        }));
        assert_eq!(a.state().0.to_string(), "Not Active");
    }

    #[test]
    fn state_without_status() {
        let a = app(json!({"metadata": {"name": "a"}, "spec": {}}));
        assert_eq!(a.state().0, AppState::Unknown);
        let a = app(json!({"metadata": {"name": "a"}, "spec": {}, "status": {}}));
        assert_eq!(a.state().0, AppState::Provisioning);
    }

    #[test]
    fn legacy_selector_decodes() {
        let a = app(json!({
            "metadata": {"name": "a"},
            "spec": {"applicationSelector": {"matchLabels": {"app": "x"}}}
        }));
        let sel = a.spec.application_selector.unwrap();
        assert!(sel.resource_label_selectors.is_empty());
        assert_eq!(sel.match_labels.get("app").map(String::as_str), Some("x"));
    }
}
