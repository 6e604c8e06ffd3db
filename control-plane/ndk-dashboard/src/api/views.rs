use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::services::snapshots::AppTarget;

// Request/response bodies that only the REST layer uses.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAppQuery {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub app_only: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForceQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamespaceQuery {
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelUpdate {
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelsResponse {
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    pub application_name: String,
    pub namespace: String,
    #[serde(default)]
    pub expires_after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSnapshotRequest {
    pub applications: Vec<AppTarget>,
    #[serde(default)]
    pub expires_after: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
