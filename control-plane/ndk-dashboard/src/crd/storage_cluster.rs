use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "dataservices.nutanix.com",
    version = "v1alpha1",
    kind = "StorageCluster",
    plural = "storageclusters",
    status = "StorageClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct StorageClusterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_server_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_server_uuid: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct StorageClusterStatus {
    #[serde(default)]
    pub available: bool,
}

impl StorageCluster {
    pub fn available(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.available)
    }
}
