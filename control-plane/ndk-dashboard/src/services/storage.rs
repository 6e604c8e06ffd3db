use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ndk_k8s::{ResourceClient, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::config::PrismConfig;
use crate::crd::StorageCluster;
use crate::errors::DashboardResult;
use crate::services::kube_ops::list_typed;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageClusterView {
    pub name: String,
    pub state: String,
    pub available: bool,
    pub management_server_uuid: Option<String>,
    pub storage_server_uuid: Option<String>,
    pub prism_central: String,
    pub created: Option<String>,
}

pub struct StorageService {
    client: Arc<dyn ResourceClient>,
    prism: PrismConfig,
}

impl StorageService {
    pub fn new(client: Arc<dyn ResourceClient>, prism: PrismConfig) -> Self {
        Self { client, prism }
    }

    pub async fn list_storage_clusters(&self) -> DashboardResult<Vec<StorageClusterView>> {
        let clusters: Vec<StorageCluster> =
            list_typed(self.client.as_ref(), ResourceKind::StorageCluster, None, None).await?;
        let prism_central = self.prism_central().await;
        Ok(clusters
            .iter()
            .map(|c| StorageClusterView {
                name: c.metadata.name.clone().unwrap_or_default(),
                state: if c.available() { "Available" } else { "Unavailable" }.to_string(),
                available: c.available(),
                management_server_uuid: c.spec.management_server_uuid.clone(),
                storage_server_uuid: c.spec.storage_server_uuid.clone(),
                prism_central: prism_central.clone(),
                created: c
                    .metadata
                    .creation_timestamp
                    .as_ref()
                    .map(|t| t.0.to_rfc3339()),
            })
            .collect())
    }

    /// `endpoint:port` from the Prism Central secret, `Unknown` when unreadable.
    async fn prism_central(&self) -> String {
        match self
            .client
            .get(
                ResourceKind::Secret,
                Some(&self.prism.secret_namespace),
                &self.prism.secret_name,
            )
            .await
        {
            Ok(secret) => endpoint_from_secret(&secret, self.prism.default_port)
                .unwrap_or_else(|| "Unknown".to_string()),
            Err(e) => {
                debug!(error = %e, "prism central secret unavailable");
                "Unknown".to_string()
            }
        }
    }
}

fn endpoint_from_secret(secret: &Value, default_port: u16) -> Option<String> {
    let field = |key: &str| -> Option<String> {
        let raw = secret.pointer(&format!("/data/{}", key))?.as_str()?;
        let bytes = STANDARD.decode(raw).ok()?;
        String::from_utf8(bytes).ok().map(|s| s.trim().to_string())
    };
    let endpoint = field("endpoint").filter(|e| !e.is_empty())?;
    let port = field("port")
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| default_port.to_string());
    Some(format!("{}:{}", endpoint, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_decoding() {
        // "10.0.0.5" / "9441"
        let s = json!({"data": {"endpoint": "MTAuMC4wLjU=", "port": "OTQ0MQ=="}});
        assert_eq!(endpoint_from_secret(&s, 9440).as_deref(), Some("10.0.0.5:9441"));

        let s = json!({"data": {"endpoint": "MTAuMC4wLjU="}});
        assert_eq!(endpoint_from_secret(&s, 9440).as_deref(), Some("10.0.0.5:9440"));

        assert!(endpoint_from_secret(&json!({"data": {"endpoint": "%%%"}}), 9440).is_none());
        assert!(endpoint_from_secret(&json!({}), 9440).is_none());
    }
}
