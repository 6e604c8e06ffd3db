use crate::error::{ClientError, ClientResult};
use crate::kinds::ResourceKind;
use crate::traits::ResourceClient;
use async_trait::async_trait;
use kube::api::{
    Api, DeleteParams, ListParams, Patch, PatchParams, PostParams,
};
use kube::core::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use serde_json::Value;
use tracing::{debug, instrument};

/// `ResourceClient` backed by a live API server.
#[derive(Clone)]
pub struct KubeResourceClient {
    client: kube::Client,
}

impl KubeResourceClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Build a client from the pod service account when `in_cluster`,
    /// otherwise from the local kubeconfig.
    pub async fn connect(in_cluster: bool) -> ClientResult<Self> {
        let config = if in_cluster {
            kube::Config::incluster()
                .map_err(|e| ClientError::Transport(e.to_string()))?
        } else {
            kube::Config::infer()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?
        };
        let client = kube::Client::try_from(config)
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self::new(client))
    }

    fn api(&self, kind: ResourceKind, ns: Option<&str>) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(kind.group(), kind.version(), kind.kind());
        let ar = ApiResource::from_gvk_with_plural(&gvk, kind.plural());
        match ns {
            Some(ns) if kind.namespaced() => {
                Api::namespaced_with(self.client.clone(), ns, &ar)
            }
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }
}

fn map_err(e: kube::Error) -> ClientError {
    match e {
        kube::Error::Api(ae) => ClientError::Api {
            code: ae.code,
            reason: ae.reason,
            message: ae.message,
        },
        kube::Error::SerdeError(e) => ClientError::Decode(e),
        other => ClientError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    #[instrument(level = "debug", skip(self), fields(kind = %kind))]
    async fn get(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
    ) -> ClientResult<Value> {
        let obj = self.api(kind, ns).get(name).await.map_err(map_err)?;
        Ok(serde_json::to_value(obj)?)
    }

    #[instrument(level = "debug", skip(self), fields(kind = %kind))]
    async fn list(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        label_selector: Option<&str>,
    ) -> ClientResult<Vec<Value>> {
        let mut lp = ListParams::default();
        if let Some(sel) = label_selector {
            lp = lp.labels(sel);
        }
        let list = self.api(kind, ns).list(&lp).await.map_err(map_err)?;
        debug!(count = list.items.len(), "listed");
        list.items
            .into_iter()
            .map(|o| serde_json::to_value(o).map_err(ClientError::from))
            .collect()
    }

    #[instrument(level = "debug", skip(self, body), fields(kind = %kind))]
    async fn create(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        body: Value,
    ) -> ClientResult<Value> {
        let obj: DynamicObject = serde_json::from_value(body)?;
        let created = self
            .api(kind, ns)
            .create(&PostParams::default(), &obj)
            .await
            .map_err(map_err)?;
        Ok(serde_json::to_value(created)?)
    }

    #[instrument(level = "debug", skip(self, patch), fields(kind = %kind))]
    async fn patch(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
        patch: Value,
    ) -> ClientResult<Value> {
        let patched = self
            .api(kind, ns)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(map_err)?;
        Ok(serde_json::to_value(patched)?)
    }

    #[instrument(level = "debug", skip(self), fields(kind = %kind))]
    async fn delete(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
    ) -> ClientResult<()> {
        self.api(kind, ns)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(map_err)?;
        Ok(())
    }
}
