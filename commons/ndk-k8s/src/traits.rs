use crate::error::ClientResult;
use crate::kinds::ResourceKind;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Capability over a Kubernetes-like API.
///
/// Objects cross this boundary as raw JSON so custom and built-in kinds share
/// one surface. `ns` is ignored for cluster-scoped kinds; for `list`, `None`
/// means all namespaces.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
    ) -> ClientResult<Value>;

    async fn list(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        label_selector: Option<&str>,
    ) -> ClientResult<Vec<Value>>;

    async fn create(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        body: Value,
    ) -> ClientResult<Value>;

    /// JSON merge patch (RFC 7386).
    async fn patch(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
        patch: Value,
    ) -> ClientResult<Value>;

    async fn delete(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
    ) -> ClientResult<()>;
}

pub fn decode<K: DeserializeOwned>(value: Value) -> ClientResult<K> {
    Ok(serde_json::from_value(value)?)
}

pub fn encode<K: Serialize>(obj: &K) -> ClientResult<Value> {
    Ok(serde_json::to_value(obj)?)
}

/// `metadata.name` of a raw object, empty when absent.
pub fn object_name(obj: &Value) -> &str {
    obj.pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// `metadata.namespace` of a raw object, empty when absent.
pub fn object_namespace(obj: &Value) -> &str {
    obj.pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

pub fn has_finalizers(obj: &Value) -> bool {
    obj.pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .is_some_and(|f| !f.is_empty())
}
