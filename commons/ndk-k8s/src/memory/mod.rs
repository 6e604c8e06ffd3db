mod selector;

pub use selector::LabelSelector;

use crate::error::{ClientError, ClientResult};
use crate::kinds::ResourceKind;
use crate::traits::{ResourceClient, has_finalizers, object_name};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Patch,
    Delete,
}

/// One recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub verb: Verb,
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

type Key = (ResourceKind, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, Value>,
    journal: Vec<Call>,
    failures: HashMap<(Verb, ResourceKind), Vec<(Option<String>, u16)>>,
    next_uid: u64,
}

/// In-memory resource store for tests.
///
/// Deleting an object that carries finalizers only stamps
/// `metadata.deletionTimestamp`; the object disappears once a patch leaves
/// it without finalizers.
#[derive(Clone, Default)]
pub struct MemoryResourceClient {
    state: Arc<RwLock<State>>,
}

fn scope(kind: ResourceKind, ns: Option<&str>) -> String {
    if kind.namespaced() {
        ns.unwrap_or_default().to_string()
    } else {
        String::new()
    }
}

/// RFC 7386 merge.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(p) => {
            if !target.is_object() {
                *target = json!({});
            }
            if let Value::Object(t) = target {
                for (k, v) in p {
                    if v.is_null() {
                        t.remove(k);
                    } else {
                        merge_patch(t.entry(k.clone()).or_insert(Value::Null), v);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

impl MemoryResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object directly, bypassing the journal and conflict checks.
    pub async fn seed(&self, kind: ResourceKind, ns: Option<&str>, mut body: Value) {
        let mut state = self.state.write().await;
        let ns = scope(kind, ns);
        Self::stamp(&mut state, kind, &ns, &mut body);
        let name = object_name(&body).to_string();
        state.objects.insert((kind, ns, name), body);
    }

    pub async fn object(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
    ) -> Option<Value> {
        let state = self.state.read().await;
        state
            .objects
            .get(&(kind, scope(kind, ns), name.to_string()))
            .cloned()
    }

    pub async fn objects(&self, kind: ResourceKind, ns: Option<&str>) -> Vec<Value> {
        let state = self.state.read().await;
        state
            .objects
            .iter()
            .filter(|((k, n, _), _)| {
                *k == kind && (ns.is_none() || !kind.namespaced() || Some(n.as_str()) == ns)
            })
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub async fn journal(&self) -> Vec<Call> {
        self.state.read().await.journal.clone()
    }

    pub async fn clear_journal(&self) {
        self.state.write().await.journal.clear();
    }

    /// Make every matching call fail with `code`. `name = None` matches any
    /// object, including list calls.
    pub async fn fail(
        &self,
        verb: Verb,
        kind: ResourceKind,
        name: Option<&str>,
        code: u16,
    ) {
        let mut state = self.state.write().await;
        state
            .failures
            .entry((verb, kind))
            .or_default()
            .push((name.map(str::to_string), code));
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    fn stamp(state: &mut State, kind: ResourceKind, ns: &str, body: &mut Value) {
        state.next_uid += 1;
        let uid = format!("00000000-0000-0000-0000-{:012}", state.next_uid);
        merge_patch(
            body,
            &json!({
                "apiVersion": kind.api_version(),
                "kind": kind.kind(),
            }),
        );
        let meta = &mut body["metadata"];
        if kind.namespaced() && !ns.is_empty() {
            meta["namespace"] = json!(ns);
        }
        if meta.get("uid").is_none() {
            meta["uid"] = json!(uid);
        }
        if meta.get("creationTimestamp").is_none() {
            meta["creationTimestamp"] = json!(
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            );
        }
        meta["resourceVersion"] = json!(state.next_uid.to_string());
    }

    fn record(
        state: &mut State,
        verb: Verb,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
    ) -> ClientResult<()> {
        state.journal.push(Call {
            verb,
            kind,
            namespace: ns.map(str::to_string),
            name: name.to_string(),
        });
        let injected = state.failures.get(&(verb, kind)).and_then(|rules| {
            rules
                .iter()
                .find(|(n, _)| n.as_deref().is_none_or(|n| n == name))
                .map(|(_, code)| *code)
        });
        match injected {
            Some(code) => Err(ClientError::api(
                code,
                "Injected",
                format!("injected failure for {:?} {} {}", verb, kind, name),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceClient for MemoryResourceClient {
    async fn get(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
    ) -> ClientResult<Value> {
        let mut state = self.state.write().await;
        Self::record(&mut state, Verb::Get, kind, ns, name)?;
        state
            .objects
            .get(&(kind, scope(kind, ns), name.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::not_found(kind.kind(), name))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        label_selector: Option<&str>,
    ) -> ClientResult<Vec<Value>> {
        let selector = label_selector
            .map(LabelSelector::parse)
            .transpose()?
            .unwrap_or_default();
        {
            let mut state = self.state.write().await;
            Self::record(&mut state, Verb::List, kind, ns, "")?;
        }
        Ok(self
            .objects(kind, ns)
            .await
            .into_iter()
            .filter(|o| {
                selector.matches(
                    o.pointer("/metadata/labels").and_then(Value::as_object),
                )
            })
            .collect())
    }

    async fn create(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        mut body: Value,
    ) -> ClientResult<Value> {
        let name = object_name(&body).to_string();
        let mut state = self.state.write().await;
        Self::record(&mut state, Verb::Create, kind, ns, &name)?;
        if name.is_empty() {
            return Err(ClientError::api(
                422,
                "Invalid",
                format!("{} name is required", kind),
            ));
        }
        let key = (kind, scope(kind, ns), name.clone());
        if state.objects.contains_key(&key) {
            return Err(ClientError::already_exists(kind.kind(), &name));
        }
        Self::stamp(&mut state, kind, &key.1, &mut body);
        state.objects.insert(key, body.clone());
        Ok(body)
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
        patch: Value,
    ) -> ClientResult<Value> {
        let mut state = self.state.write().await;
        Self::record(&mut state, Verb::Patch, kind, ns, name)?;
        let key = (kind, scope(kind, ns), name.to_string());
        let obj = state
            .objects
            .get_mut(&key)
            .ok_or_else(|| ClientError::not_found(kind.kind(), name))?;
        merge_patch(obj, &patch);
        let patched = obj.clone();
        let terminating = patched.pointer("/metadata/deletionTimestamp").is_some();
        if terminating && !has_finalizers(&patched) {
            state.objects.remove(&key);
        }
        Ok(patched)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        ns: Option<&str>,
        name: &str,
    ) -> ClientResult<()> {
        let mut state = self.state.write().await;
        Self::record(&mut state, Verb::Delete, kind, ns, name)?;
        let key = (kind, scope(kind, ns), name.to_string());
        let obj = state
            .objects
            .get_mut(&key)
            .ok_or_else(|| ClientError::not_found(kind.kind(), name))?;
        if has_finalizers(obj) {
            if obj.pointer("/metadata/deletionTimestamp").is_none() {
                obj["metadata"]["deletionTimestamp"] = json!(
                    chrono::Utc::now()
                        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
                );
            }
        } else {
            state.objects.remove(&key);
        }
        Ok(())
    }
}
