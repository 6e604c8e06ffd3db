#![allow(dead_code)]

use ndk_dashboard::config::{DashboardConfig, TimingConfig};
use ndk_k8s::ResourceKind;
use ndk_k8s::memory::{Call, MemoryResourceClient, Verb};
use serde_json::{Value, json};
use std::sync::Arc;

pub fn store() -> (MemoryResourceClient, Arc<MemoryResourceClient>) {
    let c = MemoryResourceClient::new();
    (c.clone(), Arc::new(c))
}

/// Short waits so paused-clock tests stay quick.
pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        delete_wait_attempts: 5,
        delete_wait_interval_ms: 10,
        restore_settle_ms: 10,
    }
}

pub fn test_config() -> DashboardConfig {
    DashboardConfig {
        timing: fast_timing(),
        ..Default::default()
    }
    .apply_profile_defaults()
}

pub fn application(name: &str, labels: Value) -> Value {
    json!({
        "metadata": {"name": name, "labels": labels},
        "spec": {
            "applicationSelector": {
                "resourceLabelSelectors": [
                    {"labelSelector": {"matchLabels": {"app": name}}}
                ]
            }
        }
    })
}

pub fn snapshot(name: &str, app: &str) -> Value {
    json!({
        "metadata": {"name": name},
        "spec": {"source": {"applicationRef": {"name": app}}, "expiresAfter": "720h"}
    })
}

pub fn link(name: &str, app: &str, plans: &[&str]) -> Value {
    json!({
        "metadata": {"name": name},
        "spec": {"applicationName": app, "protectionPlanNames": plans}
    })
}

pub fn workload(name: &str, app: &str) -> Value {
    json!({"metadata": {"name": name, "labels": {"app": app}}})
}

pub async fn seed(c: &MemoryResourceClient, kind: ResourceKind, ns: &str, body: Value) {
    c.seed(kind, Some(ns), body).await;
}

pub async fn exists(c: &MemoryResourceClient, kind: ResourceKind, ns: &str, name: &str) -> bool {
    c.object(kind, Some(ns), name).await.is_some()
}

/// Mutating calls only, in order.
pub async fn mutations(c: &MemoryResourceClient) -> Vec<Call> {
    c.journal()
        .await
        .into_iter()
        .filter(|call| matches!(call.verb, Verb::Create | Verb::Patch | Verb::Delete))
        .collect()
}

/// Index of the first call matching `verb`/`kind`, panicking when absent.
pub fn position(calls: &[Call], verb: Verb, kind: ResourceKind) -> usize {
    calls
        .iter()
        .position(|c| c.verb == verb && c.kind == kind)
        .unwrap_or_else(|| panic!("no {:?} {:?} in {:?}", verb, kind, calls))
}

pub fn last_position(calls: &[Call], verb: Verb, kind: ResourceKind) -> usize {
    calls
        .iter()
        .rposition(|c| c.verb == verb && c.kind == kind)
        .unwrap_or_else(|| panic!("no {:?} {:?} in {:?}", verb, kind, calls))
}
