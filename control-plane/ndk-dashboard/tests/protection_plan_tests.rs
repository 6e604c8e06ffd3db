mod common;

use common::{application, exists, link, seed, store};
use ndk_dashboard::ProtectionPlanService;
use ndk_dashboard::crd::{ApplicationSnapshot, ProtectionPlan, SelectionMode};
use ndk_dashboard::services::protection_plans::CreatePlanRequest;
use ndk_k8s::memory::{MemoryResourceClient, Verb};
use ndk_k8s::{ResourceClient, ResourceKind, decode};
use serde_json::{Value, json};

const NS: &str = "shop";

fn create_request(body: Value) -> CreatePlanRequest {
    serde_json::from_value(body).unwrap()
}

async fn plan(mem: &MemoryResourceClient, body: Value) {
    seed(mem, ResourceKind::ProtectionPlan, NS, body).await;
}

fn by_label_plan(name: &str, key: &str, value: &str) -> Value {
    json!({
        "metadata": {
            "name": name,
            "annotations": {
                "ndk-dashboard/selection-mode": "by-label",
                "ndk-dashboard/label-selector-key": key,
                "ndk-dashboard/label-selector-value": value
            }
        },
        "spec": {"scheduleName": format!("{name}-scheduler"), "retentionPolicy": {"maxAge": "48h"}}
    })
}

fn by_name_plan(name: &str) -> Value {
    json!({
        "metadata": {"name": name},
        "spec": {"scheduleName": format!("{name}-scheduler"), "retentionPolicy": {"retentionCount": 5}}
    })
}

async fn snapshots(mem: &MemoryResourceClient) -> Vec<ApplicationSnapshot> {
    mem.objects(ResourceKind::ApplicationSnapshot, Some(NS))
        .await
        .into_iter()
        .map(|v| decode(v).unwrap())
        .collect()
}

#[test_log::test(tokio::test)]
async fn by_label_trigger_snapshots_matching_apps() {
    let (mem, client) = store();
    plan(&mem, by_label_plan("gold", "tier", "gold")).await;
    seed(&mem, ResourceKind::Application, NS, application("orders", json!({"tier": "gold"}))).await;
    seed(&mem, ResourceKind::Application, NS, application("billing", json!({"tier": "gold"}))).await;
    seed(&mem, ResourceKind::Application, NS, application("search", json!({"tier": "silver"}))).await;
    seed(&mem, ResourceKind::Application, "other", application("remote", json!({"tier": "gold"}))).await;
    let svc = ProtectionPlanService::new(client);

    let result = svc.trigger(NS, "gold").await.unwrap();
    assert_eq!(result.created_snapshots.len(), 2);
    assert!(result.failed_snapshots.is_empty());
    assert!(result.created_snapshots.iter().any(|s| s.starts_with("orders-gold-")));
    assert!(result.created_snapshots.iter().any(|s| s.starts_with("billing-gold-")));

    for snap in snapshots(&mem).await {
        let labels = snap.metadata.labels.clone().unwrap();
        assert_eq!(labels.get("protectionplan").map(String::as_str), Some("gold"));
        assert_eq!(labels.get("triggered-manually").map(String::as_str), Some("true"));
        assert_eq!(snap.spec.expires_after.as_deref(), Some("48h"));
    }
    assert!(mem.objects(ResourceKind::ApplicationSnapshot, Some("other")).await.is_empty());
}

#[test_log::test(tokio::test)]
async fn by_label_without_matches_is_not_found() {
    let (mem, client) = store();
    plan(&mem, by_label_plan("gold", "tier", "gold")).await;
    seed(&mem, ResourceKind::Application, NS, application("search", json!({"tier": "silver"}))).await;
    let svc = ProtectionPlanService::new(client);

    let err = svc.trigger(NS, "gold").await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert!(
        err.to_string()
            .contains("No applications found with label tier=gold in namespace shop"),
        "{err}"
    );
}

#[test_log::test(tokio::test)]
async fn by_name_trigger_dedupes_links() {
    let (mem, client) = store();
    plan(&mem, by_name_plan("daily")).await;
    seed(&mem, ResourceKind::AppProtectionPlan, NS, link("orders-daily", "orders", &["daily"])).await;
    seed(&mem, ResourceKind::AppProtectionPlan, NS, link("orders-extra", "orders", &["weekly", "daily"])).await;
    seed(&mem, ResourceKind::AppProtectionPlan, NS, link("billing-weekly", "billing", &["weekly"])).await;
    let svc = ProtectionPlanService::new(client);

    let result = svc.trigger(NS, "daily").await.unwrap();
    assert_eq!(result.created_snapshots.len(), 1);
    assert!(result.created_snapshots[0].starts_with("orders-daily-"));
    let snaps = snapshots(&mem).await;
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].app_name(), "orders");
    // count retention falls back to the default expiry
    assert_eq!(snaps[0].spec.expires_after.as_deref(), Some("720h"));
}

#[test_log::test(tokio::test)]
async fn by_name_without_links_is_not_found() {
    let (mem, client) = store();
    plan(&mem, by_name_plan("daily")).await;
    let svc = ProtectionPlanService::new(client);

    let err = svc.trigger(NS, "daily").await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert!(err.to_string().contains(
        "No applications are protected by this plan. Create AppProtectionPlan resources to link applications to this protection plan."
    ));
    assert!(svc.trigger(NS, "missing").await.unwrap_err().status_code() == 404);
}

#[test_log::test(tokio::test)]
async fn partial_trigger_failure_is_reported_per_app() {
    let (mem, client) = store();
    plan(&mem, by_name_plan("daily")).await;
    seed(&mem, ResourceKind::AppProtectionPlan, NS, link("orders-daily", "orders", &["daily"])).await;
    seed(&mem, ResourceKind::AppProtectionPlan, NS, link("billing-daily", "billing", &["daily"])).await;
    mem.fail(Verb::Create, ResourceKind::ApplicationSnapshot, None, 403).await;
    let svc = ProtectionPlanService::new(client);

    let result = svc.trigger(NS, "daily").await.unwrap();
    assert!(result.created_snapshots.is_empty());
    assert_eq!(result.failed_snapshots.len(), 2);
    assert!(result.failed_snapshots.iter().any(|f| f.starts_with("billing: ")));
}

#[test_log::test(tokio::test)]
async fn create_then_delete_unlinks() {
    let (mem, client) = store();
    seed(&mem, ResourceKind::AppProtectionPlan, NS, link("orders-shared", "orders", &["weekly"])).await;
    let svc = ProtectionPlanService::new(client);

    let created = svc
        .create_protection_plan(create_request(json!({
            "name": "daily",
            "namespace": NS,
            "schedule": "0 1 * * *",
            "retention": 3,
            "applications": ["orders", "billing"]
        })))
        .await
        .unwrap();
    assert_eq!(created.scheduler, "daily-scheduler");
    assert_eq!(created.linked_applications, vec!["orders", "billing"]);
    assert!(exists(&mem, ResourceKind::JobScheduler, NS, "daily-scheduler").await);
    assert!(exists(&mem, ResourceKind::AppProtectionPlan, NS, "orders-daily").await);
    assert!(exists(&mem, ResourceKind::AppProtectionPlan, NS, "billing-daily").await);
    // a link shared with another plan
    mem.patch(
        ResourceKind::AppProtectionPlan,
        Some(NS),
        "orders-shared",
        json!({"spec": {"protectionPlanNames": ["weekly", "daily"]}}),
    )
    .await
    .unwrap();

    let p: ProtectionPlan = decode(
        mem.object(ResourceKind::ProtectionPlan, Some(NS), "daily").await.unwrap(),
    )
    .unwrap();
    assert_eq!(p.selection_mode().unwrap(), SelectionMode::ByName);
    assert_eq!(p.spec.retention_policy.retention_count, Some(3));

    let listed = svc.list_protection_plans().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].schedule, "0 1 * * *");
    assert_eq!(listed[0].retention.as_deref(), Some("3"));
    assert_eq!(listed[0].applications, vec!["billing", "orders"]);

    let deleted = svc.delete_protection_plan(NS, "daily", false).await.unwrap();
    assert!(deleted.cleanup_log.contains(&"Deleted JobScheduler: daily-scheduler".to_string()));
    assert!(!exists(&mem, ResourceKind::ProtectionPlan, NS, "daily").await);
    assert!(!exists(&mem, ResourceKind::JobScheduler, NS, "daily-scheduler").await);
    assert!(!exists(&mem, ResourceKind::AppProtectionPlan, NS, "orders-daily").await);
    assert!(!exists(&mem, ResourceKind::AppProtectionPlan, NS, "billing-daily").await);

    let shared = mem
        .object(ResourceKind::AppProtectionPlan, Some(NS), "orders-shared")
        .await
        .unwrap();
    assert_eq!(shared["spec"]["protectionPlanNames"], json!(["weekly"]));

    // deleting again is a no-op
    let again = svc.delete_protection_plan(NS, "daily", false).await.unwrap();
    assert_eq!(again.message, "Protection plan daily was already deleted");
}

#[test_log::test(tokio::test)]
async fn by_label_create_keeps_annotations_and_skips_links() {
    let (mem, client) = store();
    let svc = ProtectionPlanService::new(client);

    svc.create_protection_plan(create_request(json!({
        "name": "gold",
        "namespace": NS,
        "schedule": "@daily",
        "retention": "7d",
        "applications": ["ignored"],
        "selectionMode": "by-label",
        "labelKey": "tier",
        "labelValue": "gold"
    })))
    .await
    .unwrap();

    let p: ProtectionPlan = decode(
        mem.object(ResourceKind::ProtectionPlan, Some(NS), "gold").await.unwrap(),
    )
    .unwrap();
    assert_eq!(
        p.selection_mode().unwrap(),
        SelectionMode::ByLabel { key: "tier".into(), value: "gold".into() }
    );
    assert_eq!(p.spec.retention_policy.max_age.as_deref(), Some("7d"));
    assert!(p.spec.applications.is_empty());
    assert!(mem.objects(ResourceKind::AppProtectionPlan, Some(NS)).await.is_empty());
}

#[test_log::test(tokio::test)]
async fn create_rejects_bad_retention_before_writing() {
    let (mem, client) = store();
    let svc = ProtectionPlanService::new(client);

    for retention in [json!(0), json!(16)] {
        let err = svc
            .create_protection_plan(create_request(json!({
                "name": "p", "namespace": NS, "schedule": "@daily", "retention": retention
            })))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
    assert!(mem.journal().await.is_empty());
}

#[test_log::test(tokio::test)]
async fn suspend_and_history() {
    let (mem, client) = store();
    plan(&mem, by_name_plan("daily")).await;
    for (name, created) in [("a-daily-1", "2024-01-01T02:00:00Z"), ("a-daily-2", "2024-01-02T02:00:00Z")] {
        seed(
            &mem,
            ResourceKind::ApplicationSnapshot,
            NS,
            json!({
                "metadata": {"name": name, "labels": {"protectionplan": "daily"}},
                "spec": {"source": {"applicationRef": {"name": "a"}}},
                "status": {"readyToUse": true, "creationTime": created}
            }),
        )
        .await;
    }
    let svc = ProtectionPlanService::new(client);

    svc.set_suspended(NS, "daily", true).await.unwrap();
    let listed = svc.list_protection_plans().await.unwrap();
    assert!(!listed[0].enabled);
    assert_eq!(listed[0].last_execution.as_deref(), Some("2024-01-02T02:00:00Z"));
    // scheduler missing, name shown instead
    assert_eq!(listed[0].schedule, "daily-scheduler");

    let history = svc.plan_history(NS, "daily").await.unwrap();
    assert_eq!(history[0].name, "a-daily-2");
    assert_eq!(history[1].name, "a-daily-1");

    assert_eq!(svc.set_suspended(NS, "nope", false).await.unwrap_err().status_code(), 404);
}
