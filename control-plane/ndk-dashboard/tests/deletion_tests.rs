mod common;

use common::{
    application, exists, fast_timing, last_position, link, mutations, position, seed,
    snapshot, store, workload,
};
use ndk_dashboard::ApplicationService;
use ndk_k8s::ResourceKind;
use ndk_k8s::memory::Verb;
use serde_json::json;

const NS: &str = "shop";

async fn seeded() -> (ndk_k8s::memory::MemoryResourceClient, ApplicationService) {
    let (mem, client) = store();
    seed(&mem, ResourceKind::Application, NS, application("orders", json!({"app": "orders"}))).await;
    for s in ["orders-snap-1", "orders-snap-2", "orders-snap-3"] {
        seed(&mem, ResourceKind::ApplicationSnapshot, NS, snapshot(s, "orders")).await;
    }
    seed(&mem, ResourceKind::ApplicationSnapshot, NS, snapshot("billing-snap-1", "billing")).await;
    seed(&mem, ResourceKind::AppProtectionPlan, NS, link("orders-daily", "orders", &["daily"])).await;
    seed(&mem, ResourceKind::AppProtectionPlan, NS, link("orders-weekly", "orders", &["weekly"])).await;
    seed(&mem, ResourceKind::AppProtectionPlan, NS, link("billing-daily", "billing", &["daily"])).await;
    seed(&mem, ResourceKind::StatefulSet, NS, workload("orders", "orders")).await;
    seed(&mem, ResourceKind::Service, NS, workload("orders", "orders")).await;
    seed(&mem, ResourceKind::PersistentVolumeClaim, NS, workload("data-orders-0", "orders")).await;
    seed(&mem, ResourceKind::Secret, NS, workload("orders-credentials", "orders")).await;
    seed(&mem, ResourceKind::StatefulSet, NS, workload("billing", "billing")).await;
    mem.clear_journal().await;
    (mem, ApplicationService::new(client, fast_timing()))
}

#[test_log::test(tokio::test(start_paused = true))]
async fn full_delete_runs_in_order() {
    let (mem, svc) = seeded().await;

    let result = svc.delete_application(NS, "orders", false, false).await.unwrap();
    assert_eq!(
        result.message,
        "Application orders and all associated resources deleted successfully"
    );

    let calls = mutations(&mem).await;
    let last_snapshot = last_position(&calls, Verb::Delete, ResourceKind::ApplicationSnapshot);
    let first_link = position(&calls, Verb::Delete, ResourceKind::AppProtectionPlan);
    let last_link = last_position(&calls, Verb::Delete, ResourceKind::AppProtectionPlan);
    let first_workload = position(&calls, Verb::Delete, ResourceKind::StatefulSet);
    let app = position(&calls, Verb::Delete, ResourceKind::Application);
    assert!(last_snapshot < first_link);
    assert!(last_link < first_workload);
    assert!(first_workload < app);
    assert_eq!(app, calls.len() - 1, "Application goes last");

    let log = &result.cleanup_log;
    let idx = |needle: &str| {
        log.iter()
            .position(|l| l == needle)
            .unwrap_or_else(|| panic!("missing {needle:?} in {log:?}"))
    };
    assert!(idx("✓ Deleted 3 snapshots") < idx("✓ Deleted 2 AppProtectionPlans"));
    assert!(idx("✓ Deleted 2 AppProtectionPlans") < idx("Waiting for snapshots to be deleted..."));
    assert!(idx("✓ All snapshots deleted") < idx("✓ Deleted Application: orders"));
    assert!(log.contains(&"✓ Deleted 4 workload resources (app=orders)".to_string()));

    // other application untouched
    assert!(exists(&mem, ResourceKind::ApplicationSnapshot, NS, "billing-snap-1").await);
    assert!(exists(&mem, ResourceKind::AppProtectionPlan, NS, "billing-daily").await);
    assert!(exists(&mem, ResourceKind::StatefulSet, NS, "billing").await);
    assert!(!exists(&mem, ResourceKind::Application, NS, "orders").await);
    assert!(!exists(&mem, ResourceKind::PersistentVolumeClaim, NS, "data-orders-0").await);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn missing_application_deletes_cleanly() {
    let (mem, client) = store();
    let svc = ApplicationService::new(client, fast_timing());

    let result = svc.delete_application(NS, "ghost", false, false).await.unwrap();
    assert!(result.cleanup_log.contains(&"Application ghost was already deleted".to_string()));
    assert!(result.cleanup_log.contains(&"✓ Deleted 0 snapshots".to_string()));
    assert!(!result.cleanup_log.iter().any(|l| l.starts_with("Waiting")));
    assert!(mutations(&mem).await.is_empty());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn stuck_snapshot_times_out_with_warning() {
    let (mem, svc) = seeded().await;
    let mut held = snapshot("orders-snap-held", "orders");
    held["metadata"]["finalizers"] = json!(["dataservices.nutanix.com/snapshot"]);
    seed(&mem, ResourceKind::ApplicationSnapshot, NS, held).await;

    let result = svc.delete_application(NS, "orders", false, false).await.unwrap();
    assert!(
        result
            .cleanup_log
            .iter()
            .any(|l| l.starts_with("Warning: Timed out waiting for snapshots"))
    );
    // the Application still goes
    assert!(!exists(&mem, ResourceKind::Application, NS, "orders").await);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn force_strips_finalizers() {
    let (mem, client) = store();
    let mut app = application("orders", json!({"app": "orders"}));
    app["metadata"]["finalizers"] = json!(["dataservices.nutanix.com/application"]);
    seed(&mem, ResourceKind::Application, NS, app).await;
    let mut snap = snapshot("orders-snap-1", "orders");
    snap["metadata"]["finalizers"] = json!(["dataservices.nutanix.com/snapshot"]);
    seed(&mem, ResourceKind::ApplicationSnapshot, NS, snap).await;
    let svc = ApplicationService::new(client, fast_timing());

    let result = svc.delete_application(NS, "orders", true, false).await.unwrap();
    assert!(result.cleanup_log.contains(&"Removed finalizers from Application".to_string()));
    assert!(result.cleanup_log.contains(&"✓ All snapshots deleted".to_string()));
    assert!(!exists(&mem, ResourceKind::Application, NS, "orders").await);
    assert!(!exists(&mem, ResourceKind::ApplicationSnapshot, NS, "orders-snap-1").await);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn app_only_preserves_everything_else() {
    let (mem, svc) = seeded().await;

    let result = svc.delete_application(NS, "orders", false, true).await.unwrap();
    assert_eq!(result.message, "Application deleted (snapshots & data preserved)");
    assert_eq!(
        result.cleanup_log,
        vec![
            "✓ Deleted Application CRD: orders".to_string(),
            "✓ Preserved all snapshots".to_string(),
            "✓ Preserved all PVCs and data".to_string(),
            "✓ Preserved protection plans".to_string(),
        ]
    );
    let calls = mutations(&mem).await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, ResourceKind::Application);
    assert!(exists(&mem, ResourceKind::ApplicationSnapshot, NS, "orders-snap-1").await);
    assert!(exists(&mem, ResourceKind::StatefulSet, NS, "orders").await);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn failed_snapshot_delete_is_logged_not_fatal() {
    let (mem, svc) = seeded().await;
    mem.fail(Verb::Delete, ResourceKind::ApplicationSnapshot, Some("orders-snap-2"), 403)
        .await;

    let result = svc.delete_application(NS, "orders", false, false).await.unwrap();
    assert!(result.cleanup_log.contains(&"✓ Deleted 2 snapshots".to_string()));
    assert!(
        result
            .cleanup_log
            .iter()
            .any(|l| l.starts_with("Warning: Failed to delete snapshot orders-snap-2"))
    );
    assert!(!exists(&mem, ResourceKind::Application, NS, "orders").await);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn application_delete_failure_propagates() {
    let (mem, svc) = seeded().await;
    mem.fail(Verb::Delete, ResourceKind::Application, None, 500).await;

    let err = svc.delete_application(NS, "orders", false, false).await.unwrap_err();
    assert_eq!(err.status_code(), 500);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn finalizer_strip_failure_still_deletes_application() {
    for app_only in [false, true] {
        let (mem, client) = store();
        let mut app = application("orders", json!({"app": "orders"}));
        app["metadata"]["finalizers"] = json!(["dataservices.nutanix.com/application"]);
        seed(&mem, ResourceKind::Application, NS, app).await;
        mem.fail(Verb::Patch, ResourceKind::Application, Some("orders"), 500).await;
        let svc = ApplicationService::new(client, fast_timing());

        let result = svc
            .delete_application(NS, "orders", true, app_only)
            .await
            .unwrap();
        assert!(
            result
                .cleanup_log
                .iter()
                .any(|l| l.starts_with("Warning: Could not remove finalizers from Application orders")),
            "app_only={app_only}: {:?}",
            result.cleanup_log
        );
        let calls = mutations(&mem).await;
        let patch = position(&calls, Verb::Patch, ResourceKind::Application);
        let delete = position(&calls, Verb::Delete, ResourceKind::Application);
        assert!(patch < delete, "app_only={app_only}");
        let held = mem.object(ResourceKind::Application, Some(NS), "orders").await.unwrap();
        assert!(held.pointer("/metadata/deletionTimestamp").is_some());
    }
}
