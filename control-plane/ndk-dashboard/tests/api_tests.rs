mod common;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::{application, exists, seed, snapshot, store, test_config};
use ndk_dashboard::{ApiServer, AppState};
use ndk_k8s::ResourceKind;
use ndk_k8s::memory::{MemoryResourceClient, Verb};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> (MemoryResourceClient, Router) {
    let (mem, client) = store();
    let state = AppState::new(client, &test_config());
    (mem, ApiServer::new(state, 0).into_router())
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&body)?)
}

fn post(uri: &str, body: Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?)
}

#[tokio::test]
async fn health_endpoint() -> Result<()> {
    let (_, app) = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await?;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "ndk-dashboard");
    assert!(health["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn missing_application_is_json_404() -> Result<()> {
    let (_, app) = app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/applications/shop/ghost")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await?;
    assert!(body["error"].as_str().unwrap().contains("ghost"));
    Ok(())
}

#[tokio::test]
async fn deploy_returns_created_or_bad_request() -> Result<()> {
    let (mem, app) = app();
    let body = json!({
        "appType": "redis",
        "name": "cache1",
        "namespace": "cache",
        "storageSize": "1Gi",
        "image": "redis:7",
        "createNDKApp": true,
        "protectionPlan": {"retention": 16}
    });
    let response = app.clone().oneshot(post("/api/deploy", body.clone())?).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!exists(&mem, ResourceKind::StatefulSet, "cache", "cache1").await);

    let mut ok = body;
    ok["protectionPlan"]["retention"] = json!(7);
    let response = app.oneshot(post("/api/deploy", ok)?).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let result = body_json(response).await?;
    assert_eq!(result["protectionEnabled"], true);
    assert_eq!(result["type"], "redis");
    Ok(())
}

#[tokio::test]
async fn bulk_snapshot_partial_failure_is_multi_status() -> Result<()> {
    let (mem, app) = app();
    let body = json!({"applications": [
        {"name": "orders", "namespace": "shop"},
        {"name": "billing", "namespace": "shop"}
    ]});
    let response = app.clone().oneshot(post("/api/snapshots/bulk", body.clone())?).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    mem.fail(Verb::Create, ResourceKind::ApplicationSnapshot, None, 403).await;
    let response = app.oneshot(post("/api/snapshots/bulk", body)?).await?;
    assert_eq!(response.status(), StatusCode::MULTI_STATUS);
    let result = body_json(response).await?;
    assert_eq!(result["failed"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn app_only_delete_over_http() -> Result<()> {
    let (mem, app) = app();
    seed(&mem, ResourceKind::Application, "shop", application("orders", json!({}))).await;
    seed(&mem, ResourceKind::ApplicationSnapshot, "shop", snapshot("orders-snap-1", "orders")).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/applications/shop/orders?appOnly=true")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await?;
    assert_eq!(result["message"], "Application deleted (snapshots & data preserved)");
    assert!(result["cleanupLog"].is_array());
    assert!(exists(&mem, ResourceKind::ApplicationSnapshot, "shop", "orders-snap-1").await);
    Ok(())
}

#[tokio::test]
async fn list_is_cached_until_mutation() -> Result<()> {
    let (mem, app) = app();
    seed(&mem, ResourceKind::Application, "shop", application("orders", json!({}))).await;
    let list = || Request::builder().uri("/api/applications").body(Body::empty());

    let first = body_json(app.clone().oneshot(list()?).await?).await?;
    assert_eq!(first.as_array().map(Vec::len), Some(1));

    seed(&mem, ResourceKind::Application, "shop", application("billing", json!({}))).await;
    let cached = body_json(app.clone().oneshot(list()?).await?).await?;
    assert_eq!(cached.as_array().map(Vec::len), Some(1));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/applications/shop/orders/labels")
                .header("content-type", "application/json")
                .body(Body::from(json!({"set": {"tier": "gold"}}).to_string()))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let fresh = body_json(app.oneshot(list()?).await?).await?;
    assert_eq!(fresh.as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn trigger_without_targets_is_404() -> Result<()> {
    let (mem, app) = app();
    seed(
        &mem,
        ResourceKind::ProtectionPlan,
        "shop",
        json!({"metadata": {"name": "daily"}, "spec": {"retentionPolicy": {"retentionCount": 3}}}),
    )
    .await;
    let response = app
        .oneshot(post("/api/protectionplans/shop/daily/trigger", json!({}))?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
