use crate::{
    api::{create_middleware_stack, handlers},
    cache::ResourceCache,
    config::DashboardConfig,
    services::{
        ApplicationService, DeploymentService, ProtectionPlanService, RestoreService,
        SnapshotService, StorageService,
    },
};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use ndk_k8s::ResourceClient;
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub applications: Arc<ApplicationService>,
    pub deployment: Arc<DeploymentService>,
    pub snapshots: Arc<SnapshotService>,
    pub protection_plans: Arc<ProtectionPlanService>,
    pub restores: Arc<RestoreService>,
    pub storage: Arc<StorageService>,
    pub cache: ResourceCache,
}

impl AppState {
    /// Wire every service to one resource client.
    pub fn new(client: Arc<dyn ResourceClient>, config: &DashboardConfig) -> Self {
        Self {
            applications: Arc::new(ApplicationService::new(
                client.clone(),
                config.timing.clone(),
            )),
            deployment: Arc::new(DeploymentService::new(client.clone())),
            snapshots: Arc::new(SnapshotService::new(
                client.clone(),
                config.ndk.default_expires_after.clone(),
            )),
            protection_plans: Arc::new(ProtectionPlanService::new(client.clone())),
            restores: Arc::new(RestoreService::new(
                client.clone(),
                config.timing.restore_settle(),
            )),
            storage: Arc::new(StorageService::new(client, config.prism.clone())),
            cache: ResourceCache::new(config.cache_ttl()),
        }
    }
}

pub struct ApiServer {
    app: Router,
    port: u16,
}

impl ApiServer {
    pub fn new(state: AppState, port: u16) -> Self {
        let app = Router::new()
            // Applications
            .route("/api/applications", get(handlers::list_applications))
            .route(
                "/api/applications/{ns}/{name}",
                get(handlers::get_application).delete(handlers::delete_application),
            )
            .route(
                "/api/applications/{ns}/{name}/pods",
                get(handlers::application_pods),
            )
            .route(
                "/api/applications/{ns}/{name}/pvcs",
                get(handlers::application_pvcs),
            )
            .route(
                "/api/applications/{ns}/{name}/labels",
                patch(handlers::update_labels),
            )
            .route(
                "/api/applications/{ns}/{name}/restore-progress",
                get(handlers::application_restore_progress),
            )
            // Deployment
            .route("/api/deploy", post(handlers::deploy))
            .route("/api/namespaces", get(handlers::list_namespaces))
            .route("/api/workerpools", get(handlers::list_worker_pools))
            // Snapshots
            .route(
                "/api/snapshots",
                get(handlers::list_snapshots).post(handlers::create_snapshot),
            )
            .route("/api/snapshots/bulk", post(handlers::bulk_create_snapshots))
            .route("/api/snapshots/{ns}/{name}", delete(handlers::delete_snapshot))
            // Protection plans
            .route(
                "/api/protectionplans",
                get(handlers::list_protection_plans).post(handlers::create_protection_plan),
            )
            .route(
                "/api/protectionplans/{ns}/{name}",
                delete(handlers::delete_protection_plan),
            )
            .route(
                "/api/protectionplans/{ns}/{name}/enable",
                post(handlers::enable_protection_plan),
            )
            .route(
                "/api/protectionplans/{ns}/{name}/disable",
                post(handlers::disable_protection_plan),
            )
            .route(
                "/api/protectionplans/{ns}/{name}/history",
                get(handlers::plan_history),
            )
            .route(
                "/api/protectionplans/{ns}/{name}/trigger",
                post(handlers::trigger_protection_plan),
            )
            // Restores
            .route(
                "/api/restores",
                get(handlers::list_restore_jobs).post(handlers::restore_snapshot),
            )
            .route(
                "/api/restores/completed",
                delete(handlers::delete_completed_restore_jobs),
            )
            .route(
                "/api/restores/{ns}/{name}",
                get(handlers::restore_status).delete(handlers::delete_restore_job),
            )
            .route(
                "/api/restores/{ns}/{name}/progress",
                get(handlers::restore_progress),
            )
            // Storage
            .route("/api/storageclusters", get(handlers::list_storage_clusters))
            .route("/health", get(health_check))
            .layer(create_middleware_stack())
            .with_state(state);

        Self { app, port }
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("NDK dashboard API listening on {}", addr);
        info!("Health check available at: http://{}/health", addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// The router without a listener, for tests.
    pub fn into_router(self) -> Router {
        self.app
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "ndk-dashboard",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
