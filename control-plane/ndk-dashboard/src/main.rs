use anyhow::Result;
use ndk_dashboard::{ApiServer, AppState, config, init_tracing};
use ndk_k8s::KubeResourceClient;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_from_env()?;
    init_tracing("info", config.json_logs());

    info!(
        profile = %config.profile,
        in_cluster = config.in_cluster(),
        port = config.http_port,
        "Starting NDK dashboard"
    );

    let client = KubeResourceClient::connect(config.in_cluster()).await?;
    let state = AppState::new(Arc::new(client), &config);

    let server = ApiServer::new(state, config.http_port);
    if let Err(e) = server.serve().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
