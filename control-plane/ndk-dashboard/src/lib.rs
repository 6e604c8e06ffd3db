pub mod api;
pub mod cache;
pub mod config;
pub mod crd;
pub mod errors;
pub mod labels;
pub mod server;
pub mod services;

pub use config::{DashboardConfig, load_from_env};
pub use errors::*;
pub use labels::build_label_selector;
pub use server::{ApiServer, AppState};

// Services are re-exported by name; crd::AppState would clash with the server state.
pub use services::{
    ApplicationService, DeploymentService, ProtectionPlanService, RestoreService,
    SnapshotService, StorageService,
};

pub use api::create_middleware_stack;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over `default_env`.
pub fn init_tracing(default_env: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_env));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
}
