pub mod types;

pub use types::{DashboardConfig, NdkConfig, PrismConfig, TimingConfig};

use envconfig::Envconfig;

/// Load configuration from the process environment with profile defaults applied.
pub fn load_from_env() -> Result<DashboardConfig, envconfig::Error> {
    Ok(DashboardConfig::init_from_env()?.apply_profile_defaults())
}
