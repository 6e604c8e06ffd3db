use envconfig::Envconfig;
use std::time::Duration;

#[derive(Envconfig, Clone, Debug)]
pub struct DashboardConfig {
    #[envconfig(from = "NDK_DASHBOARD_PROFILE", default = "dev")]
    pub profile: String,

    #[envconfig(from = "HTTP_PORT", default = "8080")]
    pub http_port: u16,

    /// Use the pod service account instead of a kubeconfig.
    /// Env: IN_CLUSTER (profile default: false in dev, true in prod)
    #[envconfig(from = "IN_CLUSTER")]
    pub in_cluster: Option<bool>,

    /// `plain` or `json`. Env: LOG_FORMAT
    #[envconfig(from = "LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Read cache TTL in seconds.
    #[envconfig(from = "CACHE_TTL", default = "30")]
    pub cache_ttl_secs: u64,

    #[envconfig(nested)]
    pub ndk: NdkConfig,

    #[envconfig(nested)]
    pub timing: TimingConfig,

    #[envconfig(nested)]
    pub prism: PrismConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct NdkConfig {
    /// Snapshot retention used when the caller gives none.
    #[envconfig(from = "NDK_SNAPSHOT_EXPIRES_AFTER", default = "720h")]
    pub default_expires_after: String,
}

/// Bounds for the two convergence waits.
#[derive(Envconfig, Clone, Debug)]
pub struct TimingConfig {
    #[envconfig(from = "NDK_DELETE_WAIT_ATTEMPTS", default = "30")]
    pub delete_wait_attempts: u32,

    #[envconfig(from = "NDK_DELETE_WAIT_INTERVAL_MS", default = "1000")]
    pub delete_wait_interval_ms: u64,

    #[envconfig(from = "NDK_RESTORE_SETTLE_MS", default = "2000")]
    pub restore_settle_ms: u64,
}

/// Where the Prism Central endpoint secret lives.
#[derive(Envconfig, Clone, Debug)]
pub struct PrismConfig {
    #[envconfig(from = "NDK_PC_SECRET_NAME", default = "pc-secret")]
    pub secret_name: String,

    #[envconfig(from = "NDK_PC_SECRET_NAMESPACE", default = "ndk-operator")]
    pub secret_namespace: String,

    #[envconfig(from = "NDK_PC_DEFAULT_PORT", default = "9440")]
    pub default_port: u16,
}

impl Default for NdkConfig {
    fn default() -> Self {
        Self {
            default_expires_after: "720h".into(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            delete_wait_attempts: 30,
            delete_wait_interval_ms: 1000,
            restore_settle_ms: 2000,
        }
    }
}

impl Default for PrismConfig {
    fn default() -> Self {
        Self {
            secret_name: "pc-secret".into(),
            secret_namespace: "ndk-operator".into(),
            default_port: 9440,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            profile: "dev".into(),
            http_port: 8080,
            in_cluster: None,
            log_format: None,
            cache_ttl_secs: 30,
            ndk: NdkConfig::default(),
            timing: TimingConfig::default(),
            prism: PrismConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Apply profile → defaults mapping, keeping explicit env overrides.
    ///
    /// - dev: in_cluster=false, log_format=plain
    /// - prod: in_cluster=true, log_format=json
    pub fn apply_profile_defaults(mut self) -> Self {
        let (def_in_cluster, def_format) = match self.profile.as_str() {
            "prod" | "production" | "full" => (true, "json"),
            _ /* dev */ => (false, "plain"),
        };
        if self.in_cluster.is_none() {
            self.in_cluster = Some(def_in_cluster);
        }
        if self.log_format.is_none() {
            self.log_format = Some(def_format.to_string());
        }
        self
    }

    pub fn in_cluster(&self) -> bool {
        self.in_cluster.unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl TimingConfig {
    pub fn delete_wait_interval(&self) -> Duration {
        Duration::from_millis(self.delete_wait_interval_ms)
    }

    pub fn restore_settle(&self) -> Duration {
        Duration::from_millis(self.restore_settle_ms)
    }
}
