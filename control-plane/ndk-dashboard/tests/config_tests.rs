use ndk_dashboard::config::load_from_env;
use serial_test::serial;
use std::env;
use std::time::Duration;

const VARS: &[&str] = &[
    "NDK_DASHBOARD_PROFILE",
    "HTTP_PORT",
    "IN_CLUSTER",
    "LOG_FORMAT",
    "CACHE_TTL",
    "NDK_SNAPSHOT_EXPIRES_AFTER",
    "NDK_DELETE_WAIT_ATTEMPTS",
    "NDK_RESTORE_SETTLE_MS",
    "NDK_PC_SECRET_NAME",
];

fn clear() {
    for v in VARS {
        unsafe { env::remove_var(v) };
    }
}

#[test]
#[serial]
fn defaults_without_env() {
    clear();
    let config = load_from_env().expect("defaults load");
    assert_eq!(config.profile, "dev");
    assert_eq!(config.http_port, 8080);
    assert!(!config.in_cluster());
    assert!(!config.json_logs());
    assert_eq!(config.ndk.default_expires_after, "720h");
    assert_eq!(config.timing.delete_wait_attempts, 30);
    assert_eq!(config.prism.secret_name, "pc-secret");
    assert_eq!(config.cache_ttl(), Duration::from_secs(30));
}

#[test]
#[serial]
fn env_overrides() {
    clear();
    unsafe {
        env::set_var("NDK_DASHBOARD_PROFILE", "prod");
        env::set_var("HTTP_PORT", "9090");
        env::set_var("LOG_FORMAT", "plain");
        env::set_var("NDK_SNAPSHOT_EXPIRES_AFTER", "48h");
        env::set_var("NDK_RESTORE_SETTLE_MS", "500");
        env::set_var("NDK_PC_SECRET_NAME", "prism");
    }
    let config = load_from_env().expect("env load");
    assert_eq!(config.http_port, 9090);
    // profile default applies, explicit format wins
    assert!(config.in_cluster());
    assert!(!config.json_logs());
    assert_eq!(config.ndk.default_expires_after, "48h");
    assert_eq!(config.timing.restore_settle(), Duration::from_millis(500));
    assert_eq!(config.prism.secret_name, "prism");
    clear();
}

#[test]
#[serial]
fn bad_port_is_an_error() {
    clear();
    unsafe { env::set_var("HTTP_PORT", "not-a-port") };
    assert!(load_from_env().is_err());
    clear();
}
