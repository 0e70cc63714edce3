// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;
use tempfile::tempdir;
use yare::parameterized;

use super::*;

const ENV_VARS: &[&str] = &[
    "BH_STATE_DIR",
    "BH_BIND",
    "BH_RPC_PORT",
    "BH_CHANNEL_PORT",
    "BH_HEARTBEAT_TIMEOUT_MS",
    "BH_SWEEP_INTERVAL_MS",
    "BH_IPC_TIMEOUT_MS",
    "BH_DEFAULT_MAX_CONCURRENCY",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn defaults() {
    let config = HubConfig::defaults("/tmp/bh");
    assert_eq!(config.rpc_addr(), "0.0.0.0:7420".parse().unwrap());
    assert_eq!(config.channel_addr(), "0.0.0.0:7421".parse().unwrap());
    assert_eq!(config.heartbeat_timeout, Duration::from_secs(90));
    assert_eq!(config.sweep_interval, Duration::from_secs(30));
    assert_eq!(config.ipc_timeout, Duration::from_secs(5));
    assert_eq!(config.default_max_concurrency, 1);
    assert_eq!(config.registry_path(), PathBuf::from("/tmp/bh/registry.snapshot"));
    assert_eq!(config.tasks_path(), PathBuf::from("/tmp/bh/tasks.snapshot"));
    assert_eq!(config.lock_path(), PathBuf::from("/tmp/bh/hub.pid"));
    assert_eq!(config.log_path(), PathBuf::from("/tmp/bh/hub.log"));
    config.validate().unwrap();
}

#[test]
fn file_values_override_defaults() {
    let file: FileConfig = toml::from_str(
        r#"
        bind = "127.0.0.1"
        rpc_port = 9000
        heartbeat_timeout_ms = 20000
        sweep_interval_ms = 5000
        default_max_concurrency = 4
        "#,
    )
    .unwrap();

    let config = HubConfig::defaults("/tmp/bh").with_file(file);

    assert_eq!(config.rpc_addr(), "127.0.0.1:9000".parse().unwrap());
    assert_eq!(config.channel_port, DEFAULT_CHANNEL_PORT);
    assert_eq!(config.heartbeat_timeout, Duration::from_secs(20));
    assert_eq!(config.sweep_interval, Duration::from_secs(5));
    assert_eq!(config.default_max_concurrency, 4);
}

#[test]
fn missing_file_is_not_an_error() {
    let dir = tempdir().unwrap();
    assert_eq!(FileConfig::load(&dir.path().join("hub.toml")).unwrap(), None);
}

#[test]
fn unknown_file_keys_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hub.toml");
    std::fs::write(&path, "rpc_prot = 1\n").unwrap();

    let err = FileConfig::load(&path).unwrap_err();
    assert!(matches!(err, LifecycleError::ConfigFile { .. }), "{err}");
}

#[parameterized(
    interval_equals_timeout = { 30_000, 30_000 },
    interval_longer = { 10_000, 20_000 },
    zero_interval = { 10_000, 0 },
    zero_timeout = { 0, 0 },
)]
fn sweep_interval_must_be_shorter_than_timeout(timeout_ms: u64, interval_ms: u64) {
    let config = HubConfig {
        heartbeat_timeout: Duration::from_millis(timeout_ms),
        sweep_interval: Duration::from_millis(interval_ms),
        ..HubConfig::defaults("/tmp/bh")
    };
    assert!(matches!(config.validate(), Err(LifecycleError::InvalidConfig(_))));
}

#[test]
fn zero_default_concurrency_is_invalid() {
    let config = HubConfig { default_max_concurrency: 0, ..HubConfig::defaults("/tmp/bh") };
    assert!(matches!(config.validate(), Err(LifecycleError::InvalidConfig(_))));
}

#[test]
#[serial]
fn env_overrides_file() {
    clear_env();
    std::env::set_var("BH_RPC_PORT", "9100");
    std::env::set_var("BH_HEARTBEAT_TIMEOUT_MS", "60000");
    std::env::set_var("BH_DEFAULT_MAX_CONCURRENCY", "not-a-number");

    let file = FileConfig { rpc_port: Some(9000), default_max_concurrency: Some(3), ..FileConfig::default() };
    let config = HubConfig::defaults("/tmp/bh").with_file(file).with_env();
    clear_env();

    assert_eq!(config.rpc_port, 9100);
    assert_eq!(config.heartbeat_timeout, Duration::from_secs(60));
    // Unparseable values fall through to the previous layer
    assert_eq!(config.default_max_concurrency, 3);
}

#[test]
#[serial]
fn load_reads_hub_toml_from_state_dir() {
    clear_env();
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("hub.toml"), "channel_port = 9999\n").unwrap();
    std::env::set_var("BH_STATE_DIR", dir.path());

    let config = HubConfig::load();
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.state_dir, dir.path());
    assert_eq!(config.channel_port, 9999);
}

#[test]
#[serial]
fn load_rejects_invalid_env_combination() {
    clear_env();
    let dir = tempdir().unwrap();
    std::env::set_var("BH_STATE_DIR", dir.path());
    std::env::set_var("BH_SWEEP_INTERVAL_MS", "100000");

    let result = HubConfig::load();
    clear_env();

    assert!(matches!(result, Err(LifecycleError::InvalidConfig(_))));
}

#[test]
#[serial]
fn state_dir_precedence() {
    clear_env();
    let saved_xdg = std::env::var("XDG_STATE_HOME").ok();

    std::env::set_var("XDG_STATE_HOME", "/xdg");
    assert_eq!(env::state_dir().unwrap(), PathBuf::from("/xdg/benchhub"));
    std::env::set_var("BH_STATE_DIR", "/explicit");
    assert_eq!(env::state_dir().unwrap(), PathBuf::from("/explicit"));

    clear_env();
    match saved_xdg {
        Some(v) => std::env::set_var("XDG_STATE_HOME", v),
        None => std::env::remove_var("XDG_STATE_HOME"),
    }
}
