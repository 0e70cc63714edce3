// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub configuration: defaults, then `hub.toml`, then `BH_*` overrides.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::channel::DEFAULT_QUEUE_CAPACITY;
use crate::env;
use crate::lifecycle::LifecycleError;

pub const DEFAULT_RPC_PORT: u16 = 7420;
pub const DEFAULT_CHANNEL_PORT: u16 = 7421;

/// Resolved hub settings and the paths derived from the state directory.
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    pub state_dir: PathBuf,
    pub bind: IpAddr,
    pub rpc_port: u16,
    pub channel_port: u16,
    pub heartbeat_timeout: Duration,
    pub sweep_interval: Duration,
    pub ipc_timeout: Duration,
    pub default_max_concurrency: u32,
    /// Outbound queue depth per control-channel connection
    pub queue_capacity: usize,
}

impl HubConfig {
    pub fn defaults(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            rpc_port: DEFAULT_RPC_PORT,
            channel_port: DEFAULT_CHANNEL_PORT,
            heartbeat_timeout: Duration::from_secs(90),
            sweep_interval: Duration::from_secs(30),
            ipc_timeout: Duration::from_secs(5),
            default_max_concurrency: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Loopback on ephemeral ports, for in-process hubs.
    pub fn for_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self { bind: IpAddr::V4(Ipv4Addr::LOCALHOST), rpc_port: 0, channel_port: 0, ..Self::defaults(state_dir) }
    }

    /// Resolve the full configuration for the `bhd` binary.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        let file = FileConfig::load(&state_dir.join("hub.toml"))?;
        let config = Self::defaults(state_dir).with_file(file.unwrap_or_default()).with_env();
        config.validate()?;
        Ok(config)
    }

    pub fn with_file(mut self, file: FileConfig) -> Self {
        if let Some(bind) = file.bind {
            self.bind = bind;
        }
        if let Some(port) = file.rpc_port {
            self.rpc_port = port;
        }
        if let Some(port) = file.channel_port {
            self.channel_port = port;
        }
        if let Some(ms) = file.heartbeat_timeout_ms {
            self.heartbeat_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.sweep_interval_ms {
            self.sweep_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.ipc_timeout_ms {
            self.ipc_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = file.default_max_concurrency {
            self.default_max_concurrency = max;
        }
        if let Some(capacity) = file.queue_capacity {
            self.queue_capacity = capacity;
        }
        self
    }

    pub fn with_env(mut self) -> Self {
        self.bind = env::bind().unwrap_or(self.bind);
        self.rpc_port = env::rpc_port().unwrap_or(self.rpc_port);
        self.channel_port = env::channel_port().unwrap_or(self.channel_port);
        self.heartbeat_timeout = env::heartbeat_timeout().unwrap_or(self.heartbeat_timeout);
        self.sweep_interval = env::sweep_interval().unwrap_or(self.sweep_interval);
        self.ipc_timeout = env::ipc_timeout().unwrap_or(self.ipc_timeout);
        self.default_max_concurrency = env::default_max_concurrency().unwrap_or(self.default_max_concurrency);
        self
    }

    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.heartbeat_timeout.is_zero() {
            return Err(LifecycleError::InvalidConfig("heartbeat timeout must be positive".to_string()));
        }
        if self.sweep_interval.is_zero() || self.sweep_interval >= self.heartbeat_timeout {
            return Err(LifecycleError::InvalidConfig(format!(
                "sweep interval ({}ms) must be positive and shorter than the heartbeat timeout ({}ms)",
                self.sweep_interval.as_millis(),
                self.heartbeat_timeout.as_millis()
            )));
        }
        if self.default_max_concurrency == 0 {
            return Err(LifecycleError::InvalidConfig("default max concurrency must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn rpc_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.rpc_port)
    }

    pub fn channel_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.channel_port)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir.join("registry.snapshot")
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.state_dir.join("tasks.snapshot")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("hub.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("hub.log")
    }
}

/// Optional settings from `hub.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<IpAddr>,
    pub rpc_port: Option<u16>,
    pub channel_port: Option<u16>,
    pub heartbeat_timeout_ms: Option<u64>,
    pub sweep_interval_ms: Option<u64>,
    pub ipc_timeout_ms: Option<u64>,
    pub default_max_concurrency: Option<u32>,
    pub queue_capacity: Option<usize>,
}

impl FileConfig {
    /// Read `path`, or `None` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, LifecycleError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&text)
            .map(Some)
            .map_err(|source| LifecycleError::ConfigFile { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
