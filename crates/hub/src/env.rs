// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the hub crate.

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: BH_STATE_DIR > XDG_STATE_HOME/benchhub > ~/.local/state/benchhub
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("BH_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("benchhub"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/benchhub"))
}

/// Log filter directive (`EnvFilter` syntax)
pub fn log_filter() -> Option<String> {
    std::env::var("BH_LOG").ok().filter(|s| !s.is_empty())
}

pub fn bind() -> Option<IpAddr> {
    parsed("BH_BIND")
}

pub fn rpc_port() -> Option<u16> {
    parsed("BH_RPC_PORT")
}

pub fn channel_port() -> Option<u16> {
    parsed("BH_CHANNEL_PORT")
}

pub fn heartbeat_timeout() -> Option<Duration> {
    millis("BH_HEARTBEAT_TIMEOUT_MS")
}

pub fn sweep_interval() -> Option<Duration> {
    millis("BH_SWEEP_INTERVAL_MS")
}

/// Per-read timeout on RPC connections
pub fn ipc_timeout() -> Option<Duration> {
    millis("BH_IPC_TIMEOUT_MS")
}

pub fn default_max_concurrency() -> Option<u32> {
    parsed("BH_DEFAULT_MAX_CONCURRENCY")
}

fn millis(var: &str) -> Option<Duration> {
    parsed::<u64>(var).map(Duration::from_millis)
}

fn parsed<T: FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.trim().parse::<T>().ok())
}
