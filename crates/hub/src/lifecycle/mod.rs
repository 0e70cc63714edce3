// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub lifecycle management: startup, shutdown, recovery.

mod startup;

use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bh_core::{Clock, SystemClock};
use bh_storage::{SnapshotError, SnapshotFile};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HubConfig;
use crate::ctx::HubCtx;
use crate::observer::Subscription;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire lock: hub already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind {0}: {1}")]
    BindFailed(SocketAddr, #[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running hub.
pub struct Hub<C: Clock = SystemClock> {
    config: HubConfig,
    ctx: Arc<HubCtx<C>>,
    rpc_addr: SocketAddr,
    channel_addr: SocketAddr,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    registry_file: SnapshotFile,
    tasks_file: SnapshotFile,
    _registry_events: Subscription,
    // Held to maintain the exclusive lock; released on drop
    _lock_file: File,
}

impl Hub<SystemClock> {
    /// Start a hub on the system clock.
    pub async fn start(config: HubConfig) -> Result<Self, LifecycleError> {
        startup::start(config, SystemClock).await
    }
}

impl<C: Clock> Hub<C> {
    pub async fn start_with_clock(config: HubConfig, clock: C) -> Result<Self, LifecycleError> {
        startup::start(config, clock).await
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Bound RPC address (the real port when configured with 0).
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    pub fn channel_addr(&self) -> SocketAddr {
        self.channel_addr
    }

    pub fn ctx(&self) -> &Arc<HubCtx<C>> {
        &self.ctx
    }

    /// Stop serving, flush both tables and release the lock.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("shutting down hub");
        self.cancel.cancel();
        self.ctx.router.close_all();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "hub task ended abnormally");
            }
        }

        // Final flush after the background writers have stopped
        flush(&self.registry_file, &self.ctx.registry.table(), "registry");
        flush(&self.tasks_file, &self.ctx.ledger.table(), "tasks");

        let lock_path = self.config.lock_path();
        if lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&lock_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        info!("hub shutdown complete");
        Ok(())
    }
}

fn flush<T: Serialize>(file: &SnapshotFile, table: &T, name: &str) {
    match file.save(table) {
        Ok(result) => info!(table = name, size_bytes = result.size_bytes, "saved shutdown snapshot"),
        Err(e) => warn!(table = name, error = %e, "failed to save shutdown snapshot"),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
