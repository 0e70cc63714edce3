// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub startup and initialization logic.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use bh_core::Clock;
use bh_storage::{Checkpointer, SnapshotFile};
use fs2::FileExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Hub, LifecycleError};
use crate::channel::{self, Router};
use crate::config::HubConfig;
use crate::ctx::HubCtx;
use crate::ledger::{TaskLedger, TaskTable};
use crate::listener::Listener;
use crate::registry::{AgentRegistry, AgentTable};
use crate::sweeper;

pub(super) async fn start<C: Clock>(config: HubConfig, clock: C) -> Result<Hub<C>, LifecycleError> {
    config.validate()?;
    match start_inner(config.clone(), clock).await {
        Ok(hub) => Ok(hub),
        Err(e) => {
            // The lock file belongs to the running hub
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(&config);
            }
            Err(e)
        }
    }
}

async fn start_inner<C: Clock>(config: HubConfig, clock: C) -> Result<Hub<C>, LifecycleError> {
    // 1. State directory and exclusive lock before touching anything else.
    // Open without truncating so a running hub's pid survives a failed attempt.
    std::fs::create_dir_all(&config.state_dir)?;
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(config.lock_path())?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 2. Recover both tables
    let registry_file = SnapshotFile::new(config.registry_path());
    let tasks_file = SnapshotFile::new(config.tasks_path());
    let agents: AgentTable = registry_file.load()?.map(|s| s.state).unwrap_or_default();
    let tasks: TaskTable = tasks_file.load()?.map(|s| s.state).unwrap_or_default();
    info!(agents = agents.len(), tasks = tasks.len(), "recovered state");

    // 3. Bind before spawning anything so failures leave nothing running
    let rpc = bind(config.rpc_addr()).await?;
    let channel_listener = bind(config.channel_addr()).await?;
    let rpc_addr = rpc.local_addr()?;
    let channel_addr = channel_listener.local_addr()?;

    // 4. Build the hub
    let cancel = CancellationToken::new();
    let (registry_checkpoint, registry_flusher) = Checkpointer::spawn(registry_file.clone(), cancel.clone());
    let (tasks_checkpoint, tasks_flusher) = Checkpointer::spawn(tasks_file.clone(), cancel.clone());

    let registry = Arc::new(
        AgentRegistry::new(clock.clone(), config.default_max_concurrency)
            .with_records(agents)
            .with_checkpoint(registry_checkpoint),
    );
    let router = Arc::new(Router::new(clock.clone(), config.queue_capacity));
    let ledger = Arc::new(
        TaskLedger::new(clock.clone(), Arc::clone(&registry), router.clone())
            .with_records(tasks)
            .with_checkpoint(tasks_checkpoint),
    );
    let registry_events = channel::publish_registry_events(&registry, Arc::clone(&router));
    let ctx = Arc::new(HubCtx {
        clock,
        registry,
        ledger,
        router,
        heartbeat_timeout: config.heartbeat_timeout,
        ipc_timeout: config.ipc_timeout,
    });

    // 5. Serve
    let tasks = vec![
        registry_flusher,
        tasks_flusher,
        tokio::spawn(Listener::new(rpc, Arc::clone(&ctx)).run(cancel.clone())),
        tokio::spawn(channel::serve(channel_listener, Arc::clone(&ctx), cancel.clone())),
        tokio::spawn(sweeper::run(Arc::clone(&ctx), config.sweep_interval, cancel.clone())),
    ];
    info!(%rpc_addr, %channel_addr, "hub started");

    Ok(Hub {
        config,
        ctx,
        rpc_addr,
        channel_addr,
        cancel,
        tasks,
        registry_file,
        tasks_file,
        _registry_events: registry_events,
        _lock_file: lock_file,
    })
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, LifecycleError> {
    TcpListener::bind(addr).await.map_err(|e| LifecycleError::BindFailed(addr, e))
}

fn cleanup_on_failure(config: &HubConfig) {
    let lock_path = config.lock_path();
    if lock_path.exists() {
        let _ = std::fs::remove_file(&lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
