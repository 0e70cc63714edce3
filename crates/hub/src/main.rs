// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bhd`: the benchmark hub daemon.

use std::path::Path;

use anyhow::Context;
use bh_hub::{env, Hub, HubConfig};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = HubConfig::load().context("failed to load hub configuration")?;
    let _guard = init_logging(&config.state_dir);

    let hub = Hub::start(config).await.context("failed to start hub")?;
    info!(rpc = %hub.rpc_addr(), channel = %hub.channel_addr(), "ready");

    wait_for_shutdown().await;
    hub.shutdown().await?;
    Ok(())
}

/// Console plus `hub.log` in the state directory.
///
/// File logging is skipped with a warning when the directory is not
/// writable, since the rolling appender cannot recover from that.
fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = env::log_filter().map(EnvFilter::new).unwrap_or_else(|| EnvFilter::new("info"));

    let (file_layer, guard) = match preflight(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(log_dir, "hub.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Warning: could not write to {} ({}), file logging disabled", log_dir.display(), e);
            (None, None)
        }
    };

    let console_layer = tracing_subscriber::fmt::layer().with_target(true);
    tracing_subscriber::registry().with(filter).with(console_layer).with(file_layer).init();
    guard
}

fn preflight(log_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let probe = log_dir.join(".bh_write_test");
    std::fs::OpenOptions::new().create(true).append(true).open(&probe)?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
