// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bh agent`: run a benchmark agent on this machine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bh_agent::{AgentConfig, AgentSession, CommandRunner, DirectoryUploader};
use clap::Args;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug, Clone, PartialEq)]
pub struct AgentArgs {
    /// Agent name; with --host it determines the agent id
    #[arg(long)]
    pub name: String,
    /// Shell command run for every job (sees BH_JOB_REF, BH_TASK_ID, BH_JOB_NAME)
    #[arg(long)]
    pub exec: String,
    /// Address the hub knows this agent by
    #[arg(long, env = "BH_AGENT_HOST", default_value = "localhost")]
    pub host: String,
    #[arg(long, default_value_t = 0)]
    pub port: u16,
    /// Hub control-channel port
    #[arg(long, default_value_t = bh_agent::config::DEFAULT_CHANNEL_PORT)]
    pub channel_port: u16,
    /// Advertised capability (repeatable)
    #[arg(long = "capability", value_name = "CAP")]
    pub capabilities: Vec<String>,
    /// Advertised tag (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_concurrency: u32,
    #[arg(long, default_value_t = 30)]
    pub heartbeat_secs: u64,
    /// Delay between registration attempts and reconnects
    #[arg(long, default_value_t = 5)]
    pub backoff_secs: u64,
    /// Give up after this many failed registrations (default: never)
    #[arg(long)]
    pub max_attempts: Option<u32>,
    /// Per-task artifact directories are created under here (BH_ARTIFACT_DIR)
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,
    /// Copy artifacts here after a successful run and report the location
    #[arg(long)]
    pub report_dir: Option<PathBuf>,
}

impl AgentArgs {
    pub fn config(&self, hub: &str) -> AgentConfig {
        AgentConfig {
            port: self.port,
            channel_port: self.channel_port,
            capabilities: self.capabilities.iter().cloned().collect(),
            tags: self.tags.iter().cloned().collect(),
            max_concurrency: self.max_concurrency,
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs.max(1)),
            registration_backoff: Duration::from_secs(self.backoff_secs),
            max_registration_attempts: self.max_attempts,
            ..AgentConfig::new(&self.name, &self.host).with_hub(hub)
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_env("BH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(std::io::stderr)).init();
}

pub async fn run(args: AgentArgs, hub: &str) -> Result<()> {
    init_logging();
    let config = args.config(hub);
    tracing::info!(
        agent_id = %config.agent_id(),
        name = %config.name,
        hub = %config.rpc_addr(),
        max_concurrency = config.max_concurrency,
        "starting agent"
    );

    let mut runner = CommandRunner::new(&args.exec);
    if let Some(dir) = &args.artifact_dir {
        runner = runner.with_artifact_root(dir);
    }
    let mut session = AgentSession::new(config, Arc::new(runner));
    if let Some(dir) = &args.report_dir {
        session = session.with_uploader(Arc::new(DirectoryUploader::new(dir)));
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
            }
            cancel.cancel();
        }
    });

    session.run(cancel).await?;
    Ok(())
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
