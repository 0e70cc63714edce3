// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use bh_core::{AgentId, Registration};

pub const DEFAULT_HUB_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 7420;
pub const DEFAULT_CHANNEL_PORT: u16 = 7421;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REGISTRATION_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub hub_host: String,
    pub rpc_port: u16,
    pub channel_port: u16,

    pub name: String,
    /// Address the hub knows this agent by; part of its identity
    pub host: String,
    pub port: u16,
    pub platform: String,
    pub arch: String,
    pub cpu_count: u32,
    pub memory_gb: f64,
    pub capabilities: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub max_concurrency: u32,

    pub heartbeat_interval: Duration,
    /// Delay between registration attempts and between reconnects
    pub registration_backoff: Duration,
    /// `None` retries forever
    pub max_registration_attempts: Option<u32>,
}

impl AgentConfig {
    /// Config for this machine with the given agent name.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            hub_host: DEFAULT_HUB_HOST.to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            channel_port: DEFAULT_CHANNEL_PORT,
            name: name.into(),
            host: host.into(),
            port: 0,
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: std::thread::available_parallelism().map_or(1, |n| n.get() as u32),
            memory_gb: crate::load::total_memory_gb().unwrap_or(0.0),
            capabilities: BTreeSet::new(),
            tags: BTreeSet::new(),
            max_concurrency: 1,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            registration_backoff: DEFAULT_REGISTRATION_BACKOFF,
            max_registration_attempts: None,
        }
    }

    /// Point at a hub given as `host` or `host:port` (the RPC port).
    ///
    /// The channel port stays at its current value.
    pub fn with_hub(mut self, hub: &str) -> Self {
        match hub.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => {
                    self.hub_host = host.to_string();
                    self.rpc_port = port;
                }
                Err(_) => self.hub_host = hub.to_string(),
            },
            None => self.hub_host = hub.to_string(),
        }
        self
    }

    pub fn agent_id(&self) -> AgentId {
        AgentId::resolve(&self.name, &self.host)
    }

    pub fn registration(&self) -> Registration {
        Registration {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            platform: self.platform.clone(),
            arch: self.arch.clone(),
            cpu_count: self.cpu_count,
            memory_gb: self.memory_gb,
            capabilities: self.capabilities.clone(),
            tags: self.tags.clone(),
            max_concurrency: Some(self.max_concurrency),
        }
    }

    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.hub_host, self.rpc_port)
    }

    pub fn channel_url(&self, agent_id: &AgentId) -> String {
        format!("ws://{}:{}/?agent_id={}", self.hub_host, self.channel_port, agent_id)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
