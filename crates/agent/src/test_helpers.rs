// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::time::Duration;

use bh_hub::{Hub, HubConfig};
use tempfile::TempDir;

use crate::client::HubClient;
use crate::config::AgentConfig;

/// An in-process hub on ephemeral loopback ports.
pub(crate) struct TestHub {
    pub hub: Hub,
    _dir: TempDir,
}

impl TestHub {
    pub async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let config = HubConfig {
            heartbeat_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(5),
            ..HubConfig::for_state_dir(dir.path())
        };
        let hub = Hub::start(config).await.unwrap();
        Self { hub, _dir: dir }
    }

    pub fn client(&self) -> HubClient {
        HubClient::new(self.hub.rpc_addr().to_string())
    }

    pub fn agent_config(&self, name: &str) -> AgentConfig {
        AgentConfig {
            hub_host: "127.0.0.1".into(),
            rpc_port: self.hub.rpc_addr().port(),
            channel_port: self.hub.channel_addr().port(),
            heartbeat_interval: Duration::from_millis(100),
            registration_backoff: Duration::from_millis(50),
            ..AgentConfig::new(name, "127.0.0.1")
        }
    }

    pub async fn stop(self) {
        self.hub.shutdown().await.unwrap();
    }
}

/// Poll `check` until it yields a value, failing after five seconds.
pub(crate) async fn eventually<T, F, Fut>(what: &str, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(value) = check().await {
            return value;
        }
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
