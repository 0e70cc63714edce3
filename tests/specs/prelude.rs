// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the hub scenarios.

use std::future::Future;
use std::time::Duration;

pub use bh_agent::HubClient;
pub use bh_core::test_support::registration;
pub use bh_core::{AgentId, AgentStatus, FakeClock, Registration, TaskId, TaskStatus};
pub use bh_hub::{Hub, HubConfig};
pub use bh_wire::{Envelope, ErrorKind, Message, MessageType};

use futures_util::{SinkExt, StreamExt};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A hub on ephemeral loopback ports driven by a fake clock.
///
/// The background sweeper runs on its real-time interval; scenarios that need
/// expiry call `sweep()` after advancing the clock.
pub struct TestHub {
    pub hub: Hub<FakeClock>,
    pub clock: FakeClock,
    pub dir: TempDir,
}

impl TestHub {
    pub async fn start() -> Self {
        Self::start_in(TempDir::new().unwrap(), FakeClock::new()).await
    }

    pub async fn start_in(dir: TempDir, clock: FakeClock) -> Self {
        let config = HubConfig {
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
            sweep_interval: Duration::from_secs(30),
            ..HubConfig::for_state_dir(dir.path())
        };
        let hub = Hub::start_with_clock(config, clock.clone()).await.unwrap();
        Self { hub, clock, dir }
    }

    /// Stop the hub and hand back its state dir and clock for a restart.
    pub async fn stop(self) -> (TempDir, FakeClock) {
        self.hub.shutdown().await.unwrap();
        (self.dir, self.clock)
    }

    pub fn client(&self) -> HubClient {
        HubClient::new(self.hub.rpc_addr().to_string())
    }

    pub fn sweep(&self) {
        self.hub.ctx().sweep();
    }

    /// Register over RPC and open the agent's control channel.
    pub async fn connect_agent(&self, name: &str, max_concurrency: u32) -> (AgentId, Ws) {
        let reg = Registration { max_concurrency: Some(max_concurrency), ..registration(name, "10.0.0.1") };
        let agent_id = self.client().register(&reg).await.unwrap();
        let ws = self.channel(Some(&agent_id)).await;
        let ctx = std::sync::Arc::clone(self.hub.ctx());
        eventually("agent channel attached", || {
            let attached = ctx.router.is_connected(&agent_id);
            async move { attached.then_some(()) }
        })
        .await;
        (agent_id, ws)
    }

    /// Observer connection (no agent id) or agent connection.
    pub async fn channel(&self, agent_id: Option<&AgentId>) -> Ws {
        let url = match agent_id {
            Some(id) => format!("ws://{}/?agent_id={id}", self.hub.channel_addr()),
            None => format!("ws://{}/", self.hub.channel_addr()),
        };
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        Ws(ws)
    }
}

/// A control-channel connection speaking envelopes.
pub struct Ws(WebSocketStream<MaybeTlsStream<TcpStream>>);

impl Ws {
    pub async fn recv(&mut self) -> Envelope {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.0.next())
                .await
                .expect("timed out waiting for a message")
                .expect("stream ended")
                .unwrap();
            if let WsMessage::Text(text) = frame {
                return Envelope::from_json(&text).unwrap();
            }
        }
    }

    /// Skip messages until one of `kind` arrives.
    pub async fn recv_kind(&mut self, kind: MessageType) -> Envelope {
        loop {
            let envelope = self.recv().await;
            if envelope.kind() == kind {
                return envelope;
            }
        }
    }

    pub async fn send(&mut self, message: Message) {
        let json = Envelope::new(message, 0).to_json().unwrap();
        self.0.send(WsMessage::text(json)).await.unwrap();
    }

    pub async fn close(mut self) {
        let _ = self.0.close(None).await;
    }
}

/// Poll `check` until it yields a value, failing after five seconds.
pub async fn eventually<T, F, Fut>(what: &str, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        if let Some(value) = check().await {
            return value;
        }
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub async fn task_status(client: &HubClient, task_id: &TaskId) -> TaskStatus {
    client.get_task(task_id).await.unwrap().unwrap().status
}
