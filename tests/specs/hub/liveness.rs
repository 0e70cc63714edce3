// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat expiry, reconnection and disconnect handling.

use std::time::Duration;

use bh_core::LoadReport;

use crate::prelude::*;

#[tokio::test]
async fn silent_agent_expires_and_its_task_fails() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (agent_id, _agent) = hub.connect_agent("bench-a", 1).await;
    let receipt = client.dispatch("job/1", None, None, None).await.unwrap();

    hub.clock.advance(HEARTBEAT_TIMEOUT - Duration::from_secs(1));
    hub.sweep();
    assert_eq!(client.get_agent(&agent_id).await.unwrap().unwrap().status, AgentStatus::Busy);

    hub.clock.advance(Duration::from_secs(2));
    hub.sweep();

    let agent = client.get_agent(&agent_id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Offline);
    assert!(agent.active_task_ids.is_empty());

    let task = client.get_task(&receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("agent offline: heartbeat timeout"));
    assert!(task.completed_at_ms.is_some());

    // A second pass changes nothing
    hub.sweep();
    assert_eq!(client.get_task(&receipt.task_id).await.unwrap().unwrap(), task);
    hub.stop().await;
}

#[tokio::test]
async fn heartbeat_brings_an_expired_agent_back() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let agent_id = client.register(&registration("bench-a", "10.0.0.1")).await.unwrap();
    let mut observer = hub.channel(None).await;
    observer.recv_kind(MessageType::Snapshot).await;

    hub.clock.advance(HEARTBEAT_TIMEOUT + Duration::from_secs(1));
    hub.sweep();

    let Message::Offline(offline) = observer.recv_kind(MessageType::Offline).await.message else { unreachable!() };
    assert_eq!(offline.agent_id, agent_id);
    assert_eq!(offline.reason, "heartbeat timeout");

    client.heartbeat(&agent_id, LoadReport::online()).await.unwrap();

    let Message::StatusUpdate(status) = observer.recv_kind(MessageType::StatusUpdate).await.message else {
        unreachable!()
    };
    assert_eq!(status.agent_id, agent_id);
    assert_eq!(status.status, AgentStatus::Online);
    assert!(status.reconnected);
    assert!(status.revision > offline.revision);

    // A routine heartbeat after that is a plain update
    client.heartbeat(&agent_id, LoadReport::online()).await.unwrap();
    let Message::StatusUpdate(status) = observer.recv_kind(MessageType::StatusUpdate).await.message else {
        unreachable!()
    };
    assert!(!status.reconnected);
    hub.stop().await;
}

#[tokio::test]
async fn channel_heartbeat_is_acknowledged_to_the_agent() {
    let hub = TestHub::start().await;
    let (agent_id, mut agent) = hub.connect_agent("bench-a", 1).await;

    agent
        .send(Message::StatusUpdate(bh_wire::StatusPayload {
            agent_id: agent_id.clone(),
            status: AgentStatus::Online,
            cpu_usage_pct: Some(12.5),
            mem_usage_pct: Some(40.0),
            current_task_id: None,
            active_task_ids: Vec::new(),
            reconnected: false,
            revision: 0,
        }))
        .await;

    let Message::HeartbeatAck(ack) = agent.recv_kind(MessageType::HeartbeatAck).await.message else {
        unreachable!()
    };
    assert_eq!(ack.agent_id, agent_id);
    assert_eq!(ack.status, AgentStatus::Online);

    let record = hub.client().get_agent(&agent_id).await.unwrap().unwrap();
    assert_eq!(record.cpu_usage_pct, Some(12.5));
    hub.stop().await;
}

#[tokio::test]
async fn closing_the_channel_fails_held_tasks() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (agent_id, agent) = hub.connect_agent("bench-a", 2).await;
    let receipt = client.dispatch("job/1", None, None, None).await.unwrap();

    agent.close().await;

    let task = eventually("task failed", || {
        let client = client.clone();
        let task_id = receipt.task_id.clone();
        async move { client.get_task(&task_id).await.ok().flatten().filter(|t| t.status == TaskStatus::Failed) }
    })
    .await;
    assert_eq!(task.error_message.as_deref(), Some("agent offline: disconnected"));

    let agent = client.get_agent(&agent_id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Offline);
    assert!(agent.active_task_ids.is_empty());
    assert!(!hub.hub.ctx().router.is_connected(&agent_id));
    hub.stop().await;
}
