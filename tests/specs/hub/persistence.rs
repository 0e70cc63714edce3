// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State survives a hub restart; liveness is re-established from scratch.

use std::time::Duration;

use bh_core::LoadReport;

use crate::prelude::*;

#[tokio::test]
async fn restart_restores_agents_offline_with_their_tasks() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (agent_id, _agent) = hub.connect_agent("bench-a", 2).await;
    let receipt = client.dispatch("job/1", Some("cpu".into()), None, None).await.unwrap();
    let (dir, clock) = hub.stop().await;

    let hub = TestHub::start_in(dir, clock).await;
    let client = hub.client();

    let agent = client.get_agent(&agent_id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Offline);
    assert_eq!(agent.active_task_ids, vec![receipt.task_id.clone()]);
    let task = client.get_task(&receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Dispatched);
    assert_eq!(task.job_name.as_deref(), Some("cpu"));

    // Nobody reclaims the agent within the timeout: its work is written off
    hub.clock.advance(HEARTBEAT_TIMEOUT + Duration::from_secs(1));
    hub.sweep();

    let task = client.get_task(&receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("agent offline: heartbeat timeout"));
    assert!(client.get_agent(&agent_id).await.unwrap().unwrap().active_task_ids.is_empty());
    hub.stop().await;
}

#[tokio::test]
async fn restored_agent_comes_back_with_a_heartbeat() {
    let hub = TestHub::start().await;
    let agent_id = hub.client().register(&registration("bench-a", "10.0.0.1")).await.unwrap();
    let (dir, clock) = hub.stop().await;

    let hub = TestHub::start_in(dir, clock).await;
    let client = hub.client();
    assert_eq!(client.get_agent(&agent_id).await.unwrap().unwrap().status, AgentStatus::Offline);

    client.heartbeat(&agent_id, LoadReport::online()).await.unwrap();
    assert_eq!(client.get_agent(&agent_id).await.unwrap().unwrap().status, AgentStatus::Online);
    hub.stop().await;
}

#[tokio::test]
async fn finished_tasks_survive_a_restart() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (_agent_id, _agent) = hub.connect_agent("bench-a", 1).await;
    let receipt = client.dispatch("job/1", None, None, None).await.unwrap();
    client.cancel(&receipt.task_id).await.unwrap();
    let before = client.stats().await.unwrap();
    let (dir, clock) = hub.stop().await;

    let hub = TestHub::start_in(dir, clock).await;
    let client = hub.client();
    assert_eq!(task_status(&client, &receipt.task_id).await, TaskStatus::Cancelled);
    assert_eq!(client.stats().await.unwrap(), before);
    assert_eq!(before.cancelled, 1);
    hub.stop().await;
}
