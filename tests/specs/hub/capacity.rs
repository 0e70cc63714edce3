// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch never puts an agent over its concurrency limit.

use bh_agent::ClientError;
use bh_core::TaskPatch;

use crate::prelude::*;

fn rejected_kind(err: ClientError) -> ErrorKind {
    err.kind().unwrap_or_else(|| panic!("expected a hub rejection, got {err}"))
}

#[tokio::test]
async fn third_dispatch_to_a_two_slot_agent_is_refused() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (agent_id, mut agent) = hub.connect_agent("bench-a", 2).await;

    let first = client.dispatch("job/1", None, None, None).await.unwrap();
    let second = client.dispatch("job/2", None, None, None).await.unwrap();
    assert_eq!(first.agent_id, agent_id);
    assert_eq!(second.agent_id, agent_id);
    assert_ne!(first.task_id, second.task_id);

    let err = client.dispatch("job/3", None, Some(agent_id.clone()), None).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::CapacityExceeded);
    let err = client.dispatch("job/3", None, None, None).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::CapacityExceeded);

    // Both assignments reached the agent
    for expected in [&first.task_id, &second.task_id] {
        let Message::TaskAssigned(p) = agent.recv_kind(MessageType::TaskAssigned).await.message else {
            unreachable!()
        };
        assert_eq!(&p.task_id, expected);
        assert_eq!(p.agent_id, agent_id);
    }

    let record = client.get_agent(&agent_id).await.unwrap().unwrap();
    assert_eq!(record.active_task_ids.len(), 2);
    assert_eq!(record.status, AgentStatus::Busy);
    hub.stop().await;
}

#[tokio::test]
async fn finishing_a_task_frees_its_slot() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (agent_id, _agent) = hub.connect_agent("bench-a", 2).await;

    let first = client.dispatch("job/1", None, None, None).await.unwrap();
    client.dispatch("job/2", None, None, None).await.unwrap();

    client.update_task(&first.task_id, TaskStatus::Running, None).await.unwrap();
    let done = TaskPatch { exit_code: Some(0), result_ref: Some("s3://results/1".into()), ..TaskPatch::default() };
    client.update_task(&first.task_id, TaskStatus::Completed, Some(done)).await.unwrap();

    let fourth = client.dispatch("job/4", None, Some(agent_id.clone()), None).await.unwrap();
    assert_eq!(fourth.agent_id, agent_id);

    let record = client.get_agent(&agent_id).await.unwrap().unwrap();
    assert!(record.active_task_ids.len() <= record.max_concurrency as usize);
    assert!(!record.active_task_ids.contains(&first.task_id));

    let finished = client.get_task(&first.task_id).await.unwrap().unwrap();
    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(finished.result_ref.as_deref(), Some("s3://results/1"));
    assert!(finished.completed_at_ms.is_some());
    hub.stop().await;
}

#[tokio::test]
async fn completing_a_task_that_never_started_is_illegal() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (_agent_id, _agent) = hub.connect_agent("bench-a", 1).await;

    let receipt = client.dispatch("job/1", None, None, None).await.unwrap();
    let err = client.update_task(&receipt.task_id, TaskStatus::Completed, None).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::IllegalTransition);
    assert_eq!(task_status(&client, &receipt.task_id).await, TaskStatus::Dispatched);
    hub.stop().await;
}

#[tokio::test]
async fn explicit_target_must_be_connected() {
    let hub = TestHub::start().await;
    let client = hub.client();
    // Registered but never opened a control channel
    let agent_id = client.register(&registration("silent", "10.0.0.9")).await.unwrap();

    let err = client.dispatch("job/1", None, Some(agent_id.clone()), None).await.unwrap_err();
    assert_eq!(rejected_kind(err), ErrorKind::Unreachable);

    let tasks = client.list_tasks(bh_wire::TaskFilter::agent(agent_id.clone())).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Failed);
    assert_eq!(tasks[0].error_message.as_deref(), Some("agent unreachable"));

    let record = client.get_agent(&agent_id).await.unwrap().unwrap();
    assert!(record.active_task_ids.is_empty());
    hub.stop().await;
}

#[tokio::test]
async fn re_registration_keeps_the_agent_identity() {
    let hub = TestHub::start().await;
    let client = hub.client();

    let first = client.register(&registration("bench-a", "10.0.0.1")).await.unwrap();
    let again = client.register(&registration("bench-a", "10.0.0.1")).await.unwrap();
    let other_host = client.register(&registration("bench-a", "10.0.0.2")).await.unwrap();

    assert_eq!(first, again);
    assert_ne!(first, other_host);
    assert_eq!(client.list_agents().await.unwrap().len(), 2);
    hub.stop().await;
}
