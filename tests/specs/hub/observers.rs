// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observers get a snapshot first, then every change in order.

use crate::prelude::*;

#[tokio::test]
async fn snapshot_reflects_current_state() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (agent_id, _agent) = hub.connect_agent("bench-a", 2).await;
    client.register(&registration("bench-b", "10.0.0.2")).await.unwrap();
    let receipt = client.dispatch("job/1", Some("cpu".into()), Some(agent_id.clone()), None).await.unwrap();

    // Finished tasks are not part of the snapshot
    let done = client.dispatch("job/2", None, Some(agent_id.clone()), None).await.unwrap();
    client.cancel(&done.task_id).await.unwrap();

    let mut observer = hub.channel(None).await;
    let first = observer.recv().await;
    let Message::Snapshot(snapshot) = first.message else { panic!("expected snapshot first, got {:?}", first.kind()) };

    let mut names: Vec<_> = snapshot.agents.iter().map(|a| a.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["bench-a", "bench-b"]);
    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].id, receipt.task_id);
    assert_eq!(snapshot.tasks[0].job_name.as_deref(), Some("cpu"));
    hub.stop().await;
}

#[tokio::test]
async fn observers_follow_a_task_through_its_life() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (agent_id, mut agent) = hub.connect_agent("bench-a", 1).await;
    let mut observer = hub.channel(None).await;
    observer.recv_kind(MessageType::Snapshot).await;

    let receipt = client.dispatch("job/1", None, None, None).await.unwrap();
    let Message::TaskAssigned(assigned) = observer.recv_kind(MessageType::TaskAssigned).await.message else {
        unreachable!()
    };
    assert_eq!(assigned.task_id, receipt.task_id);
    assert_eq!(assigned.agent_id, agent_id);

    agent
        .send(Message::TaskProgress(bh_wire::TaskProgressPayload {
            task_id: receipt.task_id.clone(),
            progress_pct: 40,
            stage: Some("warmup".into()),
        }))
        .await;
    let Message::TaskProgress(progress) = observer.recv_kind(MessageType::TaskProgress).await.message else {
        unreachable!()
    };
    assert_eq!(progress.progress_pct, 40);
    assert_eq!(task_status(&client, &receipt.task_id).await, TaskStatus::Running);

    agent
        .send(Message::TaskCompleted(bh_wire::TaskCompletedPayload {
            task_id: receipt.task_id.clone(),
            exit_code: 0,
            result_ref: Some("file:///tmp/r.json".into()),
        }))
        .await;
    let Message::TaskCompleted(completed) = observer.recv_kind(MessageType::TaskCompleted).await.message else {
        unreachable!()
    };
    assert_eq!(completed.task_id, receipt.task_id);

    let task = client.get_task(&receipt.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result_ref.as_deref(), Some("file:///tmp/r.json"));
    assert_eq!(task.exit_code, Some(0));
    hub.stop().await;
}

#[tokio::test]
async fn events_about_someone_elses_task_are_dropped() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let (owner, _owner_ws) = hub.connect_agent("owner", 1).await;
    let (intruder_id, mut intruder) = hub.connect_agent("intruder", 1).await;
    let receipt = client.dispatch("job/1", None, Some(owner.clone()), None).await.unwrap();

    intruder
        .send(Message::TaskFailed(bh_wire::TaskFailedPayload {
            task_id: receipt.task_id.clone(),
            error_message: "not mine".into(),
            exit_code: None,
        }))
        .await;

    // A round trip on the intruder's channel proves the event was processed
    intruder
        .send(Message::StatusUpdate(bh_wire::StatusPayload {
            agent_id: intruder_id.clone(),
            status: AgentStatus::Online,
            cpu_usage_pct: None,
            mem_usage_pct: None,
            current_task_id: None,
            active_task_ids: Vec::new(),
            reconnected: false,
            revision: 0,
        }))
        .await;
    intruder.recv_kind(MessageType::HeartbeatAck).await;

    assert_eq!(task_status(&client, &receipt.task_id).await, TaskStatus::Dispatched);
    hub.stop().await;
}

#[tokio::test]
async fn deregistration_is_announced() {
    let hub = TestHub::start().await;
    let client = hub.client();
    let agent_id = client.register(&registration("bench-a", "10.0.0.1")).await.unwrap();
    let mut observer = hub.channel(None).await;
    observer.recv_kind(MessageType::Snapshot).await;

    client.deregister(&agent_id).await.unwrap();

    let Message::Offline(offline) = observer.recv_kind(MessageType::Offline).await.message else { unreachable!() };
    assert_eq!(offline.agent_id, agent_id);
    assert_eq!(offline.reason, "deregistered");
    assert!(client.get_agent(&agent_id).await.unwrap().is_none());
    hub.stop().await;
}
