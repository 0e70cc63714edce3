// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bh_core::{AgentId, TaskId};
use bh_wire::{OfflinePayload, TaskFailedPayload, TaskProgressPayload};
use serial_test::serial;
use yare::parameterized;

use super::*;

#[parameterized(
    explicit = { "hub.lan:7420", Some("hub.lan:9999"), "ws://hub.lan:9999/" },
    derived = { "hub.lan:7420", None, "ws://hub.lan:7421/" },
    bare_host = { "hub.lan", None, "ws://hub.lan:7421/" },
)]
fn url(hub: &str, channel: Option<&str>, expected: &str) {
    assert_eq!(channel_url(hub, channel), expected);
}

fn line(message: Message) -> String {
    std::env::set_var("NO_COLOR", "1");
    let text = describe(&Envelope::new(message, 1_700_000_000_000));
    std::env::remove_var("NO_COLOR");
    text
}

#[test]
#[serial]
fn progress_line() {
    let text = line(Message::TaskProgress(TaskProgressPayload {
        task_id: TaskId::new("tsk-1"),
        progress_pct: 40,
        stage: Some("warmup".into()),
    }));
    assert!(text.ends_with("task-progress    tsk-1 40% warmup"), "{text}");
}

#[test]
#[serial]
fn offline_line_counts_released_tasks() {
    let text = line(Message::Offline(OfflinePayload {
        agent_id: AgentId::new("agent-1"),
        reason: "heartbeat timeout".into(),
        released_task_ids: vec![TaskId::new("tsk-1"), TaskId::new("tsk-2")],
        revision: 0,
    }));
    assert!(text.ends_with("agent-1 heartbeat timeout released=2"), "{text}");
}

#[test]
#[serial]
fn failed_line_carries_error() {
    let text = line(Message::TaskFailed(TaskFailedPayload {
        task_id: TaskId::new("tsk-9"),
        error_message: "agent offline: disconnected".into(),
        exit_code: None,
    }));
    assert!(text.contains("task-failed"), "{text}");
    assert!(text.ends_with("tsk-9 agent offline: disconnected"), "{text}");
}

fn status(agent: &str, revision: u64) -> Message {
    Message::StatusUpdate(bh_wire::StatusPayload {
        agent_id: AgentId::new(agent),
        status: bh_core::AgentStatus::Online,
        cpu_usage_pct: None,
        mem_usage_pct: None,
        current_task_id: None,
        active_task_ids: vec![],
        reconnected: false,
        revision,
    })
}

#[test]
fn stale_agent_messages_are_dropped() {
    let mut revisions = Revisions::default();
    assert!(revisions.admit(&status("a", 3)));
    assert!(!revisions.admit(&status("a", 2)));
    assert!(!revisions.admit(&status("a", 3)));
    assert!(revisions.admit(&status("b", 1)));
    assert!(revisions.admit(&status("a", 4)));

    let offline = Message::Offline(OfflinePayload {
        agent_id: AgentId::new("a"),
        reason: "disconnected".into(),
        released_task_ids: vec![],
        revision: 3,
    });
    assert!(!revisions.admit(&offline));
}

#[test]
fn snapshot_seeds_revisions_and_unrevised_messages_pass() {
    let mut agent = bh_core::test_support::AgentRecordBuilder::new("a").build();
    agent.revision = 5;
    let id = agent.id.clone();
    let mut revisions = Revisions::default();
    assert!(revisions.admit(&Message::Snapshot(bh_wire::SnapshotPayload { agents: vec![agent], tasks: vec![] })));
    assert!(!revisions.admit(&status(id.as_str(), 5)));
    assert!(revisions.admit(&status(id.as_str(), 6)));
    assert!(revisions.admit(&status(id.as_str(), 0)));
}
