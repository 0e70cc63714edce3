// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bh_core::test_support::AgentRecordBuilder;
use bh_core::{AgentStatus, TaskId};
use bh_wire::MessageType;

use super::*;
use crate::registry::OfflineReason;

#[test]
fn registration_announces_the_full_record() {
    let record = AgentRecordBuilder::new("bench-1").build();
    let Message::AgentRegistered(payload) = registry_message(&RegistryEvent::Registered(record.clone())) else {
        panic!("expected agent-registered");
    };
    assert_eq!(payload.agent, record);
}

#[test]
fn updates_become_status_updates() {
    let record = AgentRecordBuilder::new("bench-1").status(AgentStatus::Busy).tasks(&["tsk-1"]).build();
    let Message::StatusUpdate(status) = registry_message(&RegistryEvent::Updated(record.clone())) else {
        panic!("expected status-update");
    };
    assert_eq!(status.agent_id, record.id);
    assert_eq!(status.status, AgentStatus::Busy);
    assert_eq!(status.active_task_ids, vec![TaskId::new("tsk-1")]);
}

#[test]
fn offline_carries_reason_and_released_tasks() {
    let record = AgentRecordBuilder::new("bench-1").status(AgentStatus::Offline).build();
    let event = RegistryEvent::Offline {
        record,
        reason: OfflineReason::HeartbeatTimeout,
        released: vec![TaskId::new("tsk-1")],
    };
    let Message::Offline(offline) = registry_message(&event) else { panic!("expected offline") };
    assert_eq!(offline.reason, "heartbeat timeout");
    assert_eq!(offline.released_task_ids, vec![TaskId::new("tsk-1")]);
}

#[test]
fn deregistration_is_published_as_offline() {
    let record = AgentRecordBuilder::new("bench-1").tasks(&["tsk-9"]).build();
    let message = registry_message(&RegistryEvent::Deregistered(record));
    assert_eq!(message.kind(), MessageType::Offline);
    let Message::Offline(offline) = message else { panic!("expected offline") };
    assert_eq!(offline.reason, "deregistered");
    assert_eq!(offline.released_task_ids, vec![TaskId::new("tsk-9")]);
}

#[test]
fn reconnection_is_flagged_on_the_status_update() {
    let record = AgentRecordBuilder::new("bench-1").tasks(&["tsk-1"]).build();
    let Message::StatusUpdate(status) = registry_message(&RegistryEvent::Reconnected(record.clone())) else {
        panic!("expected status-update");
    };
    assert!(status.reconnected);
    assert_eq!(status.active_task_ids, vec![TaskId::new("tsk-1")]);

    let Message::StatusUpdate(plain) = registry_message(&RegistryEvent::Updated(record)) else {
        panic!("expected status-update");
    };
    assert!(!plain.reconnected);
}

#[test]
fn agent_messages_carry_the_record_revision() {
    let mut record = AgentRecordBuilder::new("bench-1").build();
    record.revision = 7;
    let updated = registry_message(&RegistryEvent::Updated(record.clone()));
    assert_eq!(updated.agent_revision(), Some((&record.id, 7)));

    let offline = registry_message(&RegistryEvent::Offline {
        record: record.clone(),
        reason: OfflineReason::Disconnected,
        released: vec![],
    });
    assert_eq!(offline.agent_revision(), Some((&record.id, 7)));
}
