// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::registration;
use proptest::prelude::*;

#[test]
fn resolve_is_uuid_shaped() {
    let id = AgentId::resolve("bench-01", "10.0.0.5");
    let parts: Vec<_> = id.as_str().split('-').map(str::len).collect();
    assert_eq!(parts, vec![8, 4, 4, 4, 12]);
    assert!(uuid::Uuid::parse_str(id.as_str()).is_ok());
}

#[test]
fn resolve_separates_name_and_host() {
    assert_ne!(AgentId::resolve("ab", "c"), AgentId::resolve("a", "bc"));
}

proptest! {
    #[test]
    fn resolve_is_deterministic(name in "[a-z0-9-]{1,16}", host in "[a-z0-9.]{1,16}") {
        prop_assert_eq!(AgentId::resolve(&name, &host), AgentId::resolve(&name, &host));
    }

    #[test]
    fn resolve_distinguishes_hosts(name in "[a-z]{1,8}", a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        prop_assume!(a != b);
        prop_assert_ne!(AgentId::resolve(&name, &a), AgentId::resolve(&name, &b));
    }
}

#[test]
fn from_registration_starts_online_and_empty() {
    let reg = registration("a", "h");
    let record = AgentRecord::from_registration(&reg, 500, 1);
    assert_eq!(record.id, reg.agent_id());
    assert_eq!(record.status, AgentStatus::Online);
    assert_eq!(record.last_heartbeat_at_ms, 500);
    assert_eq!(record.registered_at_ms, 500);
    assert!(record.active_task_ids.is_empty());
    assert_eq!(record.max_concurrency, 1);
}

#[yare::parameterized(
    default_used   = { None,    3, 3 },
    explicit       = { Some(2), 3, 2 },
    zero_clamped   = { Some(0), 3, 1 },
)]
fn max_concurrency_resolution(requested: Option<u32>, default: u32, expected: u32) {
    let mut reg = registration("a", "h");
    reg.max_concurrency = requested;
    assert_eq!(AgentRecord::from_registration(&reg, 0, default).max_concurrency, expected);
}

#[test]
fn merge_registration_keeps_tasks_and_identity() {
    let reg = registration("a", "h");
    let mut record = AgentRecord::from_registration(&reg, 0, 2);
    record.active_task_ids.push(TaskId::new("tsk-1"));

    let mut again = registration("a", "h");
    again.platform = "darwin".to_string();
    again.tags.insert("gpu".to_string());
    record.merge_registration(&again);

    assert_eq!(record.platform, "darwin");
    assert!(record.tags.contains("gpu"));
    assert_eq!(record.active_task_ids, vec![TaskId::new("tsk-1")]);
    assert_eq!(record.registered_at_ms, 0);
}

#[test]
fn refresh_status_follows_tasks_unless_offline() {
    let mut record = AgentRecord::from_registration(&registration("a", "h"), 0, 2);
    record.active_task_ids.push(TaskId::new("tsk-1"));
    record.refresh_status();
    assert_eq!(record.status, AgentStatus::Busy);
    assert_eq!(record.current_task(), Some(&TaskId::new("tsk-1")));

    record.status = AgentStatus::Offline;
    record.refresh_status();
    assert_eq!(record.status, AgentStatus::Offline);
}

#[test]
fn status_serializes_snake_case_and_parses_back() {
    assert_eq!(serde_json::to_string(&AgentStatus::Busy).unwrap(), "\"busy\"");
    assert_eq!("offline".parse::<AgentStatus>().unwrap(), AgentStatus::Offline);
    assert!("gone".parse::<AgentStatus>().is_err());
}

#[test]
fn registration_defaults_optional_fields() {
    let reg: Registration = serde_json::from_str(r#"{"name":"a","host":"h"}"#).unwrap();
    assert_eq!(reg.port, 0);
    assert!(reg.capabilities.is_empty());
    assert_eq!(reg.max_concurrency, None);
}

#[yare::parameterized(
    raise            = { 2, &["t1"],             4, 4, None },
    lower_with_room  = { 3, &["t1"],             1, 1, None },
    lower_below_held = { 3, &["t1", "t2", "t3"], 1, 3, Some(1) },
    zero_clamped     = { 2, &[],                 0, 1, None },
)]
fn requested_max_concurrency_never_drops_below_held(
    start: u32,
    held: &[&str],
    requested: u32,
    max: u32,
    pending: Option<u32>,
) {
    let mut record = AgentRecord::from_registration(&registration("a", "h"), 0, start);
    record.active_task_ids = held.iter().map(|id| TaskId::new(*id)).collect();
    record.request_max_concurrency(requested);
    assert_eq!(record.max_concurrency, max);
    assert_eq!(record.pending_max_concurrency, pending);
}

#[test]
fn pending_ceiling_steps_down_as_tasks_release() {
    let mut record = AgentRecord::from_registration(&registration("a", "h"), 0, 3);
    record.active_task_ids = vec![TaskId::new("t1"), TaskId::new("t2"), TaskId::new("t3")];
    record.request_max_concurrency(1);

    assert!(record.release_task(&TaskId::new("t2")));
    assert_eq!(record.max_concurrency, 2);
    assert_eq!(record.pending_max_concurrency, Some(1));
    assert!(!record.has_capacity());

    assert!(!record.release_task(&TaskId::new("t2")));
    assert_eq!(record.release_all_tasks(), vec![TaskId::new("t1"), TaskId::new("t3")]);
    assert_eq!(record.max_concurrency, 1);
    assert_eq!(record.pending_max_concurrency, None);
}

#[test]
fn record_without_revision_or_pending_ceiling_still_parses() {
    let mut value = serde_json::to_value(AgentRecord::from_registration(&registration("a", "h"), 0, 1)).unwrap();
    let object = value.as_object_mut().unwrap();
    object.remove("revision");
    assert!(!object.contains_key("pending_max_concurrency"));
    let record: AgentRecord = serde_json::from_value(value).unwrap();
    assert_eq!(record.revision, 0);
    assert_eq!(record.pending_max_concurrency, None);
}
