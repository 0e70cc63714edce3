// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and strategies for tests in this and downstream crates.

use crate::agent::{AgentId, AgentRecord, AgentStatus, Registration};
use crate::task::{TaskId, TaskRecord, TaskStatus};
use std::collections::BTreeSet;

/// A minimal registration for `(name, host)` on linux/x86_64.
pub fn registration(name: &str, host: &str) -> Registration {
    Registration {
        name: name.to_string(),
        host: host.to_string(),
        port: 9000,
        platform: "linux".to_string(),
        arch: "x86_64".to_string(),
        cpu_count: 8,
        memory_gb: 16.0,
        capabilities: BTreeSet::new(),
        tags: BTreeSet::new(),
        max_concurrency: None,
    }
}

/// Builder for [`AgentRecord`] with test defaults.
pub struct AgentRecordBuilder {
    record: AgentRecord,
}

impl AgentRecordBuilder {
    pub fn new(name: &str) -> Self {
        let record = AgentRecord::from_registration(&registration(name, "test-host"), 0, 1);
        Self { record }
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.record.platform = platform.to_string();
        self
    }

    pub fn capabilities(mut self, caps: &[&str]) -> Self {
        self.record.capabilities = caps.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.record.tags = tags.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn status(mut self, status: AgentStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn cpu(mut self, pct: Option<f64>) -> Self {
        self.record.cpu_usage_pct = pct;
        self
    }

    pub fn max_concurrency(mut self, max: u32) -> Self {
        self.record.max_concurrency = max;
        self
    }

    pub fn tasks(mut self, ids: &[&str]) -> Self {
        self.record.active_task_ids = ids.iter().map(|id| TaskId::new(*id)).collect();
        self.record.refresh_status();
        self
    }

    pub fn heartbeat_at(mut self, ms: u64) -> Self {
        self.record.last_heartbeat_at_ms = ms;
        self
    }

    pub fn build(self) -> AgentRecord {
        self.record
    }
}

/// A task record for `agent` in `status`.
pub fn task(id: &str, agent: &AgentId, status: TaskStatus, created_at_ms: u64) -> TaskRecord {
    let mut record =
        TaskRecord::new(TaskId::new(id), format!("job/{id}"), None, agent.clone(), created_at_ms);
    record.status = status;
    record
}

/// Proptest strategy over every task status.
pub fn any_task_status() -> impl proptest::strategy::Strategy<Value = TaskStatus> {
    proptest::sample::select(TaskStatus::ALL.to_vec())
}
