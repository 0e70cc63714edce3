// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity and the registry's per-agent record.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier of an agent, derived from its name and host.
///
/// Formatted as a hyphenated UUID so consumers that expect UUID-shaped ids
/// keep working.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    /// Derive the id for `(name, host)`.
    ///
    /// Pure and deterministic: a restarted or reconnecting agent maps back to
    /// the same record. The unit separator keeps `("ab", "c")` and
    /// `("a", "bc")` apart.
    pub fn resolve(name: &str, host: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0x1f]);
        hasher.update(host.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(uuid::Uuid::from_bytes(bytes).hyphenated().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for AgentId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AgentId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Liveness/occupancy of an agent as seen by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Reachable with no tasks
    Online,
    /// Reachable and holding at least one task
    Busy,
    /// No heartbeat within the timeout window, or disconnected
    Offline,
}

crate::simple_display! {
    AgentStatus {
        Online => "online",
        Busy => "busy",
        Offline => "offline",
    }
}

/// Registration request sent by an agent when it starts or reconnects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub cpu_count: u32,
    #[serde(default)]
    pub memory_gb: f64,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
}

impl Registration {
    pub fn agent_id(&self) -> AgentId {
        AgentId::resolve(&self.name, &self.host)
    }
}

/// Load sample and self-reported state carried by a heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_usage_pct: Option<f64>,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<TaskId>,
}

impl LoadReport {
    pub fn online() -> Self {
        Self { cpu_usage_pct: None, mem_usage_pct: None, status: AgentStatus::Online, current_task_id: None }
    }
}

/// The registry's record of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub platform: String,
    pub arch: String,
    pub cpu_count: u32,
    pub memory_gb: f64,
    pub capabilities: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub status: AgentStatus,
    /// Epoch milliseconds of the last heartbeat or registration
    pub last_heartbeat_at_ms: u64,
    /// Epoch milliseconds of the first registration
    pub registered_at_ms: u64,
    /// Tasks currently bound to this agent, in assignment order, no duplicates
    #[serde(default)]
    pub active_task_ids: Vec<TaskId>,
    pub max_concurrency: u32,
    /// Lower ceiling requested while more tasks were held than it allows;
    /// applied as tasks are released
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_max_concurrency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_usage_pct: Option<f64>,
    /// Bumped on every registry mutation. Observers drop agent messages
    /// older than the last revision they applied.
    #[serde(default)]
    pub revision: u64,
}

impl AgentRecord {
    /// Build a fresh record from a first registration.
    pub fn from_registration(reg: &Registration, now_ms: u64, default_max_concurrency: u32) -> Self {
        Self {
            id: reg.agent_id(),
            name: reg.name.clone(),
            host: reg.host.clone(),
            port: reg.port,
            platform: reg.platform.clone(),
            arch: reg.arch.clone(),
            cpu_count: reg.cpu_count,
            memory_gb: reg.memory_gb,
            capabilities: reg.capabilities.clone(),
            tags: reg.tags.clone(),
            status: AgentStatus::Online,
            last_heartbeat_at_ms: now_ms,
            registered_at_ms: now_ms,
            active_task_ids: Vec::new(),
            max_concurrency: reg.max_concurrency.unwrap_or(default_max_concurrency).max(1),
            pending_max_concurrency: None,
            cpu_usage_pct: None,
            mem_usage_pct: None,
            revision: 1,
        }
    }

    /// Refresh static metadata from a re-registration. Active tasks are kept.
    pub fn merge_registration(&mut self, reg: &Registration) {
        self.port = reg.port;
        self.platform = reg.platform.clone();
        self.arch = reg.arch.clone();
        self.cpu_count = reg.cpu_count;
        self.memory_gb = reg.memory_gb;
        self.capabilities = reg.capabilities.clone();
        self.tags = reg.tags.clone();
        if let Some(max) = reg.max_concurrency {
            self.request_max_concurrency(max);
        }
    }

    /// Change the concurrency ceiling without dropping below the tasks held.
    ///
    /// A ceiling lower than the current task count is parked and reached as
    /// tasks are released; no new task is admitted in the meantime.
    pub fn request_max_concurrency(&mut self, max: u32) {
        self.pending_max_concurrency = Some(max.max(1));
        self.apply_pending_ceiling();
    }

    /// Drop one task. Returns whether it was held.
    pub fn release_task(&mut self, task_id: &TaskId) -> bool {
        let before = self.active_task_ids.len();
        self.active_task_ids.retain(|t| t != task_id);
        let released = self.active_task_ids.len() != before;
        if released {
            self.apply_pending_ceiling();
        }
        released
    }

    /// Drop every task, in assignment order.
    pub fn release_all_tasks(&mut self) -> Vec<TaskId> {
        let released = std::mem::take(&mut self.active_task_ids);
        self.apply_pending_ceiling();
        released
    }

    pub fn bump_revision(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn apply_pending_ceiling(&mut self) {
        let Some(target) = self.pending_max_concurrency else {
            return;
        };
        let held = self.active_task_ids.len() as u32;
        self.max_concurrency = target.max(held);
        if held <= target {
            self.pending_max_concurrency = None;
        }
    }

    pub fn has_capacity(&self) -> bool {
        (self.active_task_ids.len() as u32) < self.max_concurrency
    }

    pub fn is_reachable(&self) -> bool {
        self.status != AgentStatus::Offline
    }

    /// Status implied by the task set for a reachable agent.
    pub fn occupancy_status(&self) -> AgentStatus {
        if self.active_task_ids.is_empty() {
            AgentStatus::Online
        } else {
            AgentStatus::Busy
        }
    }

    /// Re-derive `status` from the task set unless the agent is offline.
    pub fn refresh_status(&mut self) {
        if self.is_reachable() {
            self.status = self.occupancy_status();
        }
    }

    /// Singular view for consumers that only show one task per agent.
    pub fn current_task(&self) -> Option<&TaskId> {
        self.active_task_ids.first()
    }

    pub fn holds_task(&self, task_id: &TaskId) -> bool {
        self.active_task_ids.contains(task_id)
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
