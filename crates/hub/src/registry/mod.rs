// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry: the authoritative table of agent records.
//!
//! All mutation goes through [`AgentRegistry`] under one lock. Observers are
//! notified after the lock is released, and the table is published to the
//! snapshot writer on every change.
//!
//! Notifications from concurrent mutations may reach observers out of order.
//! Every mutation bumps the record's `revision` under the lock, so the
//! newest event for an agent is the one with the highest revision.

use std::collections::HashMap;
use std::time::Duration;

use bh_core::{AgentId, AgentRecord, AgentStatus, Clock, Constraints, LoadReport, Registration, TaskId};
use bh_storage::CheckpointHandle;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::observer::{ObserverError, Observers, Subscription};

/// Persisted form of the registry
pub type AgentTable = HashMap<AgentId, AgentRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("agent {agent_id} is at capacity ({max_concurrency})")]
    CapacityExceeded { agent_id: AgentId, max_concurrency: u32 },

    #[error("agent {0} is offline")]
    AgentOffline(AgentId),
}

/// Why an agent went offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineReason {
    HeartbeatTimeout,
    Disconnected,
    /// The agent reported `offline` itself
    ShuttingDown,
}

impl OfflineReason {
    pub fn task_error(self) -> &'static str {
        match self {
            OfflineReason::HeartbeatTimeout => "agent offline: heartbeat timeout",
            OfflineReason::Disconnected => "agent offline: disconnected",
            OfflineReason::ShuttingDown => "agent offline: shutting down",
        }
    }
}

bh_core::simple_display! {
    OfflineReason {
        HeartbeatTimeout => "heartbeat timeout",
        Disconnected => "disconnected",
        ShuttingDown => "shutting down",
    }
}

/// Change notification carrying the resulting record.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// First registration of this identity
    Registered(AgentRecord),
    /// Any other change to a live record
    Updated(AgentRecord),
    /// An offline record became reachable again, tasks kept
    Reconnected(AgentRecord),
    /// The record transitioned to offline; `released` tasks were dropped
    Offline { record: AgentRecord, reason: OfflineReason, released: Vec<TaskId> },
    /// The record was removed
    Deregistered(AgentRecord),
}

impl RegistryEvent {
    pub fn record(&self) -> &AgentRecord {
        match self {
            RegistryEvent::Registered(r)
            | RegistryEvent::Updated(r)
            | RegistryEvent::Reconnected(r)
            | RegistryEvent::Deregistered(r) => r,
            RegistryEvent::Offline { record, .. } => record,
        }
    }
}

/// Result of a heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatOutcome {
    pub record: AgentRecord,
    /// The agent was offline before this heartbeat
    pub reconnected: bool,
    /// Tasks released because the agent reported itself offline
    pub released: Vec<TaskId>,
}

/// Tasks dropped from one agent by the liveness sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub agent_id: AgentId,
    pub released: Vec<TaskId>,
}

pub struct AgentRegistry<C: Clock> {
    clock: C,
    default_max_concurrency: u32,
    agents: Mutex<AgentTable>,
    observers: Observers<RegistryEvent>,
    checkpoint: Option<CheckpointHandle<AgentTable>>,
}

impl<C: Clock> AgentRegistry<C> {
    pub fn new(clock: C, default_max_concurrency: u32) -> Self {
        Self {
            clock,
            default_max_concurrency: default_max_concurrency.max(1),
            agents: Mutex::new(HashMap::new()),
            observers: Observers::new(),
            checkpoint: None,
        }
    }

    /// Restore records from a snapshot.
    ///
    /// Every record comes back `offline` with its heartbeat clock restarted,
    /// so an agent that heartbeats within the timeout keeps its tasks.
    pub fn with_records(mut self, records: AgentTable) -> Self {
        let now = self.clock.epoch_ms();
        let table = self.agents.get_mut();
        for (id, mut record) in records {
            record.status = AgentStatus::Offline;
            record.last_heartbeat_at_ms = now;
            table.insert(id, record);
        }
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointHandle<AgentTable>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RegistryEvent) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.observers.subscribe(handler)
    }

    /// Register or re-register an agent. Idempotent under retries.
    pub fn register(&self, reg: &Registration) -> AgentRecord {
        let id = reg.agent_id();
        let now = self.clock.epoch_ms();
        let event = {
            let mut agents = self.agents.lock();
            let event = match agents.get_mut(&id) {
                Some(record) => {
                    let was_offline = !record.is_reachable();
                    record.merge_registration(reg);
                    record.last_heartbeat_at_ms = record.last_heartbeat_at_ms.max(now);
                    record.status = AgentStatus::Online;
                    record.refresh_status();
                    record.bump_revision();
                    if was_offline {
                        info!(agent_id = %id, name = %record.name, tasks = record.active_task_ids.len(), "agent reconnected");
                        RegistryEvent::Reconnected(record.clone())
                    } else {
                        info!(agent_id = %id, name = %record.name, "agent re-registered");
                        RegistryEvent::Updated(record.clone())
                    }
                }
                None => {
                    let record = AgentRecord::from_registration(reg, now, self.default_max_concurrency);
                    info!(agent_id = %id, name = %record.name, host = %record.host, "agent registered");
                    agents.insert(id, record.clone());
                    RegistryEvent::Registered(record)
                }
            };
            self.persist(&agents);
            event
        };
        self.observers.notify(&event);
        event.record().clone()
    }

    /// Record a heartbeat and load sample.
    ///
    /// A reported status of `offline` means the agent is shutting down: it is
    /// marked offline and its tasks are released. Any other reported status
    /// is ignored in favour of the one derived from the task set.
    pub fn heartbeat(&self, id: &AgentId, report: &LoadReport) -> Result<HeartbeatOutcome, RegistryError> {
        let now = self.clock.epoch_ms();
        let (outcome, event) = {
            let mut agents = self.agents.lock();
            let record = agents.get_mut(id).ok_or_else(|| RegistryError::AgentNotFound(id.clone()))?;
            let was_offline = !record.is_reachable();
            record.last_heartbeat_at_ms = record.last_heartbeat_at_ms.max(now);
            record.cpu_usage_pct = report.cpu_usage_pct;
            record.mem_usage_pct = report.mem_usage_pct;
            record.bump_revision();

            let (reconnected, released, event) = if report.status == AgentStatus::Offline {
                let released = record.release_all_tasks();
                record.status = AgentStatus::Offline;
                info!(agent_id = %id, released = released.len(), "agent reported offline");
                let event = if was_offline {
                    RegistryEvent::Updated(record.clone())
                } else {
                    RegistryEvent::Offline {
                        record: record.clone(),
                        reason: OfflineReason::ShuttingDown,
                        released: released.clone(),
                    }
                };
                (false, released, event)
            } else {
                record.status = record.occupancy_status();
                let event = if was_offline {
                    info!(agent_id = %id, name = %record.name, "agent reconnected");
                    RegistryEvent::Reconnected(record.clone())
                } else {
                    debug!(agent_id = %id, status = %record.status, "heartbeat");
                    RegistryEvent::Updated(record.clone())
                };
                (was_offline, Vec::new(), event)
            };

            let outcome = HeartbeatOutcome { record: record.clone(), reconnected, released };
            self.persist(&agents);
            (outcome, event)
        };
        self.observers.notify(&event);
        Ok(outcome)
    }

    /// Remove a record. Returns it so the caller can settle its tasks.
    pub fn deregister(&self, id: &AgentId) -> Result<AgentRecord, RegistryError> {
        let record = {
            let mut agents = self.agents.lock();
            let mut record = agents.remove(id).ok_or_else(|| RegistryError::AgentNotFound(id.clone()))?;
            record.bump_revision();
            self.persist(&agents);
            record
        };
        info!(agent_id = %id, name = %record.name, "agent deregistered");
        self.observers.notify(&RegistryEvent::Deregistered(record.clone()));
        Ok(record)
    }

    /// Bind `task_id` to the agent, respecting its capacity.
    pub fn add_task(&self, id: &AgentId, task_id: TaskId) -> Result<AgentRecord, RegistryError> {
        let record = {
            let mut agents = self.agents.lock();
            let record = agents.get_mut(id).ok_or_else(|| RegistryError::AgentNotFound(id.clone()))?;
            if !record.is_reachable() {
                return Err(RegistryError::AgentOffline(id.clone()));
            }
            if !record.has_capacity() {
                return Err(RegistryError::CapacityExceeded {
                    agent_id: id.clone(),
                    max_concurrency: record.max_concurrency,
                });
            }
            if !record.holds_task(&task_id) {
                record.active_task_ids.push(task_id);
            }
            record.refresh_status();
            record.bump_revision();
            let record = record.clone();
            self.persist(&agents);
            record
        };
        self.observers.notify(&RegistryEvent::Updated(record.clone()));
        Ok(record)
    }

    /// Release `task_id` from the agent. Absent agent or task is a no-op.
    pub fn remove_task(&self, id: &AgentId, task_id: &TaskId) {
        let record = {
            let mut agents = self.agents.lock();
            let Some(record) = agents.get_mut(id) else {
                return;
            };
            if !record.release_task(task_id) {
                return;
            }
            record.refresh_status();
            record.bump_revision();
            let record = record.clone();
            self.persist(&agents);
            record
        };
        self.observers.notify(&RegistryEvent::Updated(record));
    }

    /// Mark an agent offline now and release its tasks.
    ///
    /// Already-offline agents with no tasks are left untouched and produce no
    /// notification.
    pub fn mark_offline(&self, id: &AgentId, reason: OfflineReason) -> Result<Vec<TaskId>, RegistryError> {
        let (released, event) = {
            let mut agents = self.agents.lock();
            let record = agents.get_mut(id).ok_or_else(|| RegistryError::AgentNotFound(id.clone()))?;
            let was_reachable = record.is_reachable();
            if !was_reachable && record.active_task_ids.is_empty() {
                return Ok(Vec::new());
            }
            let released = record.release_all_tasks();
            record.status = AgentStatus::Offline;
            record.bump_revision();
            info!(agent_id = %id, %reason, released = released.len(), "agent offline");
            let event = if was_reachable {
                RegistryEvent::Offline { record: record.clone(), reason, released: released.clone() }
            } else {
                RegistryEvent::Updated(record.clone())
            };
            self.persist(&agents);
            (released, event)
        };
        self.observers.notify(&event);
        Ok(released)
    }

    /// Expire agents whose last heartbeat is older than `timeout`.
    ///
    /// Reachable agents go offline with an `Offline` notification. Agents
    /// already offline (restored from a snapshot) that still hold tasks only
    /// have their tasks released. Running twice in a row is idempotent.
    pub fn sweep_expired(&self, now_ms: u64, timeout: Duration) -> Vec<Expired> {
        let timeout_ms = timeout.as_millis() as u64;
        let mut expired = Vec::new();
        let mut events = Vec::new();
        {
            let mut agents = self.agents.lock();
            for record in agents.values_mut() {
                if now_ms.saturating_sub(record.last_heartbeat_at_ms) <= timeout_ms {
                    continue;
                }
                let was_reachable = record.is_reachable();
                if !was_reachable && record.active_task_ids.is_empty() {
                    continue;
                }
                let released = record.release_all_tasks();
                record.status = AgentStatus::Offline;
                record.bump_revision();
                if was_reachable {
                    warn!(
                        agent_id = %record.id,
                        name = %record.name,
                        silent_ms = now_ms.saturating_sub(record.last_heartbeat_at_ms),
                        released = released.len(),
                        "heartbeat expired"
                    );
                    events.push(RegistryEvent::Offline {
                        record: record.clone(),
                        reason: OfflineReason::HeartbeatTimeout,
                        released: released.clone(),
                    });
                } else {
                    info!(agent_id = %record.id, released = released.len(), "released tasks of restored agent");
                    events.push(RegistryEvent::Updated(record.clone()));
                }
                expired.push(Expired { agent_id: record.id.clone(), released });
            }
            if !events.is_empty() {
                self.persist(&agents);
            }
        }
        for event in &events {
            self.observers.notify(event);
        }
        expired
    }

    pub fn get(&self, id: &AgentId) -> Option<AgentRecord> {
        self.agents.lock().get(id).cloned()
    }

    /// All records, ordered by name then id.
    pub fn list(&self) -> Vec<AgentRecord> {
        let mut records: Vec<AgentRecord> = self.agents.lock().values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Reachable agents with spare capacity that satisfy `constraints`.
    ///
    /// A `busy` agent below its concurrency ceiling is still available.
    pub fn list_available(&self, constraints: Option<&Constraints>) -> Vec<AgentRecord> {
        let mut records: Vec<AgentRecord> = self
            .agents
            .lock()
            .values()
            .filter(|r| r.is_reachable() && r.has_capacity())
            .filter(|r| constraints.map_or(true, |c| c.matches(r)))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn len(&self) -> usize {
        self.agents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the table for a synchronous flush.
    pub fn table(&self) -> AgentTable {
        self.agents.lock().clone()
    }

    fn persist(&self, agents: &AgentTable) {
        if let Some(checkpoint) = &self.checkpoint {
            checkpoint.publish(agents.clone());
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
