// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task ledger: the authoritative table of dispatch records.
//!
//! The ledger never holds its own lock while calling into the registry or the
//! command sink, so lock order stays flat.

use std::collections::HashMap;
use std::sync::Arc;

use bh_core::{AgentId, Clock, Constraints, TaskId, TaskPatch, TaskRecord, TaskStats, TaskStatus};
use bh_storage::CheckpointHandle;
use bh_wire::{
    Message, TaskAssignedPayload, TaskCancelledPayload, TaskCompletedPayload, TaskFailedPayload,
    TaskFilter, TaskProgressPayload,
};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::{AgentRegistry, RegistryError};
use crate::scheduler;
use crate::sink::CommandSink;

/// Persisted form of the ledger
pub type TaskTable = HashMap<TaskId, TaskRecord>;

const UNREACHABLE: &str = "agent unreachable";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("task {task_id}: illegal transition {from} -> {to}")]
    IllegalTransition { task_id: TaskId, from: TaskStatus, to: TaskStatus },

    #[error("task {task_id} is already {status}")]
    AlreadyTerminal { task_id: TaskId, status: TaskStatus },

    #[error("task {task_id} is still {status}")]
    NotTerminal { task_id: TaskId, status: TaskStatus },

    #[error("task {task_id} is not owned by agent {agent_id}")]
    NotOwner { task_id: TaskId, agent_id: AgentId },

    #[error("message is not a task event")]
    NotATaskEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("no eligible agent")]
    NoEligibleAgent,

    #[error("agent {agent_id} cannot take the task: {reason}")]
    AgentUnavailable { agent_id: AgentId, reason: String },

    #[error("task {task_id} failed: agent {agent_id} unreachable")]
    Unreachable { task_id: TaskId, agent_id: AgentId },
}

/// A job submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchRequest {
    pub job_ref: String,
    pub job_name: Option<String>,
    /// Explicit agent, or `None` for scheduler choice
    pub agent_id: Option<AgentId>,
    pub constraints: Option<Constraints>,
}

impl DispatchRequest {
    pub fn auto(job_ref: impl Into<String>) -> Self {
        Self { job_ref: job_ref.into(), ..Self::default() }
    }

    pub fn to_agent(job_ref: impl Into<String>, agent_id: AgentId) -> Self {
        Self { job_ref: job_ref.into(), agent_id: Some(agent_id), ..Self::default() }
    }
}

/// A task bound and delivered to an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub agent_name: String,
}

pub struct TaskLedger<C: Clock> {
    clock: C,
    registry: Arc<AgentRegistry<C>>,
    sink: Arc<dyn CommandSink>,
    tasks: Mutex<TaskTable>,
    checkpoint: Option<CheckpointHandle<TaskTable>>,
}

impl<C: Clock> TaskLedger<C> {
    pub fn new(clock: C, registry: Arc<AgentRegistry<C>>, sink: Arc<dyn CommandSink>) -> Self {
        Self { clock, registry, sink, tasks: Mutex::new(HashMap::new()), checkpoint: None }
    }

    /// Restore records unchanged from a snapshot.
    pub fn with_records(mut self, records: TaskTable) -> Self {
        self.tasks.get_mut().extend(records);
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointHandle<TaskTable>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Select an agent, bind a new task to it and deliver `task-assigned`.
    ///
    /// Assignment is at most once: a task that cannot be delivered is failed
    /// on the spot and never re-dispatched.
    pub fn create_and_dispatch(&self, req: DispatchRequest) -> Result<Dispatched, DispatchError> {
        let agent = match &req.agent_id {
            Some(id) => {
                let agent = self.registry.get(id).ok_or_else(|| DispatchError::AgentNotFound(id.clone()))?;
                let reason = if !agent.is_reachable() {
                    Some("agent is offline".to_string())
                } else if !agent.has_capacity() {
                    Some(format!("agent is at capacity ({})", agent.max_concurrency))
                } else if req.constraints.as_ref().is_some_and(|c| !c.matches(&agent)) {
                    Some("agent does not satisfy constraints".to_string())
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(DispatchError::AgentUnavailable { agent_id: id.clone(), reason });
                }
                agent
            }
            None => {
                let candidates = self.registry.list_available(req.constraints.as_ref());
                scheduler::select_best(&candidates).cloned().ok_or(DispatchError::NoEligibleAgent)?
            }
        };

        // The record goes in before the agent takes the task, so an agent that
        // drops out right after `add_task` finds it and fails it.
        let task_id = TaskId::generate();
        let now = self.clock.epoch_ms();
        let mut record = TaskRecord::new(task_id.clone(), req.job_ref.clone(), req.job_name.clone(), agent.id.clone(), now);
        // pending -> dispatched is always legal for a fresh record
        let _ = record.apply(TaskStatus::Dispatched, &TaskPatch::default(), now);
        {
            let mut tasks = self.tasks.lock();
            tasks.insert(task_id.clone(), record);
            self.persist(&tasks);
        }

        if let Err(e) = self.registry.add_task(&agent.id, task_id.clone()) {
            let mut tasks = self.tasks.lock();
            tasks.remove(&task_id);
            self.persist(&tasks);
            return Err(match e {
                RegistryError::AgentNotFound(id) => DispatchError::AgentNotFound(id),
                other => DispatchError::AgentUnavailable { agent_id: agent.id.clone(), reason: other.to_string() },
            });
        }

        if self.get(&task_id).is_some_and(|t| t.is_terminal()) {
            warn!(task_id = %task_id, agent_id = %agent.id, "agent went away before delivery");
            return Err(DispatchError::Unreachable { task_id, agent_id: agent.id });
        }

        let assigned = Message::TaskAssigned(TaskAssignedPayload {
            task_id: task_id.clone(),
            agent_id: agent.id.clone(),
            job_ref: req.job_ref,
            job_name: req.job_name,
        });
        if let Err(e) = self.sink.send_to_agent(&agent.id, assigned.clone()) {
            warn!(task_id = %task_id, agent_id = %agent.id, error = %e, "dispatch undeliverable");
            self.fail_tasks(&[task_id.clone()], UNREACHABLE);
            return Err(DispatchError::Unreachable { task_id, agent_id: agent.id });
        }
        self.sink.broadcast(assigned);

        info!(task_id = %task_id, agent_id = %agent.id, agent = %agent.name, "task dispatched");
        Ok(Dispatched { task_id, agent_id: agent.id, agent_name: agent.name })
    }

    /// Move a task through the state machine.
    ///
    /// Re-stating the current non-terminal status applies the patch only.
    /// Entering a terminal state releases the agent's capacity.
    pub fn update_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        patch: &TaskPatch,
    ) -> Result<TaskRecord, LedgerError> {
        let record = self.mutate(task_id, None, |record, now| transition(record, status, patch, now))?;
        self.settle(&record);
        Ok(record)
    }

    /// Apply an agent-originated task event.
    ///
    /// The first progress report moves a `dispatched` task to `running`. A
    /// completion with a non-zero exit code is recorded as a failure. Log
    /// lines only check ownership.
    pub fn apply_agent_event(&self, agent_id: &AgentId, message: &Message) -> Result<TaskRecord, LedgerError> {
        let task_id = message.task_id().ok_or(LedgerError::NotATaskEvent)?;
        let record = self.mutate(task_id, Some(agent_id), |record, now| match message {
            Message::TaskProgress(p) => {
                let next = match record.status {
                    TaskStatus::Dispatched => TaskStatus::Running,
                    current => current,
                };
                transition(record, next, &TaskPatch::progress(p.progress_pct), now)
            }
            Message::TaskCompleted(p) if p.exit_code != 0 => {
                let patch = TaskPatch {
                    error_message: Some(format!("exit code {}", p.exit_code)),
                    exit_code: Some(p.exit_code),
                    ..TaskPatch::default()
                };
                transition(record, TaskStatus::Failed, &patch, now)
            }
            Message::TaskCompleted(p) => {
                if record.status == TaskStatus::Dispatched {
                    transition(record, TaskStatus::Running, &TaskPatch::default(), now)?;
                }
                let patch = TaskPatch {
                    result_ref: p.result_ref.clone(),
                    exit_code: Some(p.exit_code),
                    ..TaskPatch::default()
                };
                transition(record, TaskStatus::Completed, &patch, now)
            }
            Message::TaskFailed(p) => {
                let patch = TaskPatch {
                    error_message: Some(p.error_message.clone()),
                    exit_code: p.exit_code,
                    ..TaskPatch::default()
                };
                transition(record, TaskStatus::Failed, &patch, now)
            }
            Message::TaskLog(_) => Ok(()),
            _ => Err(LedgerError::NotATaskEvent),
        })?;
        self.settle(&record);
        Ok(record)
    }

    /// Cancel a non-terminal task and tell its agent. Returns whether the
    /// cancellation reached the agent.
    pub fn cancel(&self, task_id: &TaskId) -> Result<bool, LedgerError> {
        let record = self.mutate(task_id, None, |record, now| {
            if record.is_terminal() {
                return Err(LedgerError::AlreadyTerminal { task_id: record.id.clone(), status: record.status });
            }
            transition(record, TaskStatus::Cancelled, &TaskPatch::error("cancelled"), now)
        })?;
        self.registry.remove_task(&record.agent_id, &record.id);

        let cancelled = Message::TaskCancelled(TaskCancelledPayload {
            task_id: record.id.clone(),
            reason: Some("cancelled by request".to_string()),
        });
        let delivered = match self.sink.send_to_agent(&record.agent_id, cancelled.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!(task_id = %record.id, error = %e, "cancellation not delivered");
                false
            }
        };
        self.sink.broadcast(cancelled);
        info!(task_id = %record.id, agent_id = %record.agent_id, delivered, "task cancelled");
        Ok(delivered)
    }

    /// Remove a terminal record.
    pub fn delete(&self, task_id: &TaskId) -> Result<TaskRecord, LedgerError> {
        let mut tasks = self.tasks.lock();
        let record = tasks.get(task_id).ok_or_else(|| LedgerError::TaskNotFound(task_id.clone()))?;
        if !record.is_terminal() {
            return Err(LedgerError::NotTerminal { task_id: task_id.clone(), status: record.status });
        }
        let record = tasks.remove(task_id).ok_or_else(|| LedgerError::TaskNotFound(task_id.clone()))?;
        self.persist(&tasks);
        debug!(task_id = %task_id, "task deleted");
        Ok(record)
    }

    /// Fail every listed task that is still live, mirroring each failure to
    /// observers. Used when an agent goes away.
    pub fn fail_tasks(&self, task_ids: &[TaskId], reason: &str) -> Vec<TaskRecord> {
        let mut failed = Vec::new();
        for task_id in task_ids {
            let result = self.mutate(task_id, None, |record, now| {
                if record.is_terminal() {
                    return Err(LedgerError::AlreadyTerminal { task_id: record.id.clone(), status: record.status });
                }
                // A pending task never reached an agent, so it is cancelled instead
                let next = if record.status == TaskStatus::Pending { TaskStatus::Cancelled } else { TaskStatus::Failed };
                transition(record, next, &TaskPatch::error(reason), now)
            });
            match result {
                Ok(record) => {
                    self.registry.remove_task(&record.agent_id, &record.id);
                    info!(task_id = %record.id, agent_id = %record.agent_id, reason, "task failed");
                    self.sink.broadcast(status_message(&record));
                    failed.push(record);
                }
                Err(e @ LedgerError::TaskNotFound(_)) => warn!(task_id = %task_id, error = %e, "task not failed"),
                Err(e) => debug!(task_id = %task_id, error = %e, "task not failed"),
            }
        }
        failed
    }

    pub fn get(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.tasks.lock().get(task_id).cloned()
    }

    /// Records matching `filter`, newest first.
    pub fn list(&self, filter: &TaskFilter) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> =
            self.tasks.lock().values().filter(|t| filter.matches(t)).cloned().collect();
        records.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        records
    }

    /// Every non-terminal record, oldest first.
    pub fn list_active(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> =
            self.tasks.lock().values().filter(|t| !t.is_terminal()).cloned().collect();
        records.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Per-status counts, computed on demand.
    pub fn stats(&self) -> TaskStats {
        self.tasks.lock().values().collect()
    }

    /// Copy of the table for a synchronous flush.
    pub fn table(&self) -> TaskTable {
        self.tasks.lock().clone()
    }

    /// Run `f` on a copy of the record and commit it only on success.
    fn mutate<F>(&self, task_id: &TaskId, owner: Option<&AgentId>, f: F) -> Result<TaskRecord, LedgerError>
    where
        F: FnOnce(&mut TaskRecord, u64) -> Result<(), LedgerError>,
    {
        let now = self.clock.epoch_ms();
        let mut tasks = self.tasks.lock();
        let current = tasks.get(task_id).ok_or_else(|| LedgerError::TaskNotFound(task_id.clone()))?;
        if let Some(agent_id) = owner {
            if current.agent_id != *agent_id {
                return Err(LedgerError::NotOwner { task_id: task_id.clone(), agent_id: agent_id.clone() });
            }
        }
        let mut updated = current.clone();
        f(&mut updated, now)?;
        if updated != *current {
            tasks.insert(task_id.clone(), updated.clone());
            self.persist(&tasks);
        }
        Ok(updated)
    }

    /// Release capacity once a task has reached a terminal state.
    fn settle(&self, record: &TaskRecord) {
        if record.is_terminal() {
            self.registry.remove_task(&record.agent_id, &record.id);
        }
    }

    fn persist(&self, tasks: &TaskTable) {
        if let Some(checkpoint) = &self.checkpoint {
            checkpoint.publish(tasks.clone());
        }
    }
}

fn transition(record: &mut TaskRecord, next: TaskStatus, patch: &TaskPatch, now: u64) -> Result<(), LedgerError> {
    record.apply(next, patch, now).map_err(|e| {
        warn!(task_id = %record.id, from = %e.from, to = %e.to, "illegal transition rejected");
        LedgerError::IllegalTransition { task_id: record.id.clone(), from: e.from, to: e.to }
    })
}

/// Observer message describing a task's current state.
pub fn status_message(record: &TaskRecord) -> Message {
    let task_id = record.id.clone();
    match record.status {
        TaskStatus::Completed => Message::TaskCompleted(TaskCompletedPayload {
            task_id,
            exit_code: record.exit_code.unwrap_or(0),
            result_ref: record.result_ref.clone(),
        }),
        TaskStatus::Failed => Message::TaskFailed(TaskFailedPayload {
            task_id,
            error_message: record.error_message.clone().unwrap_or_default(),
            exit_code: record.exit_code,
        }),
        TaskStatus::Cancelled => {
            Message::TaskCancelled(TaskCancelledPayload { task_id, reason: record.error_message.clone() })
        }
        TaskStatus::Pending | TaskStatus::Dispatched | TaskStatus::Running => {
            Message::TaskProgress(TaskProgressPayload {
                task_id,
                progress_pct: record.progress_pct,
                stage: Some(record.status.to_string()),
            })
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
