// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch records and the task state machine.
//!
//! ```text
//! pending ──► dispatched ──► running ──► completed
//!    │            │             │
//!    │            ├──► failed ◄─┘
//!    └────────────┴──────┴──► cancelled
//! ```
//!
//! Terminal states (`completed`, `failed`, `cancelled`) are final.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier of a dispatched task.
    pub struct TaskId("tsk-");
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Dispatched,
    Running,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Dispatched => "dispatched",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Dispatched,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// Staying in the same non-terminal state is allowed so progress can be
    /// patched without a transition.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (from, to) if from == to => true,
            (_, Cancelled) => true,
            (Pending, Dispatched) => true,
            (Dispatched, Running) | (Dispatched, Failed) => true,
            (Running, Completed) | (Running, Failed) => true,
            _ => false,
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Optional fields accompanying a status update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl TaskPatch {
    pub fn progress(pct: u8) -> Self {
        Self { progress_pct: Some(pct), ..Self::default() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { error_message: Some(message.into()), ..Self::default() }
    }
}

/// One job bound to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    /// Opaque reference into the external job store
    pub job_ref: String,
    /// Display name of the job, if the submitter supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    /// Owning agent; never changes after creation
    pub agent_id: AgentId,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress_pct: u8,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl TaskRecord {
    /// A new record in `pending`.
    pub fn new(id: TaskId, job_ref: String, job_name: Option<String>, agent_id: AgentId, now_ms: u64) -> Self {
        Self {
            id,
            job_ref,
            job_name,
            agent_id,
            status: TaskStatus::Pending,
            progress_pct: 0,
            created_at_ms: now_ms,
            dispatched_at_ms: None,
            started_at_ms: None,
            completed_at_ms: None,
            result_ref: None,
            error_message: None,
            exit_code: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status change and patch.
    ///
    /// Each timestamp is written once, on first entry into its state. Outcome
    /// fields are only taken when they fit the new status: `result_ref` on
    /// completion, `error_message` on failure or cancellation.
    pub fn apply(&mut self, next: TaskStatus, patch: &TaskPatch, now_ms: u64) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError { from: self.status, to: next });
        }

        self.status = next;
        match next {
            TaskStatus::Pending => {}
            TaskStatus::Dispatched => {
                self.dispatched_at_ms.get_or_insert(now_ms);
            }
            TaskStatus::Running => {
                self.started_at_ms.get_or_insert(now_ms);
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.completed_at_ms.get_or_insert(now_ms);
            }
        }

        if let Some(pct) = patch.progress_pct {
            self.progress_pct = self.progress_pct.max(pct.min(100));
        }
        match next {
            TaskStatus::Completed => {
                self.progress_pct = 100;
                self.result_ref = patch.result_ref.clone();
                self.exit_code = Some(patch.exit_code.unwrap_or(0));
            }
            TaskStatus::Failed => {
                self.error_message =
                    Some(patch.error_message.clone().unwrap_or_else(|| "failed".to_string()));
                self.exit_code = patch.exit_code;
            }
            TaskStatus::Cancelled => {
                self.error_message = patch.error_message.clone();
            }
            _ => {}
        }
        Ok(())
    }
}

/// Count of tasks per status, computed on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub dispatched: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl TaskStats {
    pub fn record(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Dispatched => self.dispatched += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Dispatched => self.dispatched,
            TaskStatus::Running => self.running,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
            TaskStatus::Cancelled => self.cancelled,
        }
    }
}

impl<'a> FromIterator<&'a TaskRecord> for TaskStats {
    fn from_iter<I: IntoIterator<Item = &'a TaskRecord>>(iter: I) -> Self {
        let mut stats = TaskStats::default();
        for task in iter {
            stats.record(task.status);
        }
        stats
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
