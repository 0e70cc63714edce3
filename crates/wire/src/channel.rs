// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-channel messages.
//!
//! Every WebSocket text frame carries one [`Envelope`]:
//!
//! ```text
//! {"type":"task-progress","payload":{"task_id":"tsk-…","progress_pct":40},"timestamp":1767225600000}
//! ```

use bh_core::{AgentId, AgentRecord, AgentStatus, TaskId, TaskRecord};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// One framed control-channel message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: Message,
    /// Epoch milliseconds when the sender built the envelope
    pub timestamp: u64,
}

impl Envelope {
    pub fn new(message: Message, timestamp: u64) -> Self {
        Self { message, timestamp }
    }

    pub fn kind(&self) -> MessageType {
        self.message.kind()
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Message body, tagged by `type` with the body under `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Message {
    AgentRegistered(AgentRegisteredPayload),
    StatusUpdate(StatusPayload),
    Offline(OfflinePayload),
    TaskAssigned(TaskAssignedPayload),
    TaskProgress(TaskProgressPayload),
    TaskLog(TaskLogPayload),
    TaskCompleted(TaskCompletedPayload),
    TaskFailed(TaskFailedPayload),
    TaskCancelled(TaskCancelledPayload),
    HeartbeatAck(HeartbeatAckPayload),
    /// Full state, sent once to each observer before any other message
    Snapshot(SnapshotPayload),
}

/// Discriminant of [`Message`], for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    AgentRegistered,
    StatusUpdate,
    Offline,
    TaskAssigned,
    TaskProgress,
    TaskLog,
    TaskCompleted,
    TaskFailed,
    TaskCancelled,
    HeartbeatAck,
    Snapshot,
}

bh_core::simple_display! {
    MessageType {
        AgentRegistered => "agent-registered",
        StatusUpdate => "status-update",
        Offline => "offline",
        TaskAssigned => "task-assigned",
        TaskProgress => "task-progress",
        TaskLog => "task-log",
        TaskCompleted => "task-completed",
        TaskFailed => "task-failed",
        TaskCancelled => "task-cancelled",
        HeartbeatAck => "heartbeat-ack",
        Snapshot => "snapshot",
    }
}

impl Message {
    pub fn kind(&self) -> MessageType {
        match self {
            Message::AgentRegistered(_) => MessageType::AgentRegistered,
            Message::StatusUpdate(_) => MessageType::StatusUpdate,
            Message::Offline(_) => MessageType::Offline,
            Message::TaskAssigned(_) => MessageType::TaskAssigned,
            Message::TaskProgress(_) => MessageType::TaskProgress,
            Message::TaskLog(_) => MessageType::TaskLog,
            Message::TaskCompleted(_) => MessageType::TaskCompleted,
            Message::TaskFailed(_) => MessageType::TaskFailed,
            Message::TaskCancelled(_) => MessageType::TaskCancelled,
            Message::HeartbeatAck(_) => MessageType::HeartbeatAck,
            Message::Snapshot(_) => MessageType::Snapshot,
        }
    }

    /// The task a task-scoped message refers to.
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Message::TaskAssigned(p) => Some(&p.task_id),
            Message::TaskProgress(p) => Some(&p.task_id),
            Message::TaskLog(p) => Some(&p.task_id),
            Message::TaskCompleted(p) => Some(&p.task_id),
            Message::TaskFailed(p) => Some(&p.task_id),
            Message::TaskCancelled(p) => Some(&p.task_id),
            _ => None,
        }
    }

    /// Agent and record revision of an agent-scoped hub message.
    ///
    /// `None` for task messages and for agent heartbeats, which carry no
    /// revision.
    pub fn agent_revision(&self) -> Option<(&AgentId, u64)> {
        match self {
            Message::AgentRegistered(p) => Some((&p.agent.id, p.agent.revision)),
            Message::StatusUpdate(p) if p.revision > 0 => Some((&p.agent_id, p.revision)),
            Message::Offline(p) if p.revision > 0 => Some((&p.agent_id, p.revision)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegisteredPayload {
    pub agent: AgentRecord,
}

/// Agent liveness and load. Sent by agents as their heartbeat and by the hub
/// to observers whenever an agent record changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub agent_id: AgentId,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_usage_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<TaskId>,
    #[serde(default)]
    pub active_task_ids: Vec<TaskId>,
    /// Hub to observers: the agent was offline before this change
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reconnected: bool,
    /// Hub to observers: record revision, zero from agents
    #[serde(default, skip_serializing_if = "is_zero")]
    pub revision: u64,
}

impl StatusPayload {
    pub fn from_record(record: &AgentRecord) -> Self {
        Self {
            agent_id: record.id.clone(),
            status: record.status,
            cpu_usage_pct: record.cpu_usage_pct,
            mem_usage_pct: record.mem_usage_pct,
            current_task_id: record.current_task().cloned(),
            active_task_ids: record.active_task_ids.clone(),
            reconnected: false,
            revision: record.revision,
        }
    }

    pub fn reconnected(record: &AgentRecord) -> Self {
        Self { reconnected: true, ..Self::from_record(record) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflinePayload {
    pub agent_id: AgentId,
    pub reason: String,
    /// Tasks released by the agent going offline
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub released_task_ids: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub revision: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignedPayload {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub job_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgressPayload {
    pub task_id: TaskId,
    pub progress_pct: u8,
    /// Free-form phase label, e.g. `warmup`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLogPayload {
    pub task_id: TaskId,
    #[serde(default)]
    pub level: LogLevel,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletedPayload {
    pub task_id: TaskId,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailedPayload {
    pub task_id: TaskId,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCancelledPayload {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatAckPayload {
    pub agent_id: AgentId,
    pub status: AgentStatus,
}

/// All agent records and every non-terminal task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub agents: Vec<AgentRecord>,
    pub tasks: Vec<TaskRecord>,
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
