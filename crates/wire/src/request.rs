// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bh_core::{AgentId, Constraints, LoadReport, Registration, TaskId, TaskPatch, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::Query;

/// Request from an agent or the CLI to the hub
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Register or re-register an agent
    Register(Registration),

    /// Liveness signal with a load sample
    Heartbeat { agent_id: AgentId, report: LoadReport },

    /// Remove an agent record
    Deregister { agent_id: AgentId },

    /// Create a task and send it to an agent
    Dispatch {
        job_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_name: Option<String>,
        /// Explicit target; `None` lets the scheduler choose
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<AgentId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        constraints: Option<Constraints>,
    },

    /// Move a task through its state machine
    UpdateTask {
        task_id: TaskId,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        patch: Option<TaskPatch>,
    },

    /// Cancel a non-terminal task
    Cancel { task_id: TaskId },

    /// Delete a terminal task record
    DeleteTask { task_id: TaskId },

    /// Read-only query
    Query { query: Query },
}
