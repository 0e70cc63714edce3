// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query types for reading hub state.

use bh_core::{AgentId, Constraints, TaskId, TaskRecord, TaskStatus};
use serde::{Deserialize, Serialize};

/// Query types for reading hub state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Query {
    ListAgents,
    GetAgent {
        id: AgentId,
    },
    /// Agents that could take a task right now
    ListAvailable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        constraints: Option<Constraints>,
    },
    ListTasks {
        #[serde(default)]
        filter: TaskFilter,
    },
    GetTask {
        id: TaskId,
    },
    /// Per-status counts
    TaskStats,
}

/// Task list filter. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Maximum number of records (`None` = all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl TaskFilter {
    pub fn agent(agent_id: AgentId) -> Self {
        Self { agent_id: Some(agent_id), ..Self::default() }
    }

    pub fn status(status: TaskStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn matches(&self, task: &TaskRecord) -> bool {
        self.agent_id.as_ref().map_or(true, |id| task.agent_id == *id)
            && self.status.map_or(true, |s| task.status == s)
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
