// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bh_core::{AgentId, AgentRecord, TaskId, TaskRecord, TaskStats};
use serde::{Deserialize, Serialize};

/// Broad category of a failed request, so callers can react without parsing
/// the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown agent or task
    NotFound,
    /// No eligible agent, or the target is full or offline
    CapacityExceeded,
    /// Status change rejected by the task state machine
    IllegalTransition,
    /// The command could not be delivered to the agent
    Unreachable,
    /// Malformed or unsupported request
    InvalidRequest,
    Internal,
}

bh_core::simple_display! {
    ErrorKind {
        NotFound => "not_found",
        CapacityExceeded => "capacity_exceeded",
        IllegalTransition => "illegal_transition",
        Unreachable => "unreachable",
        InvalidRequest => "invalid_request",
        Internal => "internal",
    }
}

/// Response from the hub
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Agent registered (or re-registered)
    Registered { agent_id: AgentId },

    /// Task created and delivered
    Dispatched { task_id: TaskId, agent_id: AgentId, agent_name: String },

    /// Task cancelled; `delivered` is false when the agent was not connected
    Cancelled { delivered: bool },

    Agents { agents: Vec<AgentRecord> },

    Agent { agent: Option<Box<AgentRecord>> },

    Tasks { tasks: Vec<TaskRecord> },

    Task { task: Option<Box<TaskRecord>> },

    Stats { stats: TaskStats },

    /// Error response
    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error { kind, message: message.into() }
    }
}
