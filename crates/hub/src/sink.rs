// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound seam between hub state and the control channel.

use bh_core::AgentId;
use bh_wire::Message;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("agent {0} is not connected")]
    AgentNotConnected(AgentId),

    #[error("send to agent {agent_id} failed: {reason}")]
    SendFailed { agent_id: AgentId, reason: String },
}

/// Where hub-originated messages go.
///
/// Both calls only enqueue and never block on the network.
pub trait CommandSink: Send + Sync {
    /// Deliver a command to one connected agent. Not queued or retried when
    /// the agent is absent.
    fn send_to_agent(&self, agent_id: &AgentId, message: Message) -> Result<(), ChannelError>;

    /// Fan a message out to every observer.
    fn broadcast(&self, message: Message);
}
